//! xz/LZMA decoder built on liblzma's stream API.

use tracing::{debug, warn};
use xz2::stream::{Action, Status, Stream};

use super::{DecoderState, DecompressError, Decompressor};
use crate::metrics;

const OUTPUT_CHUNK_SIZE: usize = 64 * 1024;

pub struct XzDecompressor {
    stream: Stream,
    buffer: Box<[u8]>,
    data: Vec<u8>,
    state: DecoderState,
}

impl XzDecompressor {
    pub fn new() -> Result<Self, DecompressError> {
        let stream = Stream::new_stream_decoder(u64::MAX, 0)
            .map_err(|e| DecompressError::Init(e.to_string()))?;

        Ok(Self {
            stream,
            buffer: vec![0u8; OUTPUT_CHUNK_SIZE].into_boxed_slice(),
            data: Vec::new(),
            state: DecoderState::Ready,
        })
    }

    /// Boxed constructor, usable as a [`super::DecoderFactory`].
    pub fn boxed() -> Result<Box<dyn Decompressor>, DecompressError> {
        Ok(Box::new(Self::new()?))
    }

    fn fail(&mut self, error: DecompressError) -> DecompressError {
        warn!(error = %error, decoded = self.data.len(), "Catalog decoder failed");
        self.state = DecoderState::Errored;
        error
    }
}

impl Decompressor for XzDecompressor {
    fn feed(&mut self, mut input: &[u8]) -> Result<(), DecompressError> {
        match self.state {
            DecoderState::Errored => return Err(DecompressError::Poisoned),
            DecoderState::Finished if !input.is_empty() => {
                return Err(self.fail(DecompressError::TrailingData(input.len())));
            }
            DecoderState::Finished => return Ok(()),
            DecoderState::Ready => self.state = DecoderState::Decoding,
            DecoderState::Decoding => {}
        }

        loop {
            let before_in = self.stream.total_in();
            let before_out = self.stream.total_out();

            let status = match self.stream.process(input, &mut self.buffer, Action::Run) {
                Ok(status) => status,
                Err(e) => return Err(self.fail(DecompressError::Corrupt(e.to_string()))),
            };

            let consumed = (self.stream.total_in() - before_in) as usize;
            let produced = (self.stream.total_out() - before_out) as usize;

            self.data.extend_from_slice(&self.buffer[..produced]);
            input = &input[consumed..];
            metrics::CATALOG_DECODED_BYTES.inc_by(produced as u64);

            match status {
                Status::StreamEnd => {
                    self.state = DecoderState::Finished;
                    debug!(decoded = self.data.len(), "Catalog stream finished");

                    if !input.is_empty() {
                        return Err(self.fail(DecompressError::TrailingData(input.len())));
                    }
                    return Ok(());
                }
                // Out of input; wait for the next chunk.
                Status::MemNeeded => return Ok(()),
                Status::Ok | Status::GetCheck => {
                    if consumed == 0 && produced == 0 {
                        return Ok(());
                    }
                    if input.is_empty() && produced < self.buffer.len() {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn data(&self) -> &[u8] {
        &self.data
    }

    fn state(&self) -> DecoderState {
        self.state
    }

    fn finish(&mut self) -> Result<Vec<u8>, DecompressError> {
        match self.state {
            DecoderState::Finished => Ok(std::mem::take(&mut self.data)),
            DecoderState::Errored => Err(DecompressError::Poisoned),
            DecoderState::Ready | DecoderState::Decoding => {
                let decoded = self.data.len();
                Err(self.fail(DecompressError::Truncated { decoded }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    fn payload() -> Vec<u8> {
        // Large and varied enough to span several output chunks.
        (0..200_000u32)
            .flat_map(|i| format!("{}:{};", i, i.wrapping_mul(2_654_435_761)).into_bytes())
            .collect()
    }

    fn decode_in_chunks(compressed: &[u8], chunk_size: usize) -> Vec<u8> {
        let mut decoder = XzDecompressor::new().unwrap();
        for chunk in compressed.chunks(chunk_size) {
            decoder.feed(chunk).unwrap();
        }
        assert!(decoder.is_finished());
        decoder.finish().unwrap()
    }

    #[test]
    fn test_decode_whole_buffer() {
        let plain = payload();
        let compressed = fixtures::compress(&plain);
        assert_eq!(decode_in_chunks(&compressed, compressed.len()), plain);
    }

    #[test]
    fn test_chunk_boundaries_do_not_change_output() {
        let plain = payload();
        let compressed = fixtures::compress(&plain);

        let whole = decode_in_chunks(&compressed, compressed.len());
        for chunk_size in [1, 7, 4096] {
            assert_eq!(decode_in_chunks(&compressed, chunk_size), whole, "chunk size {}", chunk_size);
        }
    }

    #[test]
    fn test_state_transitions() {
        let compressed = fixtures::compress(b"hello");
        let mut decoder = XzDecompressor::new().unwrap();
        assert_eq!(decoder.state(), DecoderState::Ready);

        decoder.feed(&compressed[..4]).unwrap();
        assert_eq!(decoder.state(), DecoderState::Decoding);

        decoder.feed(&compressed[4..]).unwrap();
        assert_eq!(decoder.state(), DecoderState::Finished);
        assert_eq!(decoder.data(), b"hello");

        // Empty feeds after the end are harmless.
        decoder.feed(&[]).unwrap();
        assert!(decoder.is_finished());
    }

    #[test]
    fn test_corrupt_stream_is_an_error() {
        let mut decoder = XzDecompressor::new().unwrap();
        let err = decoder.feed(b"definitely not xz data").unwrap_err();
        assert!(matches!(err, DecompressError::Corrupt(_)));
        assert_eq!(decoder.state(), DecoderState::Errored);

        assert!(matches!(
            decoder.feed(b"more").unwrap_err(),
            DecompressError::Poisoned
        ));
    }

    #[test]
    fn test_truncated_stream_is_rejected() {
        let plain = payload();
        let compressed = fixtures::compress(&plain);

        let mut decoder = XzDecompressor::new().unwrap();
        decoder.feed(&compressed[..compressed.len() / 2]).unwrap();
        assert_eq!(decoder.state(), DecoderState::Decoding);
        assert!(!decoder.data().is_empty());

        let err = decoder.finish().unwrap_err();
        assert!(matches!(err, DecompressError::Truncated { .. }));
        assert_eq!(decoder.state(), DecoderState::Errored);
    }

    #[test]
    fn test_trailing_data_is_rejected() {
        let mut compressed = fixtures::compress(b"hello");
        compressed.extend_from_slice(b"junk");

        let mut decoder = XzDecompressor::new().unwrap();
        let err = decoder.feed(&compressed).unwrap_err();
        assert!(matches!(err, DecompressError::TrailingData(4)));
    }
}
