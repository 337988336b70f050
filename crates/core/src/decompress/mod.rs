//! Incremental decompression of the catalog stream.
//!
//! Network chunks are fed into a [`Decompressor`] as they arrive. The decoded
//! output accumulates in an internal buffer which is handed to the query
//! engine once the stream has ended.

mod xz;

pub use xz::XzDecompressor;

use serde::Serialize;
use thiserror::Error;

/// Lifecycle of a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecoderState {
    /// Initialized, no input seen yet.
    Ready,
    /// At least one chunk consumed, end of stream not reached.
    Decoding,
    /// End of stream reached. Terminal.
    Finished,
    /// The stream was rejected. Terminal.
    Errored,
}

impl DecoderState {
    pub fn is_terminal(self) -> bool {
        matches!(self, DecoderState::Finished | DecoderState::Errored)
    }
}

/// Errors from the decoder.
///
/// Running out of input is not an error; `feed` simply returns and waits for
/// the next chunk.
#[derive(Debug, Error)]
pub enum DecompressError {
    #[error("failed to initialize decoder: {0}")]
    Init(String),

    #[error("corrupt compressed stream: {0}")]
    Corrupt(String),

    #[error("{0} bytes of trailing data after end of stream")]
    TrailingData(usize),

    #[error("stream ended before the end marker ({decoded} bytes decoded)")]
    Truncated { decoded: usize },

    #[error("decoder already failed")]
    Poisoned,
}

/// A push-style incremental decoder.
pub trait Decompressor: Send {
    /// Consume a chunk of compressed input, decoding as much as the input
    /// allows. Chunk boundaries do not affect the decoded output.
    fn feed(&mut self, input: &[u8]) -> Result<(), DecompressError>;

    /// Everything decoded so far.
    fn data(&self) -> &[u8];

    fn state(&self) -> DecoderState;

    fn is_finished(&self) -> bool {
        self.state() == DecoderState::Finished
    }

    /// Take the decoded output of a completed stream.
    ///
    /// Fails with [`DecompressError::Truncated`] if the end of stream was
    /// never reached.
    fn finish(&mut self) -> Result<Vec<u8>, DecompressError>;
}

/// Constructor for a fresh decoder, one per catalog fetch.
pub type DecoderFactory = fn() -> Result<Box<dyn Decompressor>, DecompressError>;
