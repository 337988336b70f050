//! Download of a resolved media URL to a local file.
//!
//! The body is streamed to disk chunk by chunk with progress reports. A
//! download that fails or is cancelled removes its partial file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use serde::Serialize;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::fetch::{FetchError, Fetcher};
use crate::metrics;

/// Bytes received so far, and the expected total if the server declared one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DownloadProgress {
    pub received: u64,
    pub total: Option<u64>,
}

impl DownloadProgress {
    pub fn percent(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => Some(self.received as f64 / total as f64 * 100.0),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("download cancelled")]
    Cancelled,
}

impl DownloadError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        DownloadError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn result_label(&self) -> &'static str {
        match self {
            DownloadError::Cancelled => "cancelled",
            _ => "failed",
        }
    }
}

pub struct Downloader {
    fetcher: Arc<dyn Fetcher>,
}

impl Downloader {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Stream `url` into `path`.
    ///
    /// Setting `cancel_rx` to `true` aborts the transfer. On cancellation or
    /// any failure after the file was created, the partial file is deleted.
    /// Returns the number of bytes written.
    pub async fn download(
        &self,
        url: &str,
        path: &Path,
        progress_tx: Option<mpsc::Sender<DownloadProgress>>,
        mut cancel_rx: watch::Receiver<bool>,
    ) -> Result<u64, DownloadError> {
        let started = Instant::now();
        info!(url = %url, path = %path.display(), "Download started");

        let mut created = false;
        let result = self
            .transfer(url, path, progress_tx.as_ref(), &mut cancel_rx, &mut created)
            .await;
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(bytes) => {
                info!(path = %path.display(), bytes = bytes, "Download completed");
                metrics::DOWNLOADS_TOTAL.with_label_values(&["completed"]).inc();
                metrics::DOWNLOAD_DURATION
                    .with_label_values(&["completed"])
                    .observe(elapsed);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Download aborted");
                if created {
                    remove_partial(path).await;
                }
                metrics::DOWNLOADS_TOTAL
                    .with_label_values(&[e.result_label()])
                    .inc();
                metrics::DOWNLOAD_DURATION
                    .with_label_values(&[e.result_label()])
                    .observe(elapsed);
            }
        }

        result
    }

    async fn transfer(
        &self,
        url: &str,
        path: &Path,
        progress_tx: Option<&mpsc::Sender<DownloadProgress>>,
        cancel_rx: &mut watch::Receiver<bool>,
        created: &mut bool,
    ) -> Result<u64, DownloadError> {
        if *cancel_rx.borrow() {
            return Err(DownloadError::Cancelled);
        }

        let mut file = File::create(path)
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        *created = true;

        let response = tokio::select! {
            response = self.fetcher.get(url) => response?,
            _ = cancelled(cancel_rx) => return Err(DownloadError::Cancelled),
        };

        let total = response.content_length;
        let mut body = response.body;
        let mut received = 0u64;

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancelled(cancel_rx) => return Err(DownloadError::Cancelled),
                chunk = body.next() => chunk,
            };

            let Some(chunk) = chunk else {
                break;
            };
            let chunk = chunk?;

            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::io(path, e))?;
            received += chunk.len() as u64;
            metrics::DOWNLOAD_BYTES.inc_by(chunk.len() as u64);

            if let Some(tx) = progress_tx {
                // Progress is advisory; a slow or gone receiver is not an error.
                let _ = tx.try_send(DownloadProgress { received, total });
            }
        }

        file.flush().await.map_err(|e| DownloadError::io(path, e))?;

        Ok(received)
    }
}

/// Resolves once cancellation is requested. Never resolves if the sender is
/// gone without cancelling.
async fn cancelled(cancel_rx: &mut watch::Receiver<bool>) {
    if cancel_rx.wait_for(|cancel| *cancel).await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed partial download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial download"),
    }
}
