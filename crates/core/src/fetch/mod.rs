//! Streaming HTTP fetches.
//!
//! A [`Fetcher`] opens a GET request and hands back the body as a stream of
//! chunks. Each fetch ends in exactly one terminal outcome: the stream runs
//! to completion, or it yields a single error and stops.

mod http;

pub use http::{HttpFetcher, HttpFetcherConfig};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use thiserror::Error;

/// Response body as a stream of chunks.
pub type ByteStream = BoxStream<'static, Result<Bytes, FetchError>>;

/// An opened response.
pub struct FetchResponse {
    /// Declared body length, if the server sent one.
    pub content_length: Option<u64>,
    pub body: ByteStream,
}

impl std::fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchResponse")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Transport-level failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Server returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("Invalid request: {0}")]
    Request(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout(e.to_string())
        } else if e.is_connect() {
            FetchError::ConnectionFailed(e.to_string())
        } else if e.is_builder() {
            FetchError::Request(e.to_string())
        } else if let Some(status) = e.status() {
            FetchError::Status {
                status: status.as_u16(),
                url: e.url().map(|u| u.to_string()).unwrap_or_default(),
            }
        } else {
            FetchError::Transfer(e.to_string())
        }
    }
}

/// Trait for opening streaming GET requests.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Issue a GET request. Non-success status codes are errors.
    async fn get(&self, url: &str) -> Result<FetchResponse, FetchError>;
}
