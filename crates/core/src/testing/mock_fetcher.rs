//! Mock fetcher for testing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use futures::StreamExt;
use tokio::sync::RwLock;

use crate::fetch::{FetchError, FetchResponse, Fetcher};

/// A recorded request for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub timestamp: Instant,
}

/// Scripted outcome for one URL.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// The request succeeds and the body arrives in these chunks.
    Body(Vec<Bytes>),
    /// The body stream yields these chunks, then fails.
    FailAfter { chunks: Vec<Bytes>, error: FetchError },
    /// The request itself fails.
    Error(FetchError),
}

impl MockResponse {
    /// Successful body split into `chunk_size` pieces.
    pub fn chunked(body: &[u8], chunk_size: usize) -> Self {
        MockResponse::Body(split(body, chunk_size))
    }

    /// Body that breaks off after the first `cut` bytes.
    pub fn truncated(body: &[u8], cut: usize, chunk_size: usize, error: FetchError) -> Self {
        MockResponse::FailAfter {
            chunks: split(&body[..cut.min(body.len())], chunk_size),
            error,
        }
    }
}

fn split(body: &[u8], chunk_size: usize) -> Vec<Bytes> {
    body.chunks(chunk_size.max(1))
        .map(Bytes::copy_from_slice)
        .collect()
}

/// Mock implementation of the Fetcher trait.
///
/// Responses are scripted per URL. Unknown URLs fail with
/// [`FetchError::ConnectionFailed`].
///
/// # Example
///
/// ```rust,ignore
/// use mediathek_core::testing::{MockFetcher, MockResponse, fixtures};
///
/// let fetcher = MockFetcher::new();
/// fetcher
///     .set_response("http://mirror/list.xml", MockResponse::chunked(&fixtures::mirror_list_document(&["http://a"]), 16))
///     .await;
///
/// // ... run the orchestrator ...
///
/// assert_eq!(fetcher.request_count("http://mirror/list.xml").await, 1);
/// ```
#[derive(Clone, Default)]
pub struct MockFetcher {
    responses: Arc<RwLock<HashMap<String, MockResponse>>>,
    requests: Arc<RwLock<Vec<RecordedRequest>>>,
    delay: Arc<RwLock<Option<Duration>>>,
}

impl std::fmt::Debug for MockFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockFetcher")
            .field("responses", &"<responses>")
            .field("requests", &"<requests>")
            .finish()
    }
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the response for a URL.
    pub async fn set_response(&self, url: &str, response: MockResponse) {
        self.responses
            .write()
            .await
            .insert(url.to_string(), response);
    }

    /// Serve `body` in a single chunk.
    pub async fn set_body(&self, url: &str, body: impl Into<Bytes>) {
        self.set_response(url, MockResponse::Body(vec![body.into()]))
            .await;
    }

    /// Fail requests to `url` before any byte arrives.
    pub async fn set_error(&self, url: &str, error: FetchError) {
        self.set_response(url, MockResponse::Error(error)).await;
    }

    /// Delay every request before the response is returned.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    pub async fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.requests.read().await.clone()
    }

    pub async fn request_count(&self, url: &str) -> usize {
        self.requests
            .read()
            .await
            .iter()
            .filter(|r| r.url == url)
            .count()
    }

    pub async fn clear_recorded(&self) {
        self.requests.write().await.clear();
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn get(&self, url: &str) -> Result<FetchResponse, FetchError> {
        self.requests.write().await.push(RecordedRequest {
            url: url.to_string(),
            timestamp: Instant::now(),
        });

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let response = self.responses.read().await.get(url).cloned();

        match response {
            None => Err(FetchError::ConnectionFailed(format!(
                "no mock response for {}",
                url
            ))),
            Some(MockResponse::Error(error)) => Err(error),
            Some(MockResponse::Body(chunks)) => {
                let content_length = chunks.iter().map(|c| c.len() as u64).sum();
                Ok(FetchResponse {
                    content_length: Some(content_length),
                    body: stream::iter(chunks.into_iter().map(Ok)).boxed(),
                })
            }
            Some(MockResponse::FailAfter { chunks, error }) => {
                let items = chunks
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(error)));
                Ok(FetchResponse {
                    content_length: None,
                    body: stream::iter(items).boxed(),
                })
            }
        }
    }
}
