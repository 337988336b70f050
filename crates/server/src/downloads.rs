//! Tracking of background downloads started through the API.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, info};

use mediathek_core::{DownloadError, Downloader};

const PROGRESS_CHANNEL_CAPACITY: usize = 16;

/// Finished downloads kept for status queries; older ones are dropped.
pub const DEFAULT_FINISHED_HISTORY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl DownloadStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, DownloadStatus::Running)
    }
}

/// Public view of one download.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadInfo {
    pub id: u64,
    pub url: String,
    pub path: PathBuf,
    pub status: DownloadStatus,
    pub received: u64,
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

struct DownloadEntry {
    info: DownloadInfo,
    cancel_tx: watch::Sender<bool>,
}

/// Registry of downloads, keyed by a process-local id.
///
/// Running downloads are always kept. Of the finished ones only the most
/// recent `finished_history` are.
pub struct DownloadRegistry {
    next_id: AtomicU64,
    finished_history: usize,
    entries: RwLock<HashMap<u64, DownloadEntry>>,
}

impl Default for DownloadRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadRegistry {
    pub fn new() -> Self {
        Self::with_finished_history(DEFAULT_FINISHED_HISTORY)
    }

    pub fn with_finished_history(finished_history: usize) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            finished_history,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register a download and run it in the background.
    pub async fn start(
        self: &Arc<Self>,
        downloader: Arc<Downloader>,
        url: String,
        path: PathBuf,
    ) -> DownloadInfo {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (progress_tx, mut progress_rx) = mpsc::channel::<mediathek_core::DownloadProgress>(PROGRESS_CHANNEL_CAPACITY);

        let info = DownloadInfo {
            id,
            url: url.clone(),
            path: path.clone(),
            status: DownloadStatus::Running,
            received: 0,
            total: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        };

        self.entries.write().await.insert(
            id,
            DownloadEntry {
                info: info.clone(),
                cancel_tx,
            },
        );
        info!(id = id, url = %url, path = %path.display(), "Download registered");

        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let progress = {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    while let Some(progress) = progress_rx.recv().await {
                        registry
                            .update(id, |info| {
                                info.received = progress.received;
                                info.total = progress.total;
                            })
                            .await;
                    }
                })
            };

            let result = downloader
                .download(&url, &path, Some(progress_tx), cancel_rx)
                .await;
            // The sender was moved into `download`, so the forwarder drains and ends.
            let _ = progress.await;

            registry
                .update(id, |info| {
                    info.finished_at = Some(Utc::now());
                    match result {
                        Ok(bytes) => {
                            info.status = DownloadStatus::Completed;
                            info.received = bytes;
                        }
                        Err(DownloadError::Cancelled) => {
                            info.status = DownloadStatus::Cancelled;
                        }
                        Err(e) => {
                            info.status = DownloadStatus::Failed;
                            info.error = Some(e.to_string());
                        }
                    }
                })
                .await;
            registry.prune_finished().await;
        });

        info
    }

    pub async fn get(&self, id: u64) -> Option<DownloadInfo> {
        self.entries.read().await.get(&id).map(|e| e.info.clone())
    }

    /// All downloads, oldest first.
    pub async fn list(&self) -> Vec<DownloadInfo> {
        let mut downloads: Vec<DownloadInfo> = self
            .entries
            .read()
            .await
            .values()
            .map(|e| e.info.clone())
            .collect();
        downloads.sort_by_key(|info| info.id);
        downloads
    }

    pub async fn active_count(&self) -> usize {
        self.entries
            .read()
            .await
            .values()
            .filter(|e| !e.info.status.is_terminal())
            .count()
    }

    /// Request cancellation. Returns `None` for an unknown id and
    /// `Some(false)` if the download already finished.
    pub async fn cancel(&self, id: u64) -> Option<bool> {
        let entries = self.entries.read().await;
        let entry = entries.get(&id)?;

        if entry.info.status.is_terminal() {
            return Some(false);
        }

        debug!(id = id, "Cancelling download");
        let _ = entry.cancel_tx.send(true);
        Some(true)
    }

    /// Drop the oldest finished downloads beyond the history limit.
    async fn prune_finished(&self) {
        let mut entries = self.entries.write().await;
        let mut finished: Vec<(DateTime<Utc>, u64)> = entries
            .values()
            .filter(|e| e.info.status.is_terminal())
            .map(|e| (e.info.finished_at.unwrap_or(e.info.started_at), e.info.id))
            .collect();
        if finished.len() <= self.finished_history {
            return;
        }

        finished.sort_unstable();
        let excess = finished.len() - self.finished_history;
        for (_, id) in finished.into_iter().take(excess) {
            entries.remove(&id);
        }
        debug!(pruned = excess, "Dropped finished downloads from history");
    }

    async fn update(&self, id: u64, f: impl FnOnce(&mut DownloadInfo)) {
        if let Some(entry) = self.entries.write().await.get_mut(&id) {
            f(&mut entry.info);
        }
    }
}

/// Resolve a client-supplied relative path inside `directory`.
///
/// Only plain relative paths are accepted: no root, no `..`, no `.` and no
/// empty path.
pub fn resolve_target(directory: &Path, relative: &str) -> Result<PathBuf, String> {
    let relative = Path::new(relative);
    if relative.as_os_str().is_empty() {
        return Err("path must not be empty".to_string());
    }

    for component in relative.components() {
        match component {
            Component::Normal(_) => {}
            _ => {
                return Err(format!(
                    "path must be a plain relative file name, got '{}'",
                    relative.display()
                ))
            }
        }
    }

    Ok(directory.join(relative))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use mediathek_core::testing::{MockFetcher, MockResponse};

    const URL: &str = "http://media.example/ARD/video.mp4";

    async fn wait_terminal(registry: &DownloadRegistry, id: u64) -> DownloadInfo {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let info = registry.get(id).await.unwrap();
                if info.status.is_terminal() {
                    return info;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap()
    }

    #[test]
    fn test_resolve_target() {
        let dir = Path::new("/srv/downloads");
        assert_eq!(
            resolve_target(dir, "ARD/tagesschau.mp4").unwrap(),
            PathBuf::from("/srv/downloads/ARD/tagesschau.mp4")
        );
        assert!(resolve_target(dir, "").is_err());
        assert!(resolve_target(dir, "/etc/passwd").is_err());
        assert!(resolve_target(dir, "../escape.mp4").is_err());
        assert!(resolve_target(dir, "a/../../escape.mp4").is_err());
    }

    #[tokio::test]
    async fn test_download_completes() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(MockFetcher::new());
        fetcher
            .set_response(URL, MockResponse::chunked(&[5u8; 3000], 1000))
            .await;
        let registry = Arc::new(DownloadRegistry::new());

        let info = registry
            .start(
                Arc::new(Downloader::new(fetcher)),
                URL.to_string(),
                dir.path().join("video.mp4"),
            )
            .await;
        assert_eq!(info.status, DownloadStatus::Running);

        let done = wait_terminal(&registry, info.id).await;
        assert_eq!(done.status, DownloadStatus::Completed);
        assert_eq!(done.received, 3000);
        assert!(done.finished_at.is_some());
        assert_eq!(registry.active_count().await, 0);
        assert_eq!(registry.cancel(info.id).await, Some(false));
    }

    #[tokio::test]
    async fn test_cancel_running_download() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video.mp4");
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.set_body(URL, vec![1u8; 100]).await;
        fetcher.set_delay(Duration::from_secs(10)).await;
        let registry = Arc::new(DownloadRegistry::new());

        let info = registry
            .start(Arc::new(Downloader::new(fetcher)), URL.to_string(), path.clone())
            .await;
        assert_eq!(registry.active_count().await, 1);
        assert_eq!(registry.cancel(info.id).await, Some(true));

        let done = wait_terminal(&registry, info.id).await;
        assert_eq!(done.status, DownloadStatus::Cancelled);
        assert!(!path.exists());
        assert_eq!(registry.cancel(999).await, None);
    }

    #[tokio::test]
    async fn test_failed_download_records_error() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(DownloadRegistry::new());

        let info = registry
            .start(
                Arc::new(Downloader::new(Arc::new(MockFetcher::new()))),
                URL.to_string(),
                dir.path().join("video.mp4"),
            )
            .await;

        let done = wait_terminal(&registry, info.id).await;
        assert_eq!(done.status, DownloadStatus::Failed);
        assert!(done.error.unwrap().contains("Connection failed"));
        assert_eq!(registry.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_finished_history_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.set_body(URL, vec![3u8; 10]).await;
        let downloader = Arc::new(Downloader::new(fetcher));
        let registry = Arc::new(DownloadRegistry::with_finished_history(2));

        let mut ids = Vec::new();
        for i in 0..4 {
            let info = registry
                .start(
                    Arc::clone(&downloader),
                    URL.to_string(),
                    dir.path().join(format!("video-{}.mp4", i)),
                )
                .await;
            wait_terminal(&registry, info.id).await;
            ids.push(info.id);
        }

        tokio::time::timeout(Duration::from_secs(5), async {
            while registry.list().await.len() > 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let kept: Vec<u64> = registry.list().await.iter().map(|d| d.id).collect();
        assert_eq!(kept, ids[2..].to_vec());
        assert!(registry.get(ids[0]).await.is_none());
    }
}
