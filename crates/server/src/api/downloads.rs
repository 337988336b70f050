//! Download API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use mediathek_core::UrlQuality;

use super::handlers::{api_error, ApiError};
use super::rows::window_error;
use crate::downloads::{resolve_target, DownloadInfo};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartDownloadRequest {
    pub row: usize,
    /// Defaults to the stored preference.
    #[serde(default)]
    pub quality: Option<UrlQuality>,
    /// File name relative to the download directory.
    pub path: String,
}

/// POST /api/v1/downloads
///
/// Resolve the row's media URL and download it in the background.
pub async fn start_download(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartDownloadRequest>,
) -> Result<(StatusCode, Json<DownloadInfo>), ApiError> {
    let target = resolve_target(&state.config().download.directory, &request.path)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;

    let quality = request
        .quality
        .unwrap_or_else(|| state.preferred_quality());

    let url = {
        let mut window = state.window().lock().await;
        window
            .with_show(request.row, |show| {
                show.preferred_url(quality).map(str::to_string)
            })
            .map_err(window_error)?
    };
    let url = url.ok_or_else(|| {
        api_error(
            StatusCode::NOT_FOUND,
            format!("Row {} has no media URL", request.row),
        )
    })?;

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to create {}: {}", parent.display(), e),
            )
        })?;
    }

    let info = state
        .downloads()
        .start(Arc::clone(state.downloader()), url, target)
        .await;

    Ok((StatusCode::ACCEPTED, Json(info)))
}

/// GET /api/v1/downloads
pub async fn list_downloads(State(state): State<Arc<AppState>>) -> Json<Vec<DownloadInfo>> {
    Json(state.downloads().list().await)
}

/// GET /api/v1/downloads/{id}
pub async fn get_download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<DownloadInfo>, ApiError> {
    state
        .downloads()
        .get(id)
        .await
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Download not found: {}", id)))
}

/// DELETE /api/v1/downloads/{id}
///
/// Cancel a running download; its partial file is removed.
pub async fn cancel_download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    match state.downloads().cancel(id).await {
        Some(true) => Ok(StatusCode::ACCEPTED),
        Some(false) => Err(api_error(
            StatusCode::CONFLICT,
            format!("Download {} already finished", id),
        )),
        None => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Download not found: {}", id),
        )),
    }
}
