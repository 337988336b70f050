//! Result window API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use mediathek_core::{
    Column, DatabaseError, ResultWindow, Show, ShowId, UrlQuality, WindowError, WindowEvent,
    WindowQuery,
};

use super::handlers::{api_error, ApiError};
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RowsParams {
    #[serde(default)]
    pub offset: usize,
    /// Defaults to the window size.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// One visible row: the six display columns, formatted.
#[derive(Debug, Serialize)]
pub struct RowView {
    pub row: usize,
    pub id: ShowId,
    pub channel: String,
    pub topic: String,
    pub title: String,
    pub date: String,
    pub time: String,
    pub duration: String,
}

#[derive(Debug, Serialize)]
pub struct RowsResponse {
    pub rows: Vec<RowView>,
    pub row_count: usize,
    pub total: usize,
    pub can_fetch_more: bool,
}

#[derive(Debug, Serialize)]
pub struct WindowStateResponse {
    pub query: WindowQuery,
    pub row_count: usize,
    pub total: usize,
    pub can_fetch_more: bool,
    /// What observers must apply; absent when nothing changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<WindowEvent>,
}

impl WindowStateResponse {
    fn new(window: &ResultWindow, event: Option<WindowEvent>) -> Self {
        Self {
            query: window.query().clone(),
            row_count: window.row_count(),
            total: window.total(),
            can_fetch_more: window.can_fetch_more(),
            event,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ShowDetail {
    pub row: usize,
    pub id: ShowId,
    #[serde(flatten)]
    pub show: Show,
}

#[derive(Debug, Deserialize)]
pub struct UrlParams {
    /// Defaults to the stored preference.
    #[serde(default)]
    pub quality: Option<UrlQuality>,
}

#[derive(Debug, Serialize)]
pub struct UrlResponse {
    pub row: usize,
    pub quality: UrlQuality,
    pub url: String,
}

pub fn window_error(e: WindowError) -> ApiError {
    match e {
        WindowError::RowOutOfRange { .. } => api_error(StatusCode::NOT_FOUND, e.to_string()),
        WindowError::Engine(DatabaseError::NotFound(_)) => {
            api_error(StatusCode::NOT_FOUND, e.to_string())
        }
        WindowError::Engine(_) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/rows
///
/// Visible rows, paged by `offset` and `limit`.
pub async fn list_rows(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RowsParams>,
) -> Result<Json<RowsResponse>, ApiError> {
    let mut window = state.window().lock().await;

    let limit = params.limit.unwrap_or(window.window_size());
    let end = params.offset.saturating_add(limit).min(window.row_count());

    let mut rows = Vec::with_capacity(end.saturating_sub(params.offset));
    for row in params.offset..end {
        let id = window.id_at(row).map_err(window_error)?;
        let view = window
            .with_show(row, |show| RowView {
                row,
                id,
                channel: Column::Channel.display(show),
                topic: Column::Topic.display(show),
                title: Column::Title.display(show),
                date: Column::Date.display(show),
                time: Column::Time.display(show),
                duration: Column::Duration.display(show),
            })
            .map_err(window_error)?;
        rows.push(view);
    }

    Ok(Json(RowsResponse {
        rows,
        row_count: window.row_count(),
        total: window.total(),
        can_fetch_more: window.can_fetch_more(),
    }))
}

/// POST /api/v1/rows/fetch-more
pub async fn fetch_more(State(state): State<Arc<AppState>>) -> Json<WindowStateResponse> {
    let mut window = state.window().lock().await;
    let event = window.fetch_more();
    Json(WindowStateResponse::new(&window, event))
}

/// GET /api/v1/rows/{row}
pub async fn get_row(
    State(state): State<Arc<AppState>>,
    Path(row): Path<usize>,
) -> Result<Json<ShowDetail>, ApiError> {
    let mut window = state.window().lock().await;
    let id = window.id_at(row).map_err(window_error)?;
    let show = window.show_at(row).map_err(window_error)?;

    Ok(Json(ShowDetail { row, id, show }))
}

/// GET /api/v1/rows/{row}/url
///
/// Media URL for the requested quality, falling back to the other qualities.
pub async fn get_row_url(
    State(state): State<Arc<AppState>>,
    Path(row): Path<usize>,
    Query(params): Query<UrlParams>,
) -> Result<Json<UrlResponse>, ApiError> {
    let quality = params
        .quality
        .unwrap_or_else(|| state.preferred_quality());

    let url = {
        let mut window = state.window().lock().await;
        window
            .with_show(row, |show| show.preferred_url(quality).map(str::to_string))
            .map_err(window_error)?
    };

    match url {
        Some(url) => Ok(Json(UrlResponse { row, quality, url })),
        None => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Row {} has no media URL", row),
        )),
    }
}

/// GET /api/v1/query
pub async fn get_query(State(state): State<Arc<AppState>>) -> Json<WindowStateResponse> {
    let window = state.window().lock().await;
    Json(WindowStateResponse::new(&window, None))
}

/// PUT /api/v1/query
///
/// Replace filters and sort. Any change resets the visible rows.
pub async fn set_query(
    State(state): State<Arc<AppState>>,
    Json(query): Json<WindowQuery>,
) -> Result<Json<WindowStateResponse>, ApiError> {
    let mut window = state.window().lock().await;
    let event = window.set_query(query).map_err(window_error)?;
    Ok(Json(WindowStateResponse::new(&window, event)))
}

/// POST /api/v1/sort/{column}
///
/// Sort by a column, toggling the direction if it is already the sort column.
pub async fn sort_by_column(
    State(state): State<Arc<AppState>>,
    Path(column): Path<Column>,
) -> Result<Json<WindowStateResponse>, ApiError> {
    let mut window = state.window().lock().await;
    let event = window.sort_by_column(column).map_err(window_error)?;
    Ok(Json(WindowStateResponse::new(&window, Some(event))))
}

/// GET /api/v1/channels
pub async fn list_channels(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    let window = state.window().lock().await;
    Json(window.channels().to_vec())
}

/// GET /api/v1/topics
///
/// Topics for the current channel filter.
pub async fn list_topics(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    let window = state.window().lock().await;
    Json(window.topics().to_vec())
}
