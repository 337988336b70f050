use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use mediathek_core::{Config, UrlQuality};

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<Config> {
    Json(state.config().clone())
}

/// GET /metrics
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state).await;
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PreferredUrlBody {
    pub quality: UrlQuality,
}

/// GET /api/v1/settings/preferred-url
pub async fn get_preferred_url(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PreferredUrlBody>, ApiError> {
    let snapshot = state
        .settings()
        .snapshot()
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(PreferredUrlBody {
        quality: snapshot.preferred_url,
    }))
}

/// PUT /api/v1/settings/preferred-url
pub async fn set_preferred_url(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PreferredUrlBody>,
) -> Result<Json<PreferredUrlBody>, ApiError> {
    state
        .settings()
        .set_preferred_url(body.quality)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(body))
}
