//! Catalog update API handlers.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::{info, warn};

use mediathek_core::{UpdateError, UpdateStatus};

use super::handlers::{api_error, ApiError};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// POST /api/v1/update
///
/// Start a catalog refresh in the background. Progress is reported through
/// `GET /api/v1/update/status`.
pub async fn trigger_update(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let handle = match state.orchestrator().spawn_update_catalog() {
        Ok(handle) => handle,
        Err(UpdateError::Busy) => {
            return Err(api_error(
                StatusCode::CONFLICT,
                UpdateError::Busy.to_string(),
            ))
        }
        Err(e) => return Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    };

    tokio::spawn(async move {
        match handle.await {
            Ok(Ok(outcome)) => info!(outcome = ?outcome, "Manual catalog update finished"),
            Ok(Err(e)) => warn!(error = %e, "Manual catalog update failed"),
            Err(e) => warn!(error = %e, "Manual catalog update task panicked"),
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: "Catalog update started".to_string(),
        }),
    ))
}

/// GET /api/v1/update/status
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<UpdateStatus>, ApiError> {
    state
        .orchestrator()
        .status()
        .map(Json)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
