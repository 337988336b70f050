//! Types for the update orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::settings::SettingsError;

/// Where the orchestrator is in an update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateState {
    #[default]
    Idle,
    CheckingMirrorList,
    FetchingMirrorList,
    CheckingCatalog,
    FetchingCatalog,
}

/// Lifecycle and failure events, broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpdateEvent {
    MirrorListUpdateStarted,
    MirrorListUpdateCompleted { mirrors: usize },
    MirrorListUpdateFailed { reason: String },
    CatalogUpdateStarted { mirror: String },
    CatalogUpdateCompleted { shows: usize },
    CatalogUpdateFailed { reason: String },
}

impl UpdateEvent {
    /// Short name, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            UpdateEvent::MirrorListUpdateStarted => "mirror_list_update_started",
            UpdateEvent::MirrorListUpdateCompleted { .. } => "mirror_list_update_completed",
            UpdateEvent::MirrorListUpdateFailed { .. } => "mirror_list_update_failed",
            UpdateEvent::CatalogUpdateStarted { .. } => "catalog_update_started",
            UpdateEvent::CatalogUpdateCompleted { .. } => "catalog_update_completed",
            UpdateEvent::CatalogUpdateFailed { .. } => "catalog_update_failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            UpdateEvent::MirrorListUpdateFailed { .. } | UpdateEvent::CatalogUpdateFailed { .. }
        )
    }
}

/// An event with the time it was emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedEvent {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: UpdateEvent,
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Nothing was stale.
    UpToDate,
    /// The mirror list could not be refreshed; the catalog was not checked.
    MirrorListFailed,
    CatalogUpdated { shows: usize },
    CatalogFailed,
}

/// Errors that prevent a cycle from running at all.
///
/// Failures inside a cycle are reported as events, not errors.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("an update is already in progress")]
    Busy,

    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
}

/// Snapshot of the orchestrator for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateStatus {
    pub state: UpdateState,
    /// Whether the periodic loop is running.
    pub running: bool,
    pub mirrors: usize,
    pub mirror_list_updated_on: Option<DateTime<Utc>>,
    pub catalog_updated_on: Option<DateTime<Utc>>,
    pub last_event: Option<TimedEvent>,
}
