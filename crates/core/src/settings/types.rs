use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::database::UrlQuality;

/// Point-in-time view of the persisted settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsSnapshot {
    pub mirror_list: Vec<String>,
    pub mirror_list_updated_on: Option<DateTime<Utc>>,
    pub catalog_updated_on: Option<DateTime<Utc>>,
    pub preferred_url: UrlQuality,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt setting '{key}': {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for SettingsError {
    fn from(e: rusqlite::Error) -> Self {
        SettingsError::Database(e.to_string())
    }
}
