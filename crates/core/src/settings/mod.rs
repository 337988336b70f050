//! Persisted application settings.
//!
//! Holds the state that must survive restarts: the mirror list with its
//! refresh time, the catalog refresh time and the preferred media quality.

mod sqlite;
mod types;

pub use sqlite::SqliteSettings;
pub use types::*;

use chrono::{DateTime, Utc};

use crate::database::UrlQuality;

/// Trait for settings storage.
pub trait SettingsStore: Send + Sync {
    /// Read all settings at once.
    fn snapshot(&self) -> Result<SettingsSnapshot, SettingsError>;

    /// Replace the mirror list and record when it was fetched.
    ///
    /// Both values are written together or not at all.
    fn set_mirror_list(
        &self,
        mirrors: &[String],
        updated_on: DateTime<Utc>,
    ) -> Result<(), SettingsError>;

    /// Record when the catalog was last replaced.
    fn set_catalog_updated_on(&self, updated_on: DateTime<Utc>) -> Result<(), SettingsError>;

    fn set_preferred_url(&self, quality: UrlQuality) -> Result<(), SettingsError>;
}
