//! In-memory settings store for testing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::database::UrlQuality;
use crate::settings::{SettingsError, SettingsSnapshot, SettingsStore};

#[derive(Debug, Default)]
pub struct MemorySettings {
    snapshot: Mutex<SettingsSnapshot>,
    fail_writes: AtomicBool,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: SettingsSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            ..Self::default()
        }
    }

    /// Make every setter fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, SettingsSnapshot>, SettingsError> {
        self.snapshot
            .lock()
            .map_err(|_| SettingsError::Internal("settings poisoned".to_string()))
    }

    fn writable(&self) -> Result<MutexGuard<'_, SettingsSnapshot>, SettingsError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SettingsError::Database("write failed".to_string()));
        }
        self.lock()
    }
}

impl SettingsStore for MemorySettings {
    fn snapshot(&self) -> Result<SettingsSnapshot, SettingsError> {
        Ok(self.lock()?.clone())
    }

    fn set_mirror_list(
        &self,
        mirrors: &[String],
        updated_on: DateTime<Utc>,
    ) -> Result<(), SettingsError> {
        let mut snapshot = self.writable()?;
        snapshot.mirror_list = mirrors.to_vec();
        snapshot.mirror_list_updated_on = Some(updated_on);
        Ok(())
    }

    fn set_catalog_updated_on(&self, updated_on: DateTime<Utc>) -> Result<(), SettingsError> {
        self.writable()?.catalog_updated_on = Some(updated_on);
        Ok(())
    }

    fn set_preferred_url(&self, quality: UrlQuality) -> Result<(), SettingsError> {
        self.writable()?.preferred_url = quality;
        Ok(())
    }
}
