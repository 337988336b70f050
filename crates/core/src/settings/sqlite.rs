//! SQLite-backed settings store.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{SettingsError, SettingsSnapshot, SettingsStore};
use crate::database::UrlQuality;

const KEY_MIRROR_LIST: &str = "mirror_list";
const KEY_MIRROR_LIST_UPDATED_ON: &str = "mirror_list_updated_on";
const KEY_CATALOG_UPDATED_ON: &str = "catalog_updated_on";
const KEY_PREFERRED_URL: &str = "preferred_url";

/// Key/value settings table.
pub struct SqliteSettings {
    conn: Mutex<Connection>,
}

impl SqliteSettings {
    pub fn new(path: &Path) -> Result<Self, SettingsError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, SettingsError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), SettingsError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SettingsError> {
        self.conn
            .lock()
            .map_err(|_| SettingsError::Internal("settings connection poisoned".to_string()))
    }

    fn put(conn: &Connection, key: &str, value: &str) -> Result<(), SettingsError> {
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }
}

fn parse_timestamp(key: &str, value: &str) -> Result<DateTime<Utc>, SettingsError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SettingsError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })
}

fn encode_quality(quality: UrlQuality) -> &'static str {
    match quality {
        UrlQuality::Default => "default",
        UrlQuality::Small => "small",
        UrlQuality::Large => "large",
    }
}

fn decode_quality(value: &str) -> Result<UrlQuality, SettingsError> {
    match value {
        "default" => Ok(UrlQuality::Default),
        "small" => Ok(UrlQuality::Small),
        "large" => Ok(UrlQuality::Large),
        other => Err(SettingsError::Corrupt {
            key: KEY_PREFERRED_URL.to_string(),
            reason: format!("unknown quality '{}'", other),
        }),
    }
}

impl SettingsStore for SqliteSettings {
    fn snapshot(&self) -> Result<SettingsSnapshot, SettingsError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT key, value FROM settings")?;
        let values = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<HashMap<_, _>, _>>()?;

        let mut snapshot = SettingsSnapshot::default();

        if let Some(value) = values.get(KEY_MIRROR_LIST) {
            snapshot.mirror_list =
                serde_json::from_str(value).map_err(|e| SettingsError::Corrupt {
                    key: KEY_MIRROR_LIST.to_string(),
                    reason: e.to_string(),
                })?;
        }
        if let Some(value) = values.get(KEY_MIRROR_LIST_UPDATED_ON) {
            snapshot.mirror_list_updated_on =
                Some(parse_timestamp(KEY_MIRROR_LIST_UPDATED_ON, value)?);
        }
        if let Some(value) = values.get(KEY_CATALOG_UPDATED_ON) {
            snapshot.catalog_updated_on = Some(parse_timestamp(KEY_CATALOG_UPDATED_ON, value)?);
        }
        if let Some(value) = values.get(KEY_PREFERRED_URL) {
            snapshot.preferred_url = decode_quality(value)?;
        }

        Ok(snapshot)
    }

    fn set_mirror_list(
        &self,
        mirrors: &[String],
        updated_on: DateTime<Utc>,
    ) -> Result<(), SettingsError> {
        let encoded = serde_json::to_string(mirrors)
            .map_err(|e| SettingsError::Internal(e.to_string()))?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        Self::put(&tx, KEY_MIRROR_LIST, &encoded)?;
        Self::put(&tx, KEY_MIRROR_LIST_UPDATED_ON, &updated_on.to_rfc3339())?;
        tx.commit()?;
        Ok(())
    }

    fn set_catalog_updated_on(&self, updated_on: DateTime<Utc>) -> Result<(), SettingsError> {
        let conn = self.lock()?;
        Self::put(&conn, KEY_CATALOG_UPDATED_ON, &updated_on.to_rfc3339())
    }

    fn set_preferred_url(&self, quality: UrlQuality) -> Result<(), SettingsError> {
        let conn = self.lock()?;
        Self::put(&conn, KEY_PREFERRED_URL, encode_quality(quality))
    }
}
