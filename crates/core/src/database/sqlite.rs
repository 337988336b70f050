//! SQLite-backed query engine.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension};
use tracing::{debug, info};

use super::{parse_catalog, Column, DatabaseError, QueryEngine, QueryFilter, Show, ShowId, SortOrder};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

/// SQLite-backed show database.
pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    /// Open the database file, creating it and the schema if needed.
    pub fn new(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory database (useful for testing).
    pub fn in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), DatabaseError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS shows (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                channel TEXT NOT NULL,
                topic TEXT NOT NULL,
                title TEXT NOT NULL,
                date TEXT NOT NULL,
                time TEXT NOT NULL,
                duration TEXT NOT NULL,
                description TEXT NOT NULL,
                website TEXT NOT NULL,
                url TEXT NOT NULL,
                url_small TEXT,
                url_large TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_shows_channel ON shows(channel);
            CREATE INDEX IF NOT EXISTS idx_shows_channel_topic ON shows(channel, topic);
            "#,
        )?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn
            .lock()
            .map_err(|_| DatabaseError::Internal("database connection poisoned".to_string()))
    }

    /// Number of stored shows.
    pub fn count(&self) -> Result<usize, DatabaseError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM shows", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn column_name(column: Column) -> &'static str {
    match column {
        Column::Channel => "channel",
        Column::Topic => "topic",
        Column::Title => "title",
        Column::Date => "date",
        Column::Time => "time",
        Column::Duration => "duration",
    }
}

fn escape_like(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len() + 2);
    escaped.push('%');
    for c in pattern.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn parse_stored_date(value: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e)))
}

fn parse_stored_time(index: usize, value: &str) -> rusqlite::Result<NaiveTime> {
    NaiveTime::parse_from_str(value, TIME_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
    })
}

impl QueryEngine for SqliteDatabase {
    fn query_ids(
        &self,
        filter: &QueryFilter,
        sort_column: Column,
        sort_order: SortOrder,
    ) -> Result<Vec<ShowId>, DatabaseError> {
        let mut sql = String::from("SELECT id FROM shows");
        let mut conditions = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if !filter.channel.is_empty() {
            conditions.push("channel = ?");
            values.push(Value::Text(filter.channel.clone()));
        }
        if !filter.topic.is_empty() {
            conditions.push("topic = ?");
            values.push(Value::Text(filter.topic.clone()));
        }
        if !filter.title.is_empty() {
            conditions.push("title LIKE ? ESCAPE '\\'");
            values.push(Value::Text(escape_like(&filter.title)));
        }

        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        let direction = match sort_order {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        };
        sql.push_str(&format!(
            " ORDER BY {} COLLATE NOCASE {}, id ASC",
            column_name(sort_column),
            direction
        ));

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let ids = stmt
            .query_map(params_from_iter(values), |row| row.get(0).map(ShowId))?
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            filter = ?filter,
            column = %sort_column,
            order = ?sort_order,
            count = ids.len(),
            "Queried show ids"
        );

        Ok(ids)
    }

    fn fetch_show(&self, id: ShowId) -> Result<Show, DatabaseError> {
        let conn = self.lock()?;
        let show = conn
            .query_row(
                "SELECT channel, topic, title, date, time, duration, description, website,
                        url, url_small, url_large
                 FROM shows WHERE id = ?",
                params![id.0],
                |row| {
                    let date: String = row.get(3)?;
                    let time: String = row.get(4)?;
                    let duration: String = row.get(5)?;

                    Ok(Show {
                        channel: row.get(0)?,
                        topic: row.get(1)?,
                        title: row.get(2)?,
                        date: parse_stored_date(&date)?,
                        time: parse_stored_time(4, &time)?,
                        duration: parse_stored_time(5, &duration)?,
                        description: row.get(6)?,
                        website: row.get(7)?,
                        url: row.get(8)?,
                        url_small: row.get(9)?,
                        url_large: row.get(10)?,
                    })
                },
            )
            .optional()?;

        show.ok_or(DatabaseError::NotFound(id))
    }

    fn channels(&self) -> Result<Vec<String>, DatabaseError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT DISTINCT channel FROM shows ORDER BY channel")?;
        let channels = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(channels)
    }

    fn topics(&self, channel: &str) -> Result<Vec<String>, DatabaseError> {
        let conn = self.lock()?;
        let topics = if channel.is_empty() {
            let mut stmt = conn.prepare("SELECT DISTINCT topic FROM shows ORDER BY topic")?;
            let rows = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            rows
        } else {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT topic FROM shows WHERE channel = ? ORDER BY topic",
            )?;
            let rows = stmt
                .query_map(params![channel], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            rows
        };
        Ok(topics)
    }

    fn apply_update(&self, payload: &[u8]) -> Result<usize, DatabaseError> {
        // Parse everything before touching the stored catalog.
        let shows = parse_catalog(payload)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM shows", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO shows (channel, topic, title, date, time, duration, description,
                                    website, url, url_small, url_large)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;

            for show in &shows {
                stmt.execute(params![
                    show.channel,
                    show.topic,
                    show.title,
                    show.date.format(DATE_FORMAT).to_string(),
                    show.time.format(TIME_FORMAT).to_string(),
                    show.duration.format(TIME_FORMAT).to_string(),
                    show.description,
                    show.website,
                    show.url,
                    show.url_small,
                    show.url_large,
                ])?;
            }
        }
        tx.commit()?;

        info!(shows = shows.len(), "Applied catalog update");

        Ok(shows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    fn populated() -> SqliteDatabase {
        let db = SqliteDatabase::in_memory().unwrap();
        let shows = vec![
            fixtures::show("ARD", "Tagesschau", "Tagesschau 20:00 Uhr"),
            fixtures::show("ARD", "Tagesschau", "tagesschau 100% Wetter"),
            fixtures::show("ARD", "Sportschau", "Bundesliga"),
            fixtures::show("ZDF", "heute", "heute 19 Uhr"),
            fixtures::show("arte", "Doku", "Alpen"),
        ];
        db.apply_update(&fixtures::catalog_payload(&shows)).unwrap();
        db
    }

    #[test]
    fn test_apply_update_replaces_catalog() {
        let db = populated();
        assert_eq!(db.count().unwrap(), 5);

        let payload = fixtures::catalog_payload(&[fixtures::show("3sat", "Kultur", "Oper")]);
        assert_eq!(db.apply_update(&payload).unwrap(), 1);
        assert_eq!(db.count().unwrap(), 1);
        assert_eq!(db.channels().unwrap(), vec!["3sat"]);
    }

    #[test]
    fn test_apply_update_rejects_malformed_payload() {
        let db = populated();
        let err = db.apply_update(b"not a catalog").unwrap_err();
        assert!(matches!(err, DatabaseError::Parse(_)));
        assert_eq!(db.count().unwrap(), 5);
    }

    #[test]
    fn test_query_ids_filters() {
        let db = populated();

        let all = db
            .query_ids(&QueryFilter::default(), Column::Channel, SortOrder::Ascending)
            .unwrap();
        assert_eq!(all.len(), 5);

        let ard = db
            .query_ids(&QueryFilter::new("ARD", "", ""), Column::Title, SortOrder::Ascending)
            .unwrap();
        assert_eq!(ard.len(), 3);

        let topic = db
            .query_ids(
                &QueryFilter::new("ARD", "Tagesschau", ""),
                Column::Title,
                SortOrder::Ascending,
            )
            .unwrap();
        assert_eq!(topic.len(), 2);

        let title = db
            .query_ids(&QueryFilter::new("", "", "UHR"), Column::Title, SortOrder::Ascending)
            .unwrap();
        assert_eq!(title.len(), 2);
    }

    #[test]
    fn test_title_filter_escapes_wildcards() {
        let db = populated();
        let ids = db
            .query_ids(&QueryFilter::new("", "", "100%"), Column::Title, SortOrder::Ascending)
            .unwrap();
        assert_eq!(ids.len(), 1);

        let none = db
            .query_ids(&QueryFilter::new("", "", "_"), Column::Title, SortOrder::Ascending)
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_query_ids_sort_order() {
        let db = populated();
        let filter = QueryFilter::default();

        let ascending = db
            .query_ids(&filter, Column::Channel, SortOrder::Ascending)
            .unwrap();
        let first = db.fetch_show(ascending[0]).unwrap();
        assert_eq!(first.channel, "ARD");
        let last = db.fetch_show(*ascending.last().unwrap()).unwrap();
        assert_eq!(last.channel, "ZDF");

        let descending = db
            .query_ids(&filter, Column::Channel, SortOrder::Descending)
            .unwrap();
        assert_eq!(db.fetch_show(descending[0]).unwrap().channel, "ZDF");
    }

    #[test]
    fn test_fetch_show_round_trips_fields() {
        let db = SqliteDatabase::in_memory().unwrap();
        let mut show = fixtures::show("ARD", "Tagesschau", "Spät");
        show.url_small = Some("http://media.example/ARD/small.mp4".to_string());
        db.apply_update(&fixtures::catalog_payload(&[show.clone()]))
            .unwrap();

        let ids = db
            .query_ids(&QueryFilter::default(), Column::Date, SortOrder::Ascending)
            .unwrap();
        assert_eq!(db.fetch_show(ids[0]).unwrap(), show);
    }

    #[test]
    fn test_fetch_show_not_found() {
        let db = SqliteDatabase::in_memory().unwrap();
        let err = db.fetch_show(ShowId(42)).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound(ShowId(42))));
    }

    #[test]
    fn test_channels_and_topics() {
        let db = populated();
        assert_eq!(db.channels().unwrap(), vec!["ARD", "ZDF", "arte"]);
        assert_eq!(db.topics("ARD").unwrap(), vec!["Sportschau", "Tagesschau"]);
        assert_eq!(db.topics("").unwrap().len(), 4);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shows.db");

        {
            let db = SqliteDatabase::new(&path).unwrap();
            db.apply_update(&fixtures::catalog_payload(&[fixtures::show("ARD", "T", "x")]))
                .unwrap();
        }

        let db = SqliteDatabase::new(&path).unwrap();
        assert_eq!(db.count().unwrap(), 1);
    }
}
