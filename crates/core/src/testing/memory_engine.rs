//! In-memory query engine for testing.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard};

use crate::database::{
    parse_catalog, Column, DatabaseError, QueryEngine, QueryFilter, Show, ShowId, SortOrder,
};

/// Query engine over a `Vec<Show>`, with call counters for assertions.
///
/// Ids are positions in the show list, starting at 1. `apply_update`
/// parses the payload like the SQLite engine does and replaces the list.
#[derive(Debug, Default)]
pub struct MemoryQueryEngine {
    shows: RwLock<Vec<Show>>,
    queries: AtomicUsize,
    fetches: AtomicUsize,
    topic_listings: AtomicUsize,
    updates: AtomicUsize,
    fail_queries: AtomicBool,
    fail_updates: AtomicBool,
}

impl MemoryQueryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shows(shows: Vec<Show>) -> Self {
        Self {
            shows: RwLock::new(shows),
            ..Self::default()
        }
    }

    pub fn replace_shows(&self, shows: Vec<Show>) {
        *self.shows.write().unwrap_or_else(|e| e.into_inner()) = shows;
    }

    pub fn shows(&self) -> Vec<Show> {
        self.read().map(|s| s.clone()).unwrap_or_default()
    }

    /// Number of `query_ids` calls.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Number of `fetch_show` calls.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of `topics` calls.
    pub fn topic_count(&self) -> usize {
        self.topic_listings.load(Ordering::SeqCst)
    }

    /// Number of `apply_update` calls, successful or not.
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Make `query_ids` fail.
    pub fn set_fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Make `apply_update` fail without touching the shows.
    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<Show>>, DatabaseError> {
        self.shows
            .read()
            .map_err(|_| DatabaseError::Internal("show list poisoned".to_string()))
    }
}

fn compare(column: Column, a: &Show, b: &Show) -> CmpOrdering {
    match column {
        Column::Channel => a.channel.to_lowercase().cmp(&b.channel.to_lowercase()),
        Column::Topic => a.topic.to_lowercase().cmp(&b.topic.to_lowercase()),
        Column::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        Column::Date => a.date.cmp(&b.date),
        Column::Time => a.time.cmp(&b.time),
        Column::Duration => a.duration.cmp(&b.duration),
    }
}

fn sorted_distinct(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut values: Vec<String> = values.collect();
    values.sort();
    values.dedup();
    values
}

impl QueryEngine for MemoryQueryEngine {
    fn query_ids(
        &self,
        filter: &QueryFilter,
        sort_column: Column,
        sort_order: SortOrder,
    ) -> Result<Vec<ShowId>, DatabaseError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(DatabaseError::Database("query failed".to_string()));
        }

        let shows = self.read()?;
        let mut matching: Vec<(usize, &Show)> = shows
            .iter()
            .enumerate()
            .filter(|(_, show)| filter.matches(show))
            .collect();

        matching.sort_by(|(ia, a), (ib, b)| {
            let ordering = compare(sort_column, a, b);
            let ordering = match sort_order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            };
            ordering.then(ia.cmp(ib))
        });

        Ok(matching
            .into_iter()
            .map(|(index, _)| ShowId(index as i64 + 1))
            .collect())
    }

    fn fetch_show(&self, id: ShowId) -> Result<Show, DatabaseError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let shows = self.read()?;
        usize::try_from(id.0 - 1)
            .ok()
            .and_then(|index| shows.get(index))
            .cloned()
            .ok_or(DatabaseError::NotFound(id))
    }

    fn channels(&self) -> Result<Vec<String>, DatabaseError> {
        let shows = self.read()?;
        Ok(sorted_distinct(shows.iter().map(|s| s.channel.clone())))
    }

    fn topics(&self, channel: &str) -> Result<Vec<String>, DatabaseError> {
        self.topic_listings.fetch_add(1, Ordering::SeqCst);

        let shows = self.read()?;
        Ok(sorted_distinct(
            shows
                .iter()
                .filter(|s| channel.is_empty() || s.channel == channel)
                .map(|s| s.topic.clone()),
        ))
    }

    fn apply_update(&self, payload: &[u8]) -> Result<usize, DatabaseError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(DatabaseError::Database("update failed".to_string()));
        }

        let shows = parse_catalog(payload)?;
        let count = shows.len();
        *self
            .shows
            .write()
            .map_err(|_| DatabaseError::Internal("show list poisoned".to_string()))? = shows;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_apply_update_replaces_shows() {
        let engine = MemoryQueryEngine::with_shows(vec![fixtures::show("ARD", "T", "old")]);
        let payload = fixtures::catalog_payload(&[
            fixtures::show("ZDF", "heute", "a"),
            fixtures::show("ZDF", "heute", "b"),
        ]);

        assert_eq!(engine.apply_update(&payload).unwrap(), 2);
        assert_eq!(engine.channels().unwrap(), vec!["ZDF"]);
        assert_eq!(engine.update_count(), 1);
    }

    #[test]
    fn test_failed_update_keeps_shows() {
        let engine = MemoryQueryEngine::with_shows(vec![fixtures::show("ARD", "T", "old")]);
        engine.set_fail_updates(true);

        assert!(engine.apply_update(&fixtures::catalog_payload(&[])).is_err());
        assert_eq!(engine.shows().len(), 1);
    }

    #[test]
    fn test_fetch_unknown_id() {
        let engine = MemoryQueryEngine::new();
        assert!(matches!(
            engine.fetch_show(ShowId(0)),
            Err(DatabaseError::NotFound(ShowId(0)))
        ));
    }
}
