//! Lazy, paginated view over a query result.
//!
//! A [`ResultWindow`] holds the ordered show ids produced by the current
//! (filter, sort) query and a cursor counting how many of them are visible as
//! rows. Rows become visible in fixed-size batches through
//! [`ResultWindow::fetch_more`]. Row access goes through an LRU cache of
//! hydrated shows, so each distinct show costs at most one engine fetch while
//! it stays cached.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::cache::{CacheStats, ObjectCache, DEFAULT_CACHE_CAPACITY};
use crate::database::{Column, DatabaseError, QueryEngine, QueryFilter, Show, ShowId, SortOrder};
use crate::metrics;

/// Number of rows made visible per [`ResultWindow::fetch_more`] call.
pub const DEFAULT_WINDOW_SIZE: usize = 256;

/// Filters plus sort key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WindowQuery {
    #[serde(flatten)]
    pub filter: QueryFilter,
    #[serde(default)]
    pub sort_column: Column,
    #[serde(default)]
    pub sort_order: SortOrder,
}

/// Changes observers must apply to their row view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WindowEvent {
    /// Everything changed; drop all rows.
    Reset,
    /// Rows `first..=last` were appended.
    RowsInserted { first: usize, last: usize },
}

#[derive(Debug, Error)]
pub enum WindowError {
    #[error("row {row} out of range (row count {row_count})")]
    RowOutOfRange { row: usize, row_count: usize },

    #[error(transparent)]
    Engine(#[from] DatabaseError),
}

pub struct ResultWindow {
    engine: Arc<dyn QueryEngine>,
    cache: ObjectCache<ShowId, Show>,
    query: WindowQuery,
    ids: Vec<ShowId>,
    fetched: usize,
    window_size: usize,
    channels: Vec<String>,
    topics: Vec<String>,
}

impl ResultWindow {
    /// Create a window and run the default query (no filters, channel ascending).
    pub fn new(engine: Arc<dyn QueryEngine>) -> Result<Self, WindowError> {
        Self::with_sizes(engine, DEFAULT_WINDOW_SIZE, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_sizes(
        engine: Arc<dyn QueryEngine>,
        window_size: usize,
        cache_capacity: usize,
    ) -> Result<Self, WindowError> {
        let mut window = Self {
            engine,
            cache: ObjectCache::new(cache_capacity),
            query: WindowQuery::default(),
            ids: Vec::new(),
            fetched: 0,
            window_size: window_size.max(1),
            channels: vec![String::new()],
            topics: vec![String::new()],
        };
        window.refresh()?;
        Ok(window)
    }

    pub fn query(&self) -> &WindowQuery {
        &self.query
    }

    /// Replace the query.
    ///
    /// Returns `None` if the query is unchanged. Otherwise the id sequence is
    /// recomputed and the cursor reset, even if the result is the same.
    /// The topic list is reloaded only when the channel filter changes.
    pub fn set_query(&mut self, query: WindowQuery) -> Result<Option<WindowEvent>, WindowError> {
        if query == self.query {
            return Ok(None);
        }

        let topics = if query.filter.channel != self.query.filter.channel {
            Some(with_empty_entry(self.engine.topics(&query.filter.channel)?))
        } else {
            None
        };

        let ids = self
            .engine
            .query_ids(&query.filter, query.sort_column, query.sort_order)?;

        if let Some(topics) = topics {
            self.topics = topics;
        }
        self.reset_ids(query, ids);

        Ok(Some(WindowEvent::Reset))
    }

    /// Change only the filters, keeping the sort.
    pub fn set_filter(&mut self, filter: QueryFilter) -> Result<Option<WindowEvent>, WindowError> {
        let query = WindowQuery {
            filter,
            ..self.query.clone()
        };
        self.set_query(query)
    }

    /// Change only the sort, keeping the filters.
    pub fn set_sort(
        &mut self,
        sort_column: Column,
        sort_order: SortOrder,
    ) -> Result<Option<WindowEvent>, WindowError> {
        let query = WindowQuery {
            sort_column,
            sort_order,
            ..self.query.clone()
        };
        self.set_query(query)
    }

    /// Sort by `column`, toggling the direction if it is already the sort
    /// column and starting ascending otherwise.
    pub fn sort_by_column(&mut self, column: Column) -> Result<WindowEvent, WindowError> {
        let order = if column == self.query.sort_column {
            self.query.sort_order.toggled()
        } else {
            SortOrder::Ascending
        };

        let event = self.set_sort(column, order)?;
        Ok(event.unwrap_or(WindowEvent::Reset))
    }

    /// Re-run the current query and reload the channel and topic lists.
    pub fn refresh(&mut self) -> Result<WindowEvent, WindowError> {
        let channels = with_empty_entry(self.engine.channels()?);
        let topics = with_empty_entry(self.engine.topics(&self.query.filter.channel)?);
        let ids = self.engine.query_ids(
            &self.query.filter,
            self.query.sort_column,
            self.query.sort_order,
        )?;

        self.channels = channels;
        self.topics = topics;
        let query = self.query.clone();
        self.reset_ids(query, ids);

        Ok(WindowEvent::Reset)
    }

    fn reset_ids(&mut self, query: WindowQuery, ids: Vec<ShowId>) {
        debug!(
            query = ?query,
            total = ids.len(),
            "Result window reset"
        );
        self.query = query;
        self.ids = ids;
        self.fetched = 0;
    }

    /// Visible rows, i.e. the fetch cursor.
    pub fn row_count(&self) -> usize {
        self.fetched
    }

    /// Length of the full id sequence.
    pub fn total(&self) -> usize {
        self.ids.len()
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn can_fetch_more(&self) -> bool {
        self.fetched < self.ids.len()
    }

    /// Make the next batch of rows visible.
    pub fn fetch_more(&mut self) -> Option<WindowEvent> {
        if !self.can_fetch_more() {
            return None;
        }

        let count = self.window_size.min(self.ids.len() - self.fetched);
        let first = self.fetched;
        self.fetched += count;

        Some(WindowEvent::RowsInserted {
            first,
            last: self.fetched - 1,
        })
    }

    pub fn id_at(&self, row: usize) -> Result<ShowId, WindowError> {
        if row >= self.fetched {
            return Err(WindowError::RowOutOfRange {
                row,
                row_count: self.fetched,
            });
        }
        Ok(self.ids[row])
    }

    /// Apply `f` to the show at `row`, fetching it from the engine on a cache
    /// miss.
    pub fn with_show<R>(&mut self, row: usize, f: impl FnOnce(&Show) -> R) -> Result<R, WindowError> {
        let id = self.id_at(row)?;

        if let Some(show) = self.cache.get(&id) {
            metrics::CACHE_LOOKUPS.with_label_values(&["hit"]).inc();
            return Ok(f(show));
        }

        metrics::CACHE_LOOKUPS.with_label_values(&["miss"]).inc();
        let show = self.engine.fetch_show(id)?;
        let result = f(&show);
        self.cache.put(id, show);

        Ok(result)
    }

    /// Display text of one column.
    pub fn field_at(&mut self, row: usize, column: Column) -> Result<String, WindowError> {
        self.with_show(row, |show| column.display(show))
    }

    pub fn show_at(&mut self, row: usize) -> Result<Show, WindowError> {
        self.with_show(row, Show::clone)
    }

    /// Channel listing with the empty "no filter" entry first.
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Topics for the current channel filter, with the empty entry first.
    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

fn with_empty_entry(mut values: Vec<String>) -> Vec<String> {
    values.insert(0, String::new());
    values
}
