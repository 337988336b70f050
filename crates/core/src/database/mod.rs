//! Show database - the queryable store behind the result window.
//!
//! The database answers filtered, sorted id queries and fetches individual
//! shows by id. Catalog updates replace the whole table atomically.

mod parser;
mod sqlite;
mod types;

pub use parser::{parse_catalog, ParseError};
pub use sqlite::SqliteDatabase;
pub use types::*;

/// Trait for the show query engine.
pub trait QueryEngine: Send + Sync {
    /// Ids of all shows passing `filter`, in the requested order.
    ///
    /// Ties are broken by id so the order is stable across calls.
    fn query_ids(
        &self,
        filter: &QueryFilter,
        sort_column: Column,
        sort_order: SortOrder,
    ) -> Result<Vec<ShowId>, DatabaseError>;

    /// Fetch a single show by id.
    fn fetch_show(&self, id: ShowId) -> Result<Show, DatabaseError>;

    /// Distinct channels, sorted.
    fn channels(&self) -> Result<Vec<String>, DatabaseError>;

    /// Distinct topics of a channel, or of all channels when `channel` is empty.
    fn topics(&self, channel: &str) -> Result<Vec<String>, DatabaseError>;

    /// Replace the stored catalog with a decoded catalog payload.
    ///
    /// The payload is parsed completely before anything is written, so a
    /// malformed payload leaves the current catalog untouched.
    ///
    /// Returns the number of shows stored.
    fn apply_update(&self, payload: &[u8]) -> Result<usize, DatabaseError>;
}
