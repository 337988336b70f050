//! Types shared by the query engine, the result window and the HTTP surface.

use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::parser::ParseError;

/// Opaque identifier assigned to a show by the query engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShowId(pub i64);

impl fmt::Display for ShowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Show {
    pub channel: String,
    pub topic: String,
    pub title: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    /// Running time, stored as a time of day (`hh:mm:ss`).
    pub duration: NaiveTime,
    pub description: String,
    pub website: String,
    /// Default quality media URL.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_small: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_large: Option<String>,
}

impl Show {
    /// Resolve the media URL for the preferred quality, falling back to the
    /// other qualities when the preferred one is missing.
    pub fn preferred_url(&self, quality: UrlQuality) -> Option<&str> {
        let default = Some(self.url.as_str());
        let small = self.url_small.as_deref();
        let large = self.url_large.as_deref();

        let order = match quality {
            UrlQuality::Default => [default, small, large],
            UrlQuality::Small => [small, default, large],
            UrlQuality::Large => [large, default, small],
        };

        order.into_iter().flatten().find(|url| !url.is_empty())
    }
}

/// Media URL quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlQuality {
    #[default]
    Default,
    Small,
    Large,
}

/// The six visible columns, which double as sort keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    #[default]
    Channel,
    Topic,
    Title,
    Date,
    Time,
    Duration,
}

impl Column {
    pub const ALL: [Column; 6] = [
        Column::Channel,
        Column::Topic,
        Column::Title,
        Column::Date,
        Column::Time,
        Column::Duration,
    ];

    /// Column for a zero-based section index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn header(self) -> &'static str {
        match self {
            Column::Channel => "Channel",
            Column::Topic => "Topic",
            Column::Title => "Title",
            Column::Date => "Date",
            Column::Time => "Time",
            Column::Duration => "Duration",
        }
    }

    /// Display text for this column of a show.
    pub fn display(self, show: &Show) -> String {
        match self {
            Column::Channel => show.channel.clone(),
            Column::Topic => show.topic.clone(),
            Column::Title => show.title.clone(),
            Column::Date => show.date.format("%d.%m.%y").to_string(),
            Column::Time => show.time.format("%H:%M").to_string(),
            Column::Duration => show.duration.format("%H:%M:%S").to_string(),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn toggled(self) -> Self {
        match self {
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::Descending => SortOrder::Ascending,
        }
    }
}

/// Channel, topic and title filters. Empty strings mean "no filter".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueryFilter {
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub title: String,
}

impl QueryFilter {
    pub fn new(
        channel: impl Into<String>,
        topic: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            topic: topic.into(),
            title: title.into(),
        }
    }

    /// Whether a show passes all three filters.
    pub fn matches(&self, show: &Show) -> bool {
        (self.channel.is_empty() || show.channel == self.channel)
            && (self.topic.is_empty() || show.topic == self.topic)
            && (self.title.is_empty()
                || show
                    .title
                    .to_lowercase()
                    .contains(&self.title.to_lowercase()))
    }
}

/// Errors for query engine operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Show not found: {0}")]
    NotFound(ShowId),

    #[error("Malformed catalog: {0}")]
    Parse(#[from] ParseError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(e: rusqlite::Error) -> Self {
        DatabaseError::Database(e.to_string())
    }
}
