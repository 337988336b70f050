//! Parser for the decoded Filmliste catalog payload.
//!
//! The payload is JSON-like but repeats object keys, so it cannot be handed to
//! a regular JSON deserializer as a whole:
//!
//! ```text
//! {"Filmliste":[...],"Filmliste":[...],"X":[...],"X":[...]}
//! ```
//!
//! Each `"X"` entry is a JSON array of strings which is deserialized on its own.

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

use super::Show;

const HEADER_PREFIX: &[u8] = b"{\"Filmliste\":[";
const ITEM_PREFIX: &[u8] = b"\"X\":[";
const ITEM_SEPARATOR: &[u8] = b"],\"X\":[";
const LIST_SUFFIX: &[u8] = b"]}";

const FIELD_CHANNEL: usize = 0;
const FIELD_TOPIC: usize = 1;
const FIELD_TITLE: usize = 2;
const FIELD_DATE: usize = 3;
const FIELD_TIME: usize = 4;
const FIELD_DURATION: usize = 5;
const FIELD_DESCRIPTION: usize = 7;
const FIELD_URL: usize = 8;
const FIELD_WEBSITE: usize = 9;
const FIELD_URL_SMALL: usize = 12;
const FIELD_URL_LARGE: usize = 14;
const MIN_FIELDS: usize = FIELD_URL_LARGE + 1;

/// Errors produced while parsing a catalog payload.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed header")]
    MalformedHeader,

    #[error("catalog contains no entries")]
    NoEntries,

    #[error("malformed entry at byte {offset}")]
    MalformedItem { offset: usize },

    #[error("malformed last entry at byte {offset}")]
    MalformedLastItem { offset: usize },

    #[error("entry at byte {offset} has {found} fields, expected at least 15")]
    MissingFields { offset: usize, found: usize },

    #[error("invalid {field} '{value}'")]
    InvalidField { field: &'static str, value: String },

    #[error("invalid JSON in entry: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parse a complete decoded catalog into shows.
///
/// Empty channel and topic fields inherit the value of the previous entry.
pub fn parse_catalog(input: &[u8]) -> Result<Vec<Show>, ParseError> {
    let mut pos = skip_header(input)?;
    let mut shows = Vec::new();
    let mut channel = String::new();
    let mut topic = String::new();

    loop {
        let rest = &input[pos..];

        if !rest.starts_with(ITEM_PREFIX) {
            return Err(ParseError::MalformedItem { offset: pos });
        }

        let (fields, next) = match find_bytes(&rest[ITEM_PREFIX.len()..], ITEM_SEPARATOR) {
            Some(end) => {
                let close = ITEM_PREFIX.len() + end;
                (&rest[ITEM_PREFIX.len() - 1..=close], Some(pos + close + 2))
            }
            None => {
                let trimmed = rest.trim_ascii_end();
                if trimmed.len() < ITEM_PREFIX.len() + LIST_SUFFIX.len()
                    || !trimmed.ends_with(LIST_SUFFIX)
                {
                    return Err(ParseError::MalformedLastItem { offset: pos });
                }
                (&trimmed[ITEM_PREFIX.len() - 1..trimmed.len() - 1], None)
            }
        };

        let show = parse_fields(fields, pos, &mut channel, &mut topic)?;
        shows.push(show);

        match next {
            Some(next) => pos = next,
            None => return Ok(shows),
        }
    }
}

fn skip_header(input: &[u8]) -> Result<usize, ParseError> {
    if !input.starts_with(HEADER_PREFIX) {
        return Err(ParseError::MalformedHeader);
    }

    // The separator after the second header array also opens the first entry.
    let end = find_bytes(&input[HEADER_PREFIX.len()..], ITEM_SEPARATOR)
        .ok_or(ParseError::NoEntries)?;

    Ok(HEADER_PREFIX.len() + end + 2)
}

fn parse_fields(
    raw: &[u8],
    offset: usize,
    channel: &mut String,
    topic: &mut String,
) -> Result<Show, ParseError> {
    let mut fields: Vec<String> = serde_json::from_slice(raw)?;

    if fields.len() < MIN_FIELDS {
        return Err(ParseError::MissingFields {
            offset,
            found: fields.len(),
        });
    }

    let mut take = |index: usize| std::mem::take(&mut fields[index]);

    let channel_field = take(FIELD_CHANNEL);
    if !channel_field.is_empty() {
        *channel = channel_field;
    }
    let topic_field = take(FIELD_TOPIC);
    if !topic_field.is_empty() {
        *topic = topic_field;
    }

    let title = take(FIELD_TITLE);
    let date = parse_date(&take(FIELD_DATE))?;
    let time = parse_time("time", &take(FIELD_TIME))?;
    let duration = parse_time("duration", &take(FIELD_DURATION))?;
    let description = take(FIELD_DESCRIPTION);
    let website = take(FIELD_WEBSITE);
    let url = take(FIELD_URL);
    let url_small = parse_url_suffix(&url, take(FIELD_URL_SMALL))?;
    let url_large = parse_url_suffix(&url, take(FIELD_URL_LARGE))?;

    Ok(Show {
        channel: channel.clone(),
        topic: topic.clone(),
        title,
        date,
        time,
        duration,
        description,
        website,
        url,
        url_small,
        url_large,
    })
}

fn parse_date(field: &str) -> Result<NaiveDate, ParseError> {
    if field.is_empty() {
        return Ok(NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or_default());
    }

    NaiveDate::parse_from_str(field, "%d.%m.%Y").map_err(|_| ParseError::InvalidField {
        field: "date",
        value: field.to_string(),
    })
}

fn parse_time(name: &'static str, field: &str) -> Result<NaiveTime, ParseError> {
    if field.is_empty() {
        return Ok(NaiveTime::default());
    }

    NaiveTime::parse_from_str(field, "%H:%M:%S").map_err(|_| ParseError::InvalidField {
        field: name,
        value: field.to_string(),
    })
}

/// Expand a URL suffix field relative to the default URL.
///
/// `"<n>|<tail>"` keeps the first `n` bytes of `url` and appends `tail`;
/// anything else is appended to `url` as a whole.
fn parse_url_suffix(url: &str, mut field: String) -> Result<Option<String>, ParseError> {
    if field.is_empty() {
        return Ok(None);
    }

    if let Some(pos) = field.find('|') {
        let invalid = || ParseError::InvalidField {
            field: "url suffix",
            value: field.clone(),
        };
        let index: usize = field[..pos].parse().map_err(|_| invalid())?;
        let prefix = url.get(..index).ok_or_else(invalid)?;

        field.replace_range(..=pos, prefix);
    } else {
        field.insert_str(0, url);
    }

    Ok(Some(field))
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
