//! Database CRUD operations.

pub mod chunks;
pub mod conversations;
pub mod documents;
pub mod jobs;
pub mod stats;
pub mod vectors;

use chrono::{DateTime, Utc};

/// Parse a stored RFC 3339 timestamp, falling back to now for corrupt rows.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

pub(crate) fn parse_optional_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

/// Wrap a JSON decoding failure so it can be returned from a row mapper.
pub(crate) fn json_column_error(idx: usize, err: serde_json::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}
