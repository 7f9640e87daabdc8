//! SQLite storage layer.
//!
//! Repository implementations backed by SQLite with WAL mode and split
//! read/write connection pools. Timestamps are stored as RFC-3339 TEXT and
//! parsed tolerantly: a malformed timestamp surfaces as `None` on the domain
//! record rather than failing the whole batch.

pub mod conversation;
pub mod knowledge;
pub mod lock;
pub mod merge_audit;
pub mod pattern;
pub mod pool;
pub mod relationship;

use chrono::{DateTime, Utc};

/// Parse an optional RFC-3339 TEXT column, mapping malformed values to None.
pub(crate) fn parse_datetime_lossy(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_roundtrip() {
        let dt = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        let parsed = parse_datetime_lossy(Some(format_datetime(&dt)));
        assert_eq!(parsed, Some(dt));
    }

    #[test]
    fn test_malformed_maps_to_none() {
        assert_eq!(parse_datetime_lossy(Some("not a date".to_string())), None);
        assert_eq!(parse_datetime_lossy(Some(String::new())), None);
        assert_eq!(parse_datetime_lossy(None), None);
    }
}
