//! Timestamp normalization for platform payloads.
//!
//! The platform emits RFC-3339 strings with `Z` or `+09:00` offsets, and
//! occasionally naive datetimes. Everything is normalized to UTC on ingest;
//! naive values are read as UTC.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

/// Parse a platform timestamp into UTC. Returns `None` for unparseable input.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(naive.and_utc());
        }
    }

    None
}

/// Whether `published` falls within the recency window ending at `now`.
pub fn within_threshold(published: DateTime<Utc>, now: DateTime<Utc>, threshold_days: i64) -> bool {
    published >= now - Duration::days(threshold_days)
}
