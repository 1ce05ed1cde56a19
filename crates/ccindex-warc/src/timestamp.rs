//! Capture time conversion: `WARC-Date` to the 14-digit CDX timestamp

use chrono::{DateTime, NaiveDateTime, Utc};

const CDX_FORMAT: &str = "%Y%m%d%H%M%S";

/// `2024-01-01T00:00:00Z` → `20240101000000`.
///
/// Accepts RFC 3339 with optional fractional seconds and offset; a missing
/// offset is read as UTC. Returns `None` for anything else.
pub fn cdx_timestamp(warc_date: &str) -> Option<String> {
    let s = warc_date.trim();
    let utc = match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(_) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()?
            .and_utc(),
    };
    Some(utc.format(CDX_FORMAT).to_string())
}
