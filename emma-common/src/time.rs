//! Timestamp utilities

use chrono::{DateTime, SecondsFormat, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Calendar date stamp used in artifact names (`YYYY-MM-DD`)
pub fn date_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

/// RFC 3339 rendering with millisecond precision and a `Z` suffix
pub fn iso(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Convert seconds to duration
pub fn secs_to_duration(secs: u64) -> std::time::Duration {
    std::time::Duration::from_secs(secs)
}
