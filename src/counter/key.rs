//! Minute-resolution bucket keys.
//!
//! Keys are `YYYYMMDDHHMM` in UTC, e.g. `202610181504`.

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};

/// strftime layout of a bucket key.
pub const KEY_FORMAT: &str = "%Y%m%d%H%M";

/// Key of the bucket containing `at`.
pub fn bucket_key(at: DateTime<Utc>) -> String {
    at.format(KEY_FORMAT).to_string()
}

/// Key of the bucket for the current wall-clock minute.
pub fn current_key() -> String {
    bucket_key(Utc::now())
}

/// Parse a key back to the start of its minute. `None` if malformed.
pub fn parse_key(key: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(key, KEY_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Drop seconds and sub-second precision.
pub fn truncate_to_minute(at: DateTime<Utc>) -> DateTime<Utc> {
    at.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(at)
}
