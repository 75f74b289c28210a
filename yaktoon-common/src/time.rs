//! Timestamp utilities

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current time as RFC 3339 with millisecond precision (`2025-01-01T00:00:00.000Z`)
pub fn now_iso() -> String {
    to_iso(&now())
}

pub fn to_iso(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    now().timestamp_millis()
}

/// Parse an RFC 3339 timestamp; `None` for anything unparseable
pub fn parse_iso(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Sort key for stored timestamps, which are either RFC 3339 strings or epoch millis
pub fn sort_key(s: &str) -> i64 {
    if let Some(dt) = parse_iso(s) {
        return dt.timestamp_millis();
    }
    s.trim().parse::<i64>().unwrap_or(0)
}

/// Epoch millis → RFC 3339, `None` when out of range
pub fn millis_to_iso(ms: i64) -> Option<String> {
    Utc.timestamp_millis_opt(ms).single().map(|dt| to_iso(&dt))
}

/// Calendar day label used to bucket study activity, e.g. `Sat Oct 18 2026` (UTC)
pub fn day_label(ts: &DateTime<Utc>) -> String {
    ts.format("%a %b %d %Y").to_string()
}
