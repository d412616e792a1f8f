//! Timestamp parsing shared by every provider adapter (spec §4.1).
//!
//! Providers report capture instants either as packed digits
//! (`YYYYMMDDHHMMSS`, Wayback's CDX convention) or as ISO-8601 (Common
//! Crawl's columnar index). Malformed input never errors — it degrades to
//! the Unix epoch with a logged warning, per spec §4.1's factory contract.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::warn;

/// Parse a provider timestamp string into a UTC instant, falling back to
/// the epoch (and logging) for anything that doesn't parse cleanly.
pub fn parse_capture_timestamp(raw: &str) -> DateTime<Utc> {
    if let Some(parsed) = parse_packed(raw) {
        return parsed;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.with_timezone(&Utc);
    }

    warn!(raw_timestamp = raw, "failed to parse capture timestamp, defaulting to epoch");
    DateTime::<Utc>::from_timestamp(0, 0).unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap())
}

fn parse_packed(raw: &str) -> Option<DateTime<Utc>> {
    if raw.len() != 14 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y%m%d%H%M%S").ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

/// Render a UTC instant back into Wayback's packed-digit form, used both by
/// `archive_url` derivation and by the round-trip test in spec §8.
pub fn format_packed(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_packed_digit_timestamp() {
        let parsed = parse_capture_timestamp("20240115120000");
        assert_eq!(format_packed(parsed), "20240115120000");
    }

    #[test]
    fn parses_iso8601_timestamp() {
        let parsed = parse_capture_timestamp("2024-01-15T12:00:00Z");
        assert_eq!(parsed.format("%Y-%m-%d").to_string(), "2024-01-15");
    }

    #[test]
    fn malformed_timestamp_defaults_to_epoch() {
        let parsed = parse_capture_timestamp("not-a-timestamp");
        assert_eq!(parsed.timestamp(), 0);
    }
}
