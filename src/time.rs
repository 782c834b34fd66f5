//! Timestamp helpers shared by the graph, analytics and wiki layers.
//!
//! Rows store timestamps as RFC 3339 strings.  Older rows (and documents
//! imported from elsewhere) may carry naive `YYYY-MM-DDTHH:MM:SS` values or bare
//! dates; those are read as UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Format `ts` as an RFC 3339 string with second precision, e.g.
/// `"2025-04-01T12:00:00Z"`.
pub fn to_iso8601(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Current UTC time as an RFC 3339 string.
pub fn now_iso8601() -> String {
    to_iso8601(Utc::now())
}

/// Parse a stored timestamp.  Returns `None` for empty or unparseable input.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};

    #[test]
    fn parses_rfc3339_with_offset() {
        let ts = parse_timestamp("2025-10-01T10:00:00+02:00").unwrap();
        assert_eq!(ts.hour(), 8);
    }

    #[test]
    fn parses_naive_and_fractional() {
        let ts = parse_timestamp("2025-10-01T00:00:00").unwrap();
        assert_eq!(ts.day(), 1);
        assert!(parse_timestamp("2025-10-01T00:00:00.123456").is_some());
    }

    #[test]
    fn parses_bare_date() {
        let ts = parse_timestamp("2025-10-07").unwrap();
        assert_eq!((ts.month(), ts.day(), ts.hour()), (10, 7, 0));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn formats_second_precision() {
        let ts = Utc.with_ymd_and_hms(2025, 4, 1, 12, 0, 0).unwrap();
        assert_eq!(to_iso8601(ts), "2025-04-01T12:00:00Z");
    }
}
