//! Tolerant timestamp parsing.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// Parses a timestamp into a UTC instant.
///
/// Accepts RFC 3339 (`2024-01-15T10:30:00Z`, `...+03:00`), offsets without a
/// colon, naive date-times and bare `YYYY-MM-DD` dates. Naive values are read
/// as UTC. Returns `None` for anything else; callers exclude such records
/// instead of substituting a made-up instant.
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in OFFSET_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(input, format) {
            return Some(parsed.with_timezone(&Utc));
        }
    }

    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(input, format) {
            return Some(parsed.and_utc());
        }
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}

/// Timestamps that could be read from a batch of records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedTimestamps {
    /// Parsed instants, sorted ascending.
    pub instants: Vec<DateTime<Utc>>,
    /// Records whose timestamp was missing or unreadable.
    pub skipped: usize,
}

/// Parses every present timestamp, counting missing and unreadable ones.
pub fn parse_all<'a, I>(raw: I) -> ParsedTimestamps
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut parsed = ParsedTimestamps::default();
    for value in raw {
        match value.and_then(parse_timestamp) {
            Some(instant) => parsed.instants.push(instant),
            None => parsed.skipped += 1,
        }
    }
    parsed.instants.sort_unstable();
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn parses_rfc3339_with_zulu_and_offset() {
        assert_eq!(
            parse_timestamp("2024-01-15T10:30:00Z"),
            Some(utc(2024, 1, 15, 10, 30, 0))
        );
        assert_eq!(
            parse_timestamp("2024-01-15T13:30:00+03:00"),
            Some(utc(2024, 1, 15, 10, 30, 0))
        );
    }

    #[test]
    fn parses_offset_without_colon() {
        assert_eq!(
            parse_timestamp("2024-01-15T10:30:00+0000"),
            Some(utc(2024, 1, 15, 10, 30, 0))
        );
    }

    #[test]
    fn parses_naive_values_as_utc() {
        assert_eq!(
            parse_timestamp("2024-01-15T10:30:00"),
            Some(utc(2024, 1, 15, 10, 30, 0))
        );
        assert_eq!(
            parse_timestamp("2024-01-15 10:30:00.250"),
            Some(utc(2024, 1, 15, 10, 30, 0) + chrono::Duration::milliseconds(250))
        );
        assert_eq!(parse_timestamp("2024-01-15"), Some(utc(2024, 1, 15, 0, 0, 0)));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2024-13-45"), None);
    }

    #[test]
    fn parse_all_sorts_and_counts_skipped() {
        let parsed = parse_all(vec![
            Some("2024-01-03"),
            None,
            Some("not a date"),
            Some("2024-01-01T00:00:00Z"),
        ]);
        assert_eq!(
            parsed.instants,
            vec![utc(2024, 1, 1, 0, 0, 0), utc(2024, 1, 3, 0, 0, 0)]
        );
        assert_eq!(parsed.skipped, 2);
    }
}
