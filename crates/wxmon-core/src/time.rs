//! Timestamp parsing for the `obsTimeLocal` style strings sent by stations

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Space-delimited wall clock time, the shape of `obsTimeLocal`
pub const LOCAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// ISO-8601 with a literal `Z` suffix
pub const UTC_Z_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Offset-bearing fallbacks tried after RFC 3339
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

/// Naive fallbacks tried last
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unrecognised timestamp: {0:?}")]
pub struct TimeParseError(pub String);

/// A parsed timestamp, keeping the offset when the source string had one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParsedTime {
    /// Wall clock time with no offset information
    Local(NaiveDateTime),
    /// Instant with a known offset
    Zoned(DateTime<FixedOffset>),
}

impl ParsedTime {
    /// Canonical text form, parseable again by [`parse_timestamp`]
    ///
    /// Wall clock times use [`LOCAL_FORMAT`]; zoned times use RFC 3339. Both
    /// start with `YYYY-MM-DD`, which the store relies on for date filters.
    pub fn to_storage_string(&self) -> String {
        match self {
            ParsedTime::Local(naive) => naive.format(LOCAL_FORMAT).to_string(),
            ParsedTime::Zoned(dt) => dt.to_rfc3339(),
        }
    }
}

impl fmt::Display for ParsedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_storage_string())
    }
}

/// Parse a timestamp string, trying known shapes in priority order
///
/// 1. `2024-01-01 00:00:00` (wall clock)
/// 2. `2024-01-01T00:00:00Z` (UTC)
/// 3. RFC 3339 and other offset-bearing shapes
/// 4. naive ISO-8601 with optional fractional seconds
pub fn parse_timestamp(input: &str) -> Result<ParsedTime, TimeParseError> {
    let s = input.trim();

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, LOCAL_FORMAT) {
        return Ok(ParsedTime::Local(naive));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, UTC_Z_FORMAT) {
        return Ok(ParsedTime::Zoned(naive.and_utc().fixed_offset()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(ParsedTime::Zoned(dt));
    }

    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Ok(ParsedTime::Zoned(dt));
        }
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(ParsedTime::Local(naive));
        }
    }

    Err(TimeParseError(input.to_string()))
}

/// UTC instant for an integer Unix timestamp
pub fn utc_from_epoch(epoch: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(epoch, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate, Timelike};

    fn zoned(input: &str) -> DateTime<FixedOffset> {
        match parse_timestamp(input).unwrap() {
            ParsedTime::Zoned(dt) => dt,
            other => panic!("expected an offset for {input}, got {other:?}"),
        }
    }

    fn local(input: &str) -> NaiveDateTime {
        match parse_timestamp(input).unwrap() {
            ParsedTime::Local(naive) => naive,
            other => panic!("expected wall clock for {input}, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_local_format() {
        let naive = local("2024-01-01 00:00:00");
        assert_eq!(naive.year(), 2024);
        assert_eq!(
            ParsedTime::Local(naive).to_storage_string(),
            "2024-01-01 00:00:00"
        );
    }

    #[test]
    fn test_parse_utc_z_format() {
        let dt = zoned("2024-06-15T12:30:00Z");
        assert_eq!(dt.timestamp(), 1_718_454_600);
        assert_eq!(dt.with_timezone(&Utc).hour(), 12);
    }

    #[test]
    fn test_parse_offset_formats() {
        let dt = zoned("2024-06-15T14:30:00+02:00");
        assert_eq!(dt.timestamp(), 1_718_454_600);
        assert_eq!(dt.naive_local().hour(), 14);

        assert_eq!(zoned("2024-06-15 08:30:00-0400").timestamp(), 1_718_454_600);
        assert_eq!(zoned("2024-06-15T12:30:00.250+00:00").timestamp(), 1_718_454_600);
    }

    #[test]
    fn test_parse_naive_iso() {
        let naive = local("2024-06-15T12:30:00");
        assert_eq!(naive.date(), NaiveDate::from_ymd_opt(2024, 6, 15).unwrap());
    }

    #[test]
    fn test_storage_string_reparses() {
        for input in ["2024-01-01 00:00:00", "2024-06-15T14:30:00+02:00"] {
            let parsed = parse_timestamp(input).unwrap();
            let again = parse_timestamp(&parsed.to_storage_string()).unwrap();
            assert_eq!(parsed, again);
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_timestamp("yesterday").is_err());
        assert!(parse_timestamp("").is_err());
        assert!(parse_timestamp("2024-13-01 00:00:00").is_err());
    }

    #[test]
    fn test_utc_from_epoch() {
        assert_eq!(utc_from_epoch(1000).unwrap().timestamp(), 1000);
        assert!(utc_from_epoch(i64::MAX).is_none());
    }
}
