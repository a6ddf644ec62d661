//! UTC timestamp helpers shared by every component that touches the clock.
//!
//! Every timestamp in this system is a `DateTime<Utc>`. Naive timestamps are
//! coerced to UTC at the boundary (message decode, query parameter parse)
//! and never compared against aware ones past that point.

use chrono::{DateTime, Duration, NaiveDateTime, Timelike, Utc};
use serde::de::{Deserialize, Deserializer, Error as DeError};

/// Floor a timestamp to the start of its UTC clock hour.
pub fn floor_to_hour(t: DateTime<Utc>) -> DateTime<Utc> {
    t.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .expect("zeroing minute/second/nanosecond of a valid timestamp cannot fail")
}

/// Treat a timestamp lacking a zone as UTC; a timestamp that already carries
/// one is reduced to UTC with no change in instant.
pub fn naive_as_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(naive, Utc)
}

/// Formats tried, in order, for a timestamp string with no recognisable
/// offset. Covers the `T`- and space-separated ISO-8601 variants, each with
/// an optional fractional-second component.
const NAIVE_FORMATS: &[&str] =
    &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a timestamp string that may or may not carry a UTC offset. Inputs
/// lacking a zone are assumed to already be UTC, per the zone-less-input
/// contract; inputs carrying one (including a trailing `Z`) are converted to
/// UTC with no change in instant.
pub fn parse_utc_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(naive_as_utc)
}

/// `serde(deserialize_with)` helper for a required UTC timestamp field that
/// may arrive zone-less.
pub fn deserialize_utc_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_utc_timestamp(&raw).ok_or_else(|| DeError::custom(format!("invalid timestamp: {raw}")))
}

/// `serde(deserialize_with)` helper for an optional UTC timestamp field that
/// may arrive zone-less.
pub fn deserialize_opt_utc_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|s| {
        parse_utc_timestamp(&s).ok_or_else(|| DeError::custom(format!("invalid timestamp: {s}")))
    })
    .transpose()
}

/// Total elapsed seconds between two instants as a floating-point value,
/// including sub-second resolution. This is the total elapsed duration, not
/// the truncated intra-day remainder some historical implementations
/// returned for multi-day deltas.
pub fn elapsed_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta: Duration = to - from;
    delta.num_nanoseconds().map(|ns| ns as f64 / 1_000_000_000.0).unwrap_or_else(|| {
        delta.num_milliseconds() as f64 / 1_000.0
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn floors_to_the_hour() {
        let t = Utc.with_ymd_and_hms(2025, 2, 12, 13, 34, 22).unwrap();
        let floored = floor_to_hour(t);
        assert_eq!(floored, Utc.with_ymd_and_hms(2025, 2, 12, 13, 0, 0).unwrap());
    }

    #[test]
    fn elapsed_seconds_spans_days() {
        let from = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2025, 1, 3, 0, 0, 0).unwrap();
        assert_eq!(elapsed_seconds(from, to), 172_800.0);
    }

    #[test]
    fn parses_zoned_timestamps() {
        let expected = Utc.with_ymd_and_hms(2025, 1, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_utc_timestamp("2025-01-01T12:30:00Z"), Some(expected));
        assert_eq!(parse_utc_timestamp("2025-01-01T13:30:00+01:00"), Some(expected));
    }

    #[test]
    fn parses_zoneless_timestamps_as_utc() {
        let expected = Utc.with_ymd_and_hms(2025, 1, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_utc_timestamp("2025-01-01T12:30:00"), Some(expected));
        assert_eq!(parse_utc_timestamp("2025-01-01 12:30:00"), Some(expected));
        assert_eq!(parse_utc_timestamp("2025-01-01T12:30:00.500"), Some(expected + Duration::milliseconds(500)));
    }

    #[test]
    fn rejects_unparseable_timestamps() {
        assert_eq!(parse_utc_timestamp("not a timestamp"), None);
    }
}
