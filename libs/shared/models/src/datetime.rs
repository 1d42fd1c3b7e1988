//! Clinic-local datetime helpers shared by the scheduling cells.
//!
//! Appointment times are stored as naive clinic-local datetimes at minute
//! resolution and exchanged on the wire as `YYYY-MM-DD HH:mm:00`.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serializer};

pub const WIRE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const WIRE_DATE_FORMAT: &str = "%Y-%m-%d";
const QUERY_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

pub fn truncate_to_minute(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt)
}

fn parse_naive(raw: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Parses a requested datetime into clinic-local time, truncated to the minute.
///
/// Naive inputs are taken as clinic-local already. Inputs carrying an offset
/// (RFC 3339) are converted into the clinic offset first.
pub fn parse_wire_datetime(raw: &str, clinic_offset: &FixedOffset) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Some(dt) = parse_naive(raw) {
        return Some(truncate_to_minute(dt));
    }

    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| truncate_to_minute(dt.with_timezone(clinic_offset).naive_local()))
}

/// Strict `YYYY-MM-DD`.
pub fn parse_wire_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(raw, WIRE_DATE_FORMAT).ok()
}

pub fn format_wire_datetime(dt: &NaiveDateTime) -> String {
    truncate_to_minute(*dt).format(WIRE_DATETIME_FORMAT).to_string()
}

/// Representation used in PostgREST filters (no whitespace).
pub fn query_datetime(dt: &NaiveDateTime) -> String {
    truncate_to_minute(*dt).format(QUERY_DATETIME_FORMAT).to_string()
}

pub fn clinic_local_to_utc(dt: &NaiveDateTime, clinic_offset: &FixedOffset) -> DateTime<Utc> {
    let shifted = *dt - Duration::seconds(i64::from(clinic_offset.local_minus_utc()));
    Utc.from_utc_datetime(&shifted)
}

/// Serde adapter for `NaiveDateTime` fields in the wire format.
pub mod wire_datetime {
    use super::*;

    pub fn serialize<S>(dt: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_wire_datetime(dt))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_naive(raw.trim())
            .or_else(|| {
                DateTime::parse_from_rfc3339(raw.trim())
                    .ok()
                    .map(|dt| dt.naive_local())
            })
            .map(truncate_to_minute)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid datetime '{}'", raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(19800).unwrap()
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, WIRE_DATETIME_FORMAT).unwrap()
    }

    #[test]
    fn test_parse_wire_datetime_accepts_common_shapes() {
        let expected = dt("2025-03-10 14:00:00");
        assert_eq!(parse_wire_datetime("2025-03-10 14:00", &ist()), Some(expected));
        assert_eq!(parse_wire_datetime("2025-03-10 14:00:00", &ist()), Some(expected));
        assert_eq!(parse_wire_datetime("2025-03-10T14:00:59", &ist()), Some(expected));
        assert_eq!(parse_wire_datetime("2025-03-10T08:30:00Z", &ist()), Some(expected));
    }

    #[test]
    fn test_parse_wire_datetime_rejects_garbage() {
        assert!(parse_wire_datetime("", &ist()).is_none());
        assert!(parse_wire_datetime("next tuesday", &ist()).is_none());
        assert!(parse_wire_datetime("2025-13-40 10:00", &ist()).is_none());
    }

    #[test]
    fn test_parse_wire_date_is_strict() {
        assert!(parse_wire_date("2025-03-11").is_some());
        assert!(parse_wire_date("2025-3-11").is_none());
        assert!(parse_wire_date("11/03/2025").is_none());
    }

    #[test]
    fn test_format_truncates_seconds() {
        assert_eq!(format_wire_datetime(&dt("2025-03-10 14:05:42")), "2025-03-10 14:05:00");
        assert_eq!(query_datetime(&dt("2025-03-10 14:05:42")), "2025-03-10T14:05:00");
    }

    #[test]
    fn test_clinic_local_to_utc() {
        let utc = clinic_local_to_utc(&dt("2025-03-10 14:00:00"), &ist());
        assert_eq!(utc.to_rfc3339(), "2025-03-10T08:30:00+00:00");
    }

    #[derive(Serialize, Deserialize)]
    struct Row {
        #[serde(with = "wire_datetime")]
        at: NaiveDateTime,
    }

    #[test]
    fn test_wire_datetime_serde() {
        let row: Row = serde_json::from_str(r#"{"at":"2025-03-10T14:00:00"}"#).unwrap();
        assert_eq!(row.at, dt("2025-03-10 14:00:00"));
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"{"at":"2025-03-10 14:00:00"}"#);
    }
}
