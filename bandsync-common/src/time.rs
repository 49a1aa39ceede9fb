//! Timestamp utilities
//!
//! Date parsing for remote records is total: every input produces a concrete
//! UTC timestamp, falling back to a caller-supplied default (or now) when the
//! value is absent or unparseable.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;
use tracing::warn;

/// Naive date-time layouts accepted after RFC 3339 fails (interpreted as UTC)
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Offset-carrying layouts that are not strict RFC 3339 (e.g. Postgres `+00`)
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Render a timestamp in canonical ISO-8601 form with millisecond precision
///
/// `2024-03-01T12:34:56.789Z`
pub fn format_iso(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a remote date value, never failing
///
/// - absent, null or blank → `fallback`, or now when no fallback is given
/// - unparseable → `fallback` (or now), with a warning
/// - parseable → the parsed instant at full precision
///
/// Strings may be RFC 3339, Postgres-style `YYYY-MM-DD HH:MM:SS+00`, a naive
/// date-time (taken as UTC) or a bare `YYYY-MM-DD` (UTC midnight). Numbers are
/// epoch milliseconds, integral floats included.
pub fn parse_date(value: Option<&Value>, fallback: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let fallback = || fallback.unwrap_or_else(now);

    match value {
        None | Some(Value::Null) => fallback(),
        Some(Value::String(s)) if s.trim().is_empty() => fallback(),
        Some(raw) => match try_parse(raw) {
            Some(parsed) => parsed,
            None => {
                warn!("Invalid date value {}, using fallback", raw);
                fallback()
            }
        },
    }
}

/// Parse an optional remote date
///
/// Absent, blank and unparseable values all map to `None`; unparseable
/// values are logged.
pub fn parse_optional_date(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(raw) => {
            let parsed = try_parse(raw);
            if parsed.is_none() {
                warn!("Invalid optional date value {}, dropping", raw);
            }
            parsed
        }
    }
}

fn try_parse(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_date_str(s.trim()),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .map(|f| f as i64)
            })
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

fn parse_date_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
