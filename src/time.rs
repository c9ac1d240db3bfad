//! Time helpers for bucket timestamps.
//!
//! Timestamps travel as epoch milliseconds on both encodings; the structured
//! view additionally renders them as RFC 3339 strings.

use crate::error::RecordError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Longest all-digit string still read as epoch seconds rather than millis.
const EPOCH_SECONDS_MAX_LEN: usize = 10;

pub fn from_epoch_millis(millis: i64) -> Result<DateTime<Utc>, RecordError> {
    DateTime::from_timestamp_millis(millis).ok_or(RecordError::TimestampOutOfRange(millis))
}

/// Current wall-clock time truncated to millisecond precision.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

pub fn format_date(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Convert a date string to epoch milliseconds.
///
/// Accepts epoch seconds (up to ten digits), epoch millis (longer digit
/// strings), or an ISO-8601 date with optional time: `2017-07-14`,
/// `2017-07-14T02:40`, `2017-07-14T02:40:00.123`, each optionally followed by
/// `Z` or a numeric offset. Dates without an offset are taken as UTC.
/// Digit strings with surrounding whitespace are not epoch values.
pub fn date_string_to_epoch(date: &str) -> Option<i64> {
    if let Ok(epoch) = date.parse::<i64>() {
        return if date.len() <= EPOCH_SECONDS_MAX_LEN {
            epoch.checked_mul(1000)
        } else {
            Some(epoch)
        };
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(date) {
        return Some(parsed.timestamp_millis());
    }

    if let Some(parsed) = ["%Y-%m-%dT%H:%M%z", "%Y-%m-%dT%H:%M:%S%.f%z"]
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(date, fmt).ok())
    {
        return Some(parsed.timestamp_millis());
    }

    let local = date.strip_suffix(['Z', 'z']).unwrap_or(date);
    if let Some(naive) = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(local, fmt).ok())
    {
        return Some(naive.and_utc().timestamp_millis());
    }

    NaiveDate::parse_from_str(local, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc().timestamp_millis())
}
