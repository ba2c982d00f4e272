//! Time labels and operator time input.
//!
//! Times are `f64` seconds since the UNIX epoch throughout the engine; this
//! module converts them to and from wall-clock text in a channel's timezone.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};

use crate::error::NavigationError;

/// Date-time layouts accepted by [`parse_time`], tried in order.
const DATE_TIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y%m%d%H%M%S",
    "%Y%m%d%H%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y%m%d"];

fn to_datetime(t: f64, tz: FixedOffset) -> Option<DateTime<FixedOffset>> {
    if !t.is_finite() {
        return None;
    }
    let secs = t.floor();
    let nanos = (((t - secs) * 1e9).round() as u32).min(999_999_999);
    DateTime::from_timestamp(secs as i64, nanos).map(|dt| dt.with_timezone(&tz))
}

/// `YYYY-MM-DD HH:MM:SS` in `tz`.
pub fn format_time(t: f64, tz: FixedOffset) -> String {
    to_datetime(t, tz)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "--".to_string())
}

/// Status-bar text for the time under the cursor.
pub fn cursor_status(channel: &str, t: f64, tz: FixedOffset) -> String {
    let utc_label = if tz.local_minus_utc() == 0 {
        "UTC".to_string()
    } else {
        tz.to_string()
    };
    format!("{channel}: {} {utc_label}", format_time(t, tz))
}

/// Parse an operator-entered time in `tz`.
pub fn parse_time(input: &str, tz: FixedOffset) -> Result<f64, NavigationError> {
    let text = input.trim();
    let naive = DATE_TIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| NavigationError::InvalidTime(input.to_string()))?;
    tz.from_local_datetime(&naive)
        .single()
        .map(|dt| dt.timestamp() as f64)
        .ok_or_else(|| NavigationError::InvalidTime(input.to_string()))
}

/// Parse a duration such as `90`, `30s`, `15m`, `2h` or `1d` into seconds.
pub fn parse_duration(input: &str) -> Result<f64, NavigationError> {
    let text = input.trim();
    let invalid = || NavigationError::InvalidDuration(input.to_string());
    let (number, scale) = match text.char_indices().last() {
        Some((i, 's')) => (&text[..i], 1.0),
        Some((i, 'm')) => (&text[..i], 60.0),
        Some((i, 'h')) => (&text[..i], 3600.0),
        Some((i, 'd')) => (&text[..i], 86400.0),
        Some(_) => (text, 1.0),
        None => return Err(invalid()),
    };
    let value: f64 = number.trim().parse().map_err(|_| invalid())?;
    if value > 0.0 && value.is_finite() {
        Ok(value * scale)
    } else {
        Err(invalid())
    }
}
