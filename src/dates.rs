use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{FreshtimeError, Result};

pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| FreshtimeError::validation(format!("Invalid date {value:?}. Use YYYY-MM-DD.")))
}

/// Parses `2h`, `30m` or `1h30m` into seconds.
pub fn parse_duration(value: &str) -> Result<i64> {
    let invalid =
        || FreshtimeError::validation(format!("Invalid duration {value:?} (expected format: 2h, 30m, 1h30m)"));

    let (hours, rest) = match value.split_once('h') {
        Some((hours, rest)) => (Some(hours), rest),
        None => (None, value),
    };
    let minutes = match rest {
        "" => None,
        rest => Some(rest.strip_suffix('m').ok_or_else(invalid)?),
    };
    if hours.is_none() && minutes.is_none() {
        return Err(invalid());
    }

    let number = |digits: &str| -> Result<i64> {
        if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(invalid());
        }
        digits.parse::<i64>().map_err(|_| invalid())
    };

    let mut seconds = 0;
    if let Some(hours) = hours {
        seconds += number(hours)? * 3600;
    }
    if let Some(minutes) = minutes {
        seconds += number(minutes)? * 60;
    }
    Ok(seconds)
}

/// `1h5m` above an hour, `5m` below.
pub fn format_elapsed(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds / 60) % 60;
    if hours > 0 {
        format!("{hours}h{minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Timestamp layout the timetracking API expects for `started_at`.
pub fn api_timestamp(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// `Feb 9 – Feb 13, 2026`
pub fn format_week_label(start: NaiveDate, end: NaiveDate) -> String {
    format!("{} – {}", start.format("%b %-d"), end.format("%b %-d, %Y"))
}
