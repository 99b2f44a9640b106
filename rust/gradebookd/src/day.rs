//! Day-granularity timestamps. Attendance dates are epoch millis of local
//! midnight; grade dates are plain wall-clock millis.

use chrono::{DateTime, Local, LocalResult, NaiveDate, TimeZone};

use crate::error::{Error, Result};

pub fn now_millis() -> i64 {
    Local::now().timestamp_millis()
}

pub fn today_millis() -> i64 {
    midnight_millis(Local::now().date_naive())
}

pub fn start_of_day_millis<Tz: TimeZone>(at: &DateTime<Tz>) -> i64 {
    midnight_millis(at.with_timezone(&Local).date_naive())
}

/// Local midnight for `date`. When a DST jump removes midnight, the first
/// instant of that day is used instead.
pub fn midnight_millis(date: NaiveDate) -> i64 {
    let midnight = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    match Local.from_local_datetime(&midnight) {
        LocalResult::Single(t) => t.timestamp_millis(),
        LocalResult::Ambiguous(earliest, _) => earliest.timestamp_millis(),
        LocalResult::None => (0..24 * 60)
            .filter_map(|m| Local.from_local_datetime(&(midnight + chrono::Duration::minutes(m))).earliest())
            .map(|t| t.timestamp_millis())
            .next()
            .unwrap_or_else(|| midnight.and_utc().timestamp_millis()),
    }
}

/// Accepts `YYYY-MM-DD`.
pub fn parse_day(text: &str) -> Result<i64> {
    let date = NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .map_err(|_| Error::InvalidInput(format!("date must be YYYY-MM-DD: {text}")))?;
    Ok(midnight_millis(date))
}
