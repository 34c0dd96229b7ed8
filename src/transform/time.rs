//! Calendar breakdown of event timestamps.

use crate::warehouse::models::TimeDim;
use chrono::{DateTime, Datelike, NaiveDateTime, Timelike};

/// Converts epoch milliseconds to a timezone-naive UTC timestamp.
/// Returns `None` when the value is outside chrono's representable range.
pub fn timestamp_from_millis(ms: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
}

/// Derives the time dimension row for `start_time`.
///
/// Weekday numbering is 1 = Sunday through 7 = Saturday; the week is the
/// ISO 8601 week, so the first days of January can belong to week 52 or 53.
pub fn time_row(start_time: NaiveDateTime) -> TimeDim {
    TimeDim {
        start_time,
        hour: start_time.hour() as i32,
        day: start_time.day() as i32,
        week_of_year: start_time.iso_week().week() as i32,
        month: start_time.month() as i32,
        year: start_time.year(),
        weekday: start_time.weekday().number_from_sunday() as i32,
    }
}
