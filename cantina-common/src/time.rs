//! Calendar utilities

use chrono::{Datelike, Local, NaiveDate};

/// Current local calendar date
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// ISO week of `date` as `(iso_year, week)`
pub fn iso_week(date: NaiveDate) -> (i32, u32) {
    let week = date.iso_week();
    (week.year(), week.week())
}

/// Parse the calendar date at the start of `raw`.
///
/// Accepts `2024-04-15` as well as timestamps such as `2024-04-15T00:00:00`.
pub fn parse_date_prefix(raw: &str) -> Option<NaiveDate> {
    let prefix = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}
