use chrono::{Days, Local, NaiveDate};

use crate::app::{RadarError, Result};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Days covered by a refresh window, today included.
pub const WINDOW_DAYS: u64 = 7;

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a zero-padded `YYYY-MM-DD` calendar date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let date = NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| RadarError::Other(format!("Invalid date {s:?}: {e}")))?;
    if format_date(date) != s {
        return Err(RadarError::Other(format!("Invalid date {s:?}: not YYYY-MM-DD")));
    }
    Ok(date)
}

/// Inclusive `[start, end]` date range, both ends ISO encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshWindow {
    pub start: String,
    pub end: String,
}

impl RefreshWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: format_date(start),
            end: format_date(end),
        }
    }

    /// `[today, today + 6]`
    pub fn week_from(today: NaiveDate) -> Self {
        let end = today
            .checked_add_days(Days::new(WINDOW_DAYS - 1))
            .unwrap_or(NaiveDate::MAX);
        Self::new(today, end)
    }
}
