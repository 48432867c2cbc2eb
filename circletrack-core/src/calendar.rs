//! Trading-calendar lookup.
//!
//! `HolidayCalendar` reads a CSV of overrides (`date,open`) on top of a
//! Monday–Friday week: `open=false` closes a weekday, `open=true` opens a
//! weekend make-up session.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Deserialize;
use thiserror::Error;

/// Longest run of closed days searched before giving up.
const MAX_GAP_DAYS: i64 = 366;

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("calendar I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("calendar CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub trait TradingCalendar: Send + Sync {
    fn is_trading_day(&self, date: NaiveDate) -> bool;

    /// The next calendar day has no session.
    fn is_week_end(&self, date: NaiveDate) -> bool {
        !self.is_trading_day(date + Duration::days(1))
    }

    fn previous_trading_day(&self, date: NaiveDate) -> Option<NaiveDate> {
        (1..=MAX_GAP_DAYS)
            .map(|k| date - Duration::days(k))
            .find(|d| self.is_trading_day(*d))
    }

    fn next_trading_day(&self, date: NaiveDate) -> Option<NaiveDate> {
        (1..=MAX_GAP_DAYS)
            .map(|k| date + Duration::days(k))
            .find(|d| self.is_trading_day(*d))
    }

    /// Last session in `date`'s ISO week, if the week has one.
    fn last_trading_day_of_week(&self, date: NaiveDate) -> Option<NaiveDate> {
        let week = date.iso_week();
        let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
        (0..7)
            .rev()
            .map(|k| monday + Duration::days(k))
            .filter(|d| d.iso_week() == week)
            .find(|d| self.is_trading_day(*d))
    }
}

fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Every Monday to Friday is a session.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeekdayCalendar;

impl TradingCalendar for WeekdayCalendar {
    fn is_trading_day(&self, date: NaiveDate) -> bool {
        is_weekday(date)
    }
}

#[derive(Debug, Deserialize)]
struct OverrideRecord {
    date: NaiveDate,
    open: bool,
}

/// Weekday calendar with dated overrides.
#[derive(Debug, Clone, Default)]
pub struct HolidayCalendar {
    overrides: HashMap<NaiveDate, bool>,
}

impl HolidayCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file(path: &Path) -> Result<Self, CalendarError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, CalendarError> {
        let mut csv = csv::Reader::from_reader(reader);
        let mut calendar = Self::new();
        for record in csv.deserialize::<OverrideRecord>() {
            let record = record?;
            calendar.overrides.insert(record.date, record.open);
        }
        Ok(calendar)
    }

    pub fn close(&mut self, date: NaiveDate) {
        self.overrides.insert(date, false);
    }

    pub fn open(&mut self, date: NaiveDate) {
        self.overrides.insert(date, true);
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}

impl TradingCalendar for HolidayCalendar {
    fn is_trading_day(&self, date: NaiveDate) -> bool {
        self.overrides
            .get(&date)
            .copied()
            .unwrap_or_else(|| is_weekday(date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn weekday_calendar_skips_weekends() {
        let cal = WeekdayCalendar;
        // 2019-02-22 is a Friday.
        assert!(cal.is_trading_day(d(2019, 2, 22)));
        assert!(!cal.is_trading_day(d(2019, 2, 23)));
        assert!(cal.is_week_end(d(2019, 2, 22)));
        assert!(!cal.is_week_end(d(2019, 2, 21)));
        assert_eq!(cal.previous_trading_day(d(2019, 2, 25)), Some(d(2019, 2, 22)));
        assert_eq!(cal.next_trading_day(d(2019, 2, 22)), Some(d(2019, 2, 25)));
    }

    #[test]
    fn holiday_file_closes_and_opens_days() {
        let csv = "date,open\n2019-02-28,false\n2019-03-01,false\n2019-02-23,true\n";
        let cal = HolidayCalendar::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(cal.len(), 3);
        assert!(!cal.is_trading_day(d(2019, 2, 28)));
        assert!(cal.is_trading_day(d(2019, 2, 23)));
        // Wednesday before a closed Thursday ends the trading week.
        assert!(cal.is_week_end(d(2019, 2, 27)));
        assert_eq!(cal.last_trading_day_of_week(d(2019, 2, 25)), Some(d(2019, 2, 27)));
    }

    #[test]
    fn make_up_saturday_extends_the_week() {
        let mut cal = HolidayCalendar::new();
        cal.open(d(2019, 2, 23));
        assert!(!cal.is_week_end(d(2019, 2, 22)));
        assert!(cal.is_week_end(d(2019, 2, 23)));
        assert_eq!(cal.last_trading_day_of_week(d(2019, 2, 18)), Some(d(2019, 2, 23)));
    }

    #[test]
    fn fully_closed_week_has_no_last_day() {
        let mut cal = HolidayCalendar::new();
        for day in 4..=8 {
            cal.close(d(2019, 2, day));
        }
        assert_eq!(cal.last_trading_day_of_week(d(2019, 2, 6)), None);
    }

    #[test]
    fn malformed_row_is_an_error() {
        let csv = "date,open\n2019-02-28,maybe\n";
        assert!(HolidayCalendar::from_reader(csv.as_bytes()).is_err());
    }
}
