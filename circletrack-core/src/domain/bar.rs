//! Bar: the fundamental market data unit, and its annotated form.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::marks::Turn;

/// OHLCV bar for one instrument over one period (a day or a week).
///
/// Dates are unique and strictly increasing within a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    /// Returns true if any price field is NaN or infinite.
    pub fn is_void(&self) -> bool {
        !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite())
    }

    /// Basic sanity check: finite prices and `high >= low`.
    ///
    /// Open/close outside the range are tolerated; some feeds report an
    /// auction print outside the continuous-session range.
    pub fn is_sane(&self) -> bool {
        !self.is_void() && self.high >= self.low
    }

    /// True when this bar's range lies inside `other`'s range (inclusive).
    pub fn is_inside(&self, other: &Bar) -> bool {
        self.high <= other.high && self.low >= other.low
    }
}

/// A bar plus the annotations the pipeline derives for it.
///
/// At most one of `rise_circle` / `drop_circle` is set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkedBar {
    pub bar: Bar,
    pub turn: Turn,
    pub rise_circle: bool,
    pub drop_circle: bool,
}

impl MarkedBar {
    pub fn new(bar: Bar) -> Self {
        Self {
            bar,
            turn: Turn::None,
            rise_circle: false,
            drop_circle: false,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.bar.date
    }

    pub fn is_circle(&self) -> bool {
        self.rise_circle || self.drop_circle
    }

    /// Copy the carry-in annotations of an archived bar onto this one.
    pub fn carry_from(&mut self, archived: &MarkedBar) {
        self.turn = archived.turn;
        self.rise_circle = archived.rise_circle;
        self.drop_circle = !archived.rise_circle && archived.drop_circle;
    }
}

impl From<Bar> for MarkedBar {
    fn from(bar: Bar) -> Self {
        Self::new(bar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar() -> Bar {
        Bar {
            date: NaiveDate::from_ymd_opt(2019, 3, 15).unwrap(),
            open: 100.0,
            high: 105.0,
            low: 98.0,
            close: 103.0,
            volume: 50_000,
        }
    }

    #[test]
    fn bar_is_sane() {
        assert!(sample_bar().is_sane());
    }

    #[test]
    fn bar_detects_void() {
        let mut bar = sample_bar();
        bar.close = f64::NAN;
        assert!(bar.is_void());
        assert!(!bar.is_sane());
    }

    #[test]
    fn bar_detects_inverted_range() {
        let mut bar = sample_bar();
        bar.high = 97.0;
        assert!(!bar.is_sane());
    }

    #[test]
    fn inside_is_inclusive() {
        let outer = sample_bar();
        let mut inner = outer;
        assert!(inner.is_inside(&outer));
        inner.high = 106.0;
        assert!(!inner.is_inside(&outer));
    }

    #[test]
    fn carry_keeps_single_circle() {
        let mut archived = MarkedBar::new(sample_bar());
        archived.turn = Turn::Peak;
        archived.rise_circle = true;
        archived.drop_circle = true;

        let mut fresh = MarkedBar::new(sample_bar());
        fresh.carry_from(&archived);
        assert_eq!(fresh.turn, Turn::Peak);
        assert!(fresh.rise_circle);
        assert!(!fresh.drop_circle);
    }
}
