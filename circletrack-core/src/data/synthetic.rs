//! Deterministic synthetic random walk.
//!
//! Each code gets its own seed derived from the master seed and the code via
//! BLAKE3, so a series never depends on which other codes were generated.
//! Daily bars fall on weekdays; weekly bars are aggregated Monday–Friday and
//! dated on the week's last generated day.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::provider::{select_range, BarSource, DataError, FetchRange};
use crate::domain::{Bar, Timeframe};

#[derive(Debug, Clone)]
pub struct SyntheticSource {
    seed: u64,
    start: NaiveDate,
    start_price: f64,
}

impl SyntheticSource {
    pub fn new(seed: u64, start: NaiveDate) -> Self {
        Self {
            seed,
            start,
            start_price: 100.0,
        }
    }

    fn rng_for(&self, code: &str) -> StdRng {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(code.as_bytes());
        StdRng::from_seed(*hasher.finalize().as_bytes())
    }

    /// Weekday bars from the start date through `end`.
    pub fn daily(&self, code: &str, end: NaiveDate) -> Vec<Bar> {
        random_walk(&mut self.rng_for(code), self.start, end, self.start_price)
    }

    /// Daily bars folded into calendar weeks.
    pub fn weekly(&self, code: &str, end: NaiveDate) -> Vec<Bar> {
        fold_weeks(&self.daily(code, end))
    }
}

/// Random walk of weekday bars between `start` and `end` inclusive.
pub fn random_walk(rng: &mut StdRng, start: NaiveDate, end: NaiveDate, start_price: f64) -> Vec<Bar> {
    let mut bars = Vec::new();
    let mut price = start_price;
    let mut current = start;

    while current <= end {
        if matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            current += Duration::days(1);
            continue;
        }

        let daily_return: f64 = rng.gen_range(-0.03..0.03);
        let open = price;
        let close = price * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(500_000..5_000_000u64);

        bars.push(Bar {
            date: current,
            open,
            high,
            low,
            close,
            volume,
        });

        price = close;
        current += Duration::days(1);
    }

    bars
}

/// Aggregate daily bars into ISO weeks.
pub fn fold_weeks(daily: &[Bar]) -> Vec<Bar> {
    let mut weeks: Vec<Bar> = Vec::new();
    for bar in daily {
        match weeks.last_mut() {
            Some(week) if week.date.iso_week() == bar.date.iso_week() => {
                week.date = bar.date;
                week.high = week.high.max(bar.high);
                week.low = week.low.min(bar.low);
                week.close = bar.close;
                week.volume += bar.volume;
            }
            _ => weeks.push(*bar),
        }
    }
    weeks
}

impl BarSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(
        &self,
        code: &str,
        timeframe: Timeframe,
        range: FetchRange,
        as_of: NaiveDate,
    ) -> Result<Vec<Bar>, DataError> {
        let all = match timeframe {
            Timeframe::Daily => self.daily(code, as_of),
            Timeframe::Weekly => self.weekly(code, as_of),
        };
        Ok(select_range(&all, range, as_of))
    }
}
