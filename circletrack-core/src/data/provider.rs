//! Bar source trait and structured error types.
//!
//! The `BarSource` trait abstracts over where bars come from (a directory of
//! CSV resources, an in-memory replay, a synthetic random walk) so the
//! evaluator never depends on retrieval mechanics.

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{Bar, Timeframe};

#[derive(Debug, Error)]
pub enum DataError {
    #[error("no {timeframe} bars for '{code}'")]
    NotFound { code: String, timeframe: Timeframe },

    #[error("I/O error reading bars: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error reading bars: {0}")]
    Csv(#[from] csv::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// How much history a fetch should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchRange {
    /// From this date (inclusive) onward. A date with no bar walks back to
    /// the previous available bar.
    Since(NaiveDate),
    FullHistory,
}

/// Supplier of ordered bars for one instrument and timeframe.
///
/// Every fetch is bounded above by `as_of` (inclusive). An empty vector is a
/// valid answer and means "nothing available".
pub trait BarSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    fn fetch(
        &self,
        code: &str,
        timeframe: Timeframe,
        range: FetchRange,
        as_of: NaiveDate,
    ) -> Result<Vec<Bar>, DataError>;
}

/// Cut a full, date-ordered series down to `range` as of `as_of`.
pub fn select_range(bars: &[Bar], range: FetchRange, as_of: NaiveDate) -> Vec<Bar> {
    let end = bars.partition_point(|b| b.date <= as_of);
    let start = match range {
        FetchRange::FullHistory => 0,
        FetchRange::Since(since) => bars[..end]
            .partition_point(|b| b.date <= since)
            .saturating_sub(1),
    };
    bars[start..end].to_vec()
}

/// Sort by date and drop repeated dates (last copy wins), rejecting
/// malformed bars.
pub fn normalize(mut bars: Vec<Bar>) -> Result<Vec<Bar>, DataError> {
    if let Some(bad) = bars.iter().find(|b| !b.is_sane()) {
        return Err(DataError::Validation(format!(
            "malformed bar on {}",
            bad.date
        )));
    }
    bars.reverse();
    bars.sort_by_key(|b| b.date);
    bars.dedup_by_key(|b| b.date);
    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bars(days: &[u32]) -> Vec<Bar> {
        days.iter()
            .map(|&d| Bar {
                date: NaiveDate::from_ymd_opt(2019, 4, d).unwrap(),
                open: 10.0,
                high: 11.0,
                low: 9.0,
                close: 10.5,
                volume: 1,
            })
            .collect()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 4, d).unwrap()
    }

    #[test]
    fn full_history_is_bounded_by_as_of() {
        let all = bars(&[1, 2, 3, 8, 9]);
        let out = select_range(&all, FetchRange::FullHistory, day(8));
        assert_eq!(out.len(), 4);
        assert_eq!(out.last().unwrap().date, day(8));
    }

    #[test]
    fn since_includes_the_start_date() {
        let all = bars(&[1, 2, 3, 8, 9]);
        let out = select_range(&all, FetchRange::Since(day(3)), day(9));
        assert_eq!(out.iter().map(|b| b.date).collect::<Vec<_>>(), vec![day(3), day(8), day(9)]);
    }

    #[test]
    fn since_missing_date_walks_back() {
        let all = bars(&[1, 2, 3, 8, 9]);
        let out = select_range(&all, FetchRange::Since(day(6)), day(9));
        assert_eq!(out.first().unwrap().date, day(3));
    }

    #[test]
    fn since_before_history_starts_at_first_bar() {
        let all = bars(&[5, 6]);
        let out = select_range(&all, FetchRange::Since(day(1)), day(9));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn as_of_before_history_is_empty() {
        let all = bars(&[5, 6]);
        assert!(select_range(&all, FetchRange::FullHistory, day(1)).is_empty());
    }

    #[test]
    fn normalize_sorts_and_keeps_last_duplicate() {
        let mut input = bars(&[3, 1, 3]);
        input[2].close = 10.9;
        let out = normalize(input).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].close, 10.9);
    }
}
