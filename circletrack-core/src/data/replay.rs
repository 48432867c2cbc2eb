//! In-memory bar source for replays and tests.

use std::collections::HashMap;

use chrono::NaiveDate;

use super::provider::{normalize, select_range, BarSource, DataError, FetchRange};
use crate::domain::{Bar, Timeframe};

/// Serves preloaded series, cut to the requested range and as-of date.
#[derive(Debug, Default, Clone)]
pub struct ReplaySource {
    series: HashMap<(String, Timeframe), Vec<Bar>>,
}

impl ReplaySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        code: impl Into<String>,
        timeframe: Timeframe,
        bars: Vec<Bar>,
    ) -> Result<(), DataError> {
        self.series.insert((code.into(), timeframe), normalize(bars)?);
        Ok(())
    }

    pub fn with(
        mut self,
        code: impl Into<String>,
        timeframe: Timeframe,
        bars: Vec<Bar>,
    ) -> Result<Self, DataError> {
        self.insert(code, timeframe, bars)?;
        Ok(self)
    }

    pub fn bars(&self, code: &str, timeframe: Timeframe) -> Option<&[Bar]> {
        self.series
            .get(&(code.to_string(), timeframe))
            .map(Vec::as_slice)
    }
}

impl BarSource for ReplaySource {
    fn name(&self) -> &str {
        "replay"
    }

    fn fetch(
        &self,
        code: &str,
        timeframe: Timeframe,
        range: FetchRange,
        as_of: NaiveDate,
    ) -> Result<Vec<Bar>, DataError> {
        Ok(self
            .bars(code, timeframe)
            .map(|all| select_range(all, range, as_of))
            .unwrap_or_default())
    }
}
