//! CSV resource directory as a bar source.
//!
//! Layout: `{dir}/{code}_{d|w}.csv` with header
//! `date,open,high,low,close,volume`.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::debug;

use super::provider::{normalize, select_range, BarSource, DataError, FetchRange};
use crate::domain::{Bar, Timeframe};

pub struct CsvBarSource {
    dir: PathBuf,
}

impl CsvBarSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, code: &str, timeframe: Timeframe) -> PathBuf {
        self.dir.join(format!("{code}_{}.csv", timeframe.code()))
    }

    /// Every bar in the file, sorted and de-duplicated.
    pub fn read_all(&self, code: &str, timeframe: Timeframe) -> Result<Vec<Bar>, DataError> {
        let path = self.path_for(code, timeframe);
        if !path.exists() {
            return Err(DataError::NotFound {
                code: code.to_string(),
                timeframe,
            });
        }
        read_bars(&path)
    }
}

/// Parse one bar file.
pub fn read_bars(path: &Path) -> Result<Vec<Bar>, DataError> {
    let mut reader = csv::Reader::from_path(path)?;
    let bars = reader
        .deserialize::<Bar>()
        .collect::<Result<Vec<_>, _>>()?;
    normalize(bars)
}

/// Write one bar file in the layout [`read_bars`] expects.
pub fn write_bars(path: &Path, bars: &[Bar]) -> Result<(), DataError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for bar in bars {
        writer.serialize(bar)?;
    }
    writer.flush()?;
    Ok(())
}

impl BarSource for CsvBarSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(
        &self,
        code: &str,
        timeframe: Timeframe,
        range: FetchRange,
        as_of: NaiveDate,
    ) -> Result<Vec<Bar>, DataError> {
        let all = self.read_all(code, timeframe)?;
        let bars = select_range(&all, range, as_of);
        debug!(code, timeframe = %timeframe, ?range, count = bars.len(), "read bars");
        Ok(bars)
    }
}
