//! Per-date local resources for historical replay.
//!
//! Layout: `{dir}/{Y-M-D}/{code}_{d|w}.csv`, the same bar-file format the
//! CSV bar source reads. A replay prefers these frozen files and falls back
//! to the live source's full history when they are missing.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use circletrack_core::data::csv_source::{read_bars, write_bars};
use circletrack_core::data::{BarSource, DataError, FetchRange, ReplaySource};
use circletrack_core::domain::{Bar, Timeframe};
use thiserror::Error;
use tracing::debug;

use crate::date_stamp;

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("resource data error: {0}")]
    Data(#[from] DataError),

    #[error("resources for '{code}' are incomplete")]
    Incomplete { code: String },
}

#[derive(Debug, Clone)]
pub struct ResourceLoader {
    dir: PathBuf,
}

impl ResourceLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `{dir}/{Y-M-D}`
    pub fn dir_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(date_stamp(date))
    }

    pub fn path_for(&self, code: &str, timeframe: Timeframe, date: NaiveDate) -> PathBuf {
        self.dir_for(date)
            .join(format!("{code}_{}.csv", timeframe.code()))
    }

    pub fn load(&self, code: &str, timeframe: Timeframe, date: NaiveDate) -> Result<Vec<Bar>, ResourceError> {
        let path = self.path_for(code, timeframe, date);
        if !path.exists() {
            return Err(DataError::NotFound {
                code: code.to_string(),
                timeframe,
            }
            .into());
        }
        Ok(read_bars(&path)?)
    }

    /// Freeze `source`'s full weekly and daily history for `code` as of
    /// `date` into the resource directory.
    pub fn stage(&self, source: &dyn BarSource, code: &str, date: NaiveDate) -> Result<(), ResourceError> {
        let weekly = source.fetch(code, Timeframe::Weekly, FetchRange::FullHistory, date)?;
        let daily = source.fetch(code, Timeframe::Daily, FetchRange::FullHistory, date)?;
        if weekly.is_empty() || daily.is_empty() {
            return Err(ResourceError::Incomplete {
                code: code.to_string(),
            });
        }
        write_bars(&self.path_for(code, Timeframe::Weekly, date), &weekly)?;
        write_bars(&self.path_for(code, Timeframe::Daily, date), &daily)?;
        Ok(())
    }

    /// Weekly and daily bars for a replay of `code` as of `date`, local
    /// files first, then `fallback`.
    pub fn replay_for(
        &self,
        fallback: &dyn BarSource,
        code: &str,
        date: NaiveDate,
    ) -> Result<ReplaySource, ResourceError> {
        let local = self
            .load(code, Timeframe::Weekly, date)
            .and_then(|weekly| Ok((weekly, self.load(code, Timeframe::Daily, date)?)));

        match local {
            Ok((weekly, daily)) => replay_of(code, weekly, daily),
            Err(e) => {
                debug!(code, %date, "no local resources, using {}: {e}", fallback.name());
                replay_from_source(fallback, code, date)
            }
        }
    }
}

/// Full weekly and daily history of `code` from `source`, as of `date`.
pub fn replay_from_source(
    source: &dyn BarSource,
    code: &str,
    date: NaiveDate,
) -> Result<ReplaySource, ResourceError> {
    let weekly = source.fetch(code, Timeframe::Weekly, FetchRange::FullHistory, date)?;
    let daily = source.fetch(code, Timeframe::Daily, FetchRange::FullHistory, date)?;
    replay_of(code, weekly, daily)
}

fn replay_of(code: &str, weekly: Vec<Bar>, daily: Vec<Bar>) -> Result<ReplaySource, ResourceError> {
    if weekly.is_empty() || daily.is_empty() {
        return Err(ResourceError::Incomplete {
            code: code.to_string(),
        });
    }
    let mut replay = ReplaySource::new();
    replay.insert(code, Timeframe::Weekly, weekly)?;
    replay.insert(code, Timeframe::Daily, daily)?;
    Ok(replay)
}
