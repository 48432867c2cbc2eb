//! Calendar-driven driver for the daily/weekly passes and historical batches.
//!
//! For every trading day:
//! 1. **Daily pass**: yesterday's `Rise`/`Drop` rows are re-tracked with
//!    their state as the pre-state. When the day closes a trading week the
//!    table goes to `result_tmp_{date}.csv`, otherwise to `result_{date}.csv`.
//! 2. **Weekly pass** (week-closing days only): every symbol is evaluated
//!    weekly; rows that are neither `Unfit` nor `fail` are laid over the
//!    temporary daily table into the final `result_{date}.csv`.
//!
//! A failing pass is logged and recorded on the day's report; later passes
//! and later days still run.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use circletrack_core::calendar::TradingCalendar;
use circletrack_core::data::BarSource;
use circletrack_core::domain::State;
use tracing::{info, warn};

use crate::aggregate::{
    latest_result_before, result_path, tmp_result_path, ResultRow, ResultTable,
};
use crate::batch::{BatchRunner, Job};
use crate::resources::ResourceLoader;
use crate::tracker::Tracker;

/// Files written for one scheduled day, and the passes that failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayReport {
    pub date: Option<NaiveDate>,
    pub daily: Option<PathBuf>,
    pub weekly: Option<PathBuf>,
    pub failures: Vec<String>,
}

impl DayReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    fn record<T>(&mut self, pass: &str, outcome: Result<Option<T>>) -> Option<T> {
        match outcome {
            Ok(written) => written,
            Err(e) => {
                warn!(date = ?self.date, pass, "pass failed: {e:#}");
                self.failures.push(format!("{pass}: {e:#}"));
                None
            }
        }
    }
}

pub struct Schedule<'a> {
    tracker: &'a Tracker<'a>,
    batch: &'a BatchRunner,
    calendar: &'a dyn TradingCalendar,
    result_dir: PathBuf,
    codes: Vec<String>,
}

impl<'a> Schedule<'a> {
    pub fn new(
        tracker: &'a Tracker<'a>,
        batch: &'a BatchRunner,
        calendar: &'a dyn TradingCalendar,
        result_dir: impl Into<PathBuf>,
        codes: Vec<String>,
    ) -> Self {
        Self {
            tracker,
            batch,
            calendar,
            result_dir: result_dir.into(),
            codes,
        }
    }

    /// Run every trading day from `start` through `end`, oldest first.
    pub fn run_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<DayReport> {
        start
            .iter_days()
            .take_while(|d| *d <= end)
            .map(|d| self.run_day(d))
            .collect()
    }

    pub fn run_day(&self, date: NaiveDate) -> DayReport {
        if !self.calendar.is_trading_day(date) {
            warn!(%date, "market closed, nothing to schedule");
            return DayReport::default();
        }

        let mut report = DayReport {
            date: Some(date),
            ..DayReport::default()
        };
        if !tmp_result_path(&self.result_dir, date).exists() {
            let daily = has_results(&self.result_dir).and_then(|found| {
                if found {
                    self.daily_pass(date)
                } else {
                    Ok(None)
                }
            });
            report.daily = report.record("daily", daily);
        }
        if self.calendar.is_week_end(date) {
            report.weekly = report.record("weekly", self.weekly_pass(date));
        }
        report
    }

    fn daily_pass(&self, date: NaiveDate) -> Result<Option<PathBuf>> {
        let Some(previous) = self.calendar.previous_trading_day(date) else {
            warn!(%date, "no previous trading day");
            return Ok(None);
        };

        let final_path = result_path(&self.result_dir, date);
        if final_path.exists() {
            warn!(path = %final_path.display(), "removing overlapping result file");
            fs::remove_file(&final_path)
                .with_context(|| format!("remove {}", final_path.display()))?;
        }

        let previous_table = self.previous_table(date, previous)?;
        let jobs: Vec<Job> = previous_table
            .continuations()
            .map(|row| Job::Daily {
                code: row.code.clone(),
                pre_state: row.state,
            })
            .collect();

        let table = ResultTable::from_results(self.batch.run(self.tracker, &jobs, date));
        if table.is_empty() {
            warn!(%date, "daily pass produced no reportable rows");
            return Ok(None);
        }

        let path = if self.calendar.is_week_end(date) {
            tmp_result_path(&self.result_dir, date)
        } else {
            final_path
        };
        table.write(&path)?;
        info!(%date, rows = table.len(), path = %path.display(), "daily pass written");
        Ok(Some(path))
    }

    /// The table the daily pass continues from: the previous trading day's,
    /// else the newest final table before `date`, else an empty one.
    fn previous_table(&self, date: NaiveDate, previous: NaiveDate) -> Result<ResultTable> {
        let previous_path = result_path(&self.result_dir, previous);
        if previous_path.exists() {
            info!(%date, from = %previous_path.display(), "starting daily pass");
            return ResultTable::read(&previous_path);
        }
        match latest_result_before(&self.result_dir, date)? {
            Some(path) => {
                warn!(
                    %date,
                    missing = %previous_path.display(),
                    from = %path.display(),
                    "previous result table missing, continuing from the latest one"
                );
                ResultTable::read(&path)
            }
            None => {
                warn!(%date, missing = %previous_path.display(), "no earlier result table to continue");
                Ok(ResultTable::default())
            }
        }
    }

    fn weekly_pass(&self, date: NaiveDate) -> Result<Option<PathBuf>> {
        info!(%date, symbols = self.codes.len(), "starting weekly pass");
        let jobs: Vec<Job> = self
            .codes
            .iter()
            .map(|code| Job::Weekly { code: code.clone() })
            .collect();

        let newer: Vec<ResultRow> = self
            .batch
            .run(self.tracker, &jobs, date)
            .into_iter()
            .filter(|r| !matches!(r.state, State::Unfit | State::Fail))
            .map(ResultRow::from)
            .collect();
        if newer.is_empty() {
            warn!(%date, "weekly pass produced no rows");
            return Ok(None);
        }

        let tmp_path = tmp_result_path(&self.result_dir, date);
        let base = if tmp_path.exists() {
            ResultTable::read(&tmp_path)?
        } else {
            ResultTable::default()
        };
        let table = base.merged_with(newer);

        let path = result_path(&self.result_dir, date);
        table.write(&path)?;
        if tmp_path.exists() {
            fs::remove_file(&tmp_path).with_context(|| format!("remove {}", tmp_path.display()))?;
        }
        info!(%date, rows = table.len(), path = %path.display(), "weekly pass written");
        Ok(Some(path))
    }
}

/// Freeze every code's history as of `date`; returns how many were staged.
pub fn stage_resources(
    loader: &ResourceLoader,
    source: &dyn BarSource,
    codes: &[String],
    date: NaiveDate,
) -> usize {
    let mut staged = 0;
    for code in codes {
        match loader.stage(source, code, date) {
            Ok(()) => staged += 1,
            Err(e) => warn!(code = code.as_str(), %date, "failed to stage resources: {e}"),
        }
    }
    info!(%date, staged, total = codes.len(), dir = %loader.dir_for(date).display(), "resources staged");
    staged
}

/// Historical batch: replay every code as of `date` and write the ordered
/// table.
pub fn run_history(
    tracker: &Tracker<'_>,
    batch: &BatchRunner,
    calendar: &dyn TradingCalendar,
    codes: &[String],
    date: NaiveDate,
    result_dir: &Path,
) -> Result<Option<PathBuf>> {
    if !calendar.is_trading_day(date) {
        warn!(%date, "market closed, nothing to replay");
        return Ok(None);
    }

    let jobs: Vec<Job> = codes
        .iter()
        .map(|code| Job::Historical { code: code.clone() })
        .collect();
    let table = ResultTable::from_results(batch.run(tracker, &jobs, date));
    if table.is_empty() {
        warn!(%date, "historical batch produced no reportable rows");
        return Ok(None);
    }

    let path = result_path(result_dir, date);
    table.write(&path)?;
    info!(%date, rows = table.len(), path = %path.display(), "historical batch written");
    Ok(Some(path))
}

fn has_results(dir: &Path) -> Result<bool> {
    if !dir.exists() {
        return Ok(false);
    }
    for entry in fs::read_dir(dir).with_context(|| format!("list {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "csv") {
            return Ok(true);
        }
    }
    Ok(false)
}
