//! Result aggregation and the dated result table.
//!
//! Only bucketed states are reported. Rows are ordered by bucket
//! (`SynBT, SynFT, RiseBT, DropFT`, then `Rise`/`Drop` together); breakout
//! buckets sort by gain rate descending, the continuation bucket by code.
//!
//! File layout: `{dir}/result_{Y-M-D}.csv`, or `result_tmp_{Y-M-D}.csv` for
//! a daily pass whose week is not finished yet. Columns `code,state,gain_rate`.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use circletrack_core::domain::{round3, EvaluationResult, State};
use serde::{Deserialize, Serialize};

use crate::date_stamp;

/// Continuation bucket; sorted by code instead of gain.
const CONTINUATION_BUCKET: u8 = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub code: String,
    pub state: State,
    pub gain_rate: f64,
}

impl From<EvaluationResult> for ResultRow {
    fn from(result: EvaluationResult) -> Self {
        Self {
            code: result.code,
            state: result.state,
            gain_rate: round3(result.gain_rate),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    rows: Vec<ResultRow>,
}

impl ResultTable {
    pub fn from_results(results: impl IntoIterator<Item = EvaluationResult>) -> Self {
        Self::from_rows(results.into_iter().map(ResultRow::from))
    }

    /// Keep reportable rows and put them in table order.
    pub fn from_rows(rows: impl IntoIterator<Item = ResultRow>) -> Self {
        let mut rows: Vec<ResultRow> = rows
            .into_iter()
            .filter(|r| r.state.bucket().is_some())
            .collect();
        rows.sort_by(compare_rows);
        Self { rows }
    }

    /// Lay `newer` over this table: a code present in both keeps the newer
    /// row.
    pub fn merged_with(&self, newer: impl IntoIterator<Item = ResultRow>) -> Self {
        let mut by_code: HashMap<String, ResultRow> = self
            .rows
            .iter()
            .map(|r| (r.code.clone(), r.clone()))
            .collect();
        for row in newer {
            by_code.insert(row.code.clone(), row);
        }
        Self::from_rows(by_code.into_values())
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows still waiting on a breakout; tomorrow's daily pass tracks these.
    pub fn continuations(&self) -> impl Iterator<Item = &ResultRow> {
        self.rows.iter().filter(|r| r.state.is_continuation())
    }

    /// Write the table atomically (tmp file, then rename).
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create result dir {}", parent.display()))?;
        }
        let tmp_path = path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp_path)
                .with_context(|| format!("open {}", tmp_path.display()))?;
            for row in &self.rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp_path, path)
            .with_context(|| format!("rename {} to {}", tmp_path.display(), path.display()))?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("open result table {}", path.display()))?;
        let rows = reader
            .deserialize::<ResultRow>()
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("parse result table {}", path.display()))?;
        Ok(Self::from_rows(rows))
    }
}

fn compare_rows(a: &ResultRow, b: &ResultRow) -> Ordering {
    let (bucket_a, bucket_b) = (a.state.bucket(), b.state.bucket());
    bucket_a.cmp(&bucket_b).then_with(|| {
        if bucket_a == Some(CONTINUATION_BUCKET) {
            a.code.cmp(&b.code)
        } else {
            b.gain_rate
                .total_cmp(&a.gain_rate)
                .then_with(|| a.code.cmp(&b.code))
        }
    })
}

/// `{dir}/result_{Y-M-D}.csv`
pub fn result_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("result_{}.csv", date_stamp(date)))
}

/// `{dir}/result_tmp_{Y-M-D}.csv`
pub fn tmp_result_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("result_tmp_{}.csv", date_stamp(date)))
}

/// Newest final table in `dir` dated strictly before `date`.
pub fn latest_result_before(dir: &Path, date: NaiveDate) -> Result<Option<PathBuf>> {
    if !dir.exists() {
        return Ok(None);
    }
    let mut latest: Option<(NaiveDate, PathBuf)> = None;
    for entry in fs::read_dir(dir).with_context(|| format!("list {}", dir.display()))? {
        let path = entry?.path();
        let Some(stamp) = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_prefix("result_"))
            .and_then(|name| name.strip_suffix(".csv"))
        else {
            continue;
        };
        // Temporary tables fail to parse here and are skipped.
        let Ok(day) = NaiveDate::parse_from_str(stamp, "%Y-%m-%d") else {
            continue;
        };
        if day < date && latest.as_ref().map_or(true, |(newest, _)| day > *newest) {
            latest = Some((day, path));
        }
    }
    Ok(latest.map(|(_, path)| path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(code: &str, state: State, gain_rate: f64) -> ResultRow {
        ResultRow {
            code: code.into(),
            state,
            gain_rate,
        }
    }

    #[test]
    fn buckets_then_gain_then_code() {
        let table = ResultTable::from_rows([
            row("3", State::Rise, 0.5),
            row("9", State::RiseBT, 0.01),
            row("1", State::Drop, 0.2),
            row("7", State::SynBT, 0.02),
            row("8", State::RiseBT, 0.03),
            row("5", State::DropFT, 0.1),
            row("4", State::SynFT, -0.01),
        ]);
        let order: Vec<&str> = table.rows().iter().map(|r| r.code.as_str()).collect();
        assert_eq!(order, vec!["7", "4", "8", "9", "5", "1", "3"]);
    }

    #[test]
    fn unreported_states_are_dropped() {
        let table = ResultTable::from_rows([
            row("1", State::Unfit, 0.0),
            row("2", State::Fail, 0.0),
            row("3", State::Cancel, 0.0),
            row("4", State::WeeklyFailed, 0.0),
            row("5", State::Toss, 0.0),
            row("6", State::Rise, 0.0),
        ]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn newer_rows_replace_by_code() {
        let base = ResultTable::from_rows([row("1", State::Rise, 0.1), row("2", State::Drop, 0.0)]);
        let merged = base.merged_with([row("1", State::SynBT, 0.05)]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.rows()[0], row("1", State::SynBT, 0.05));
    }

    #[test]
    fn gain_rate_is_rounded_from_results() {
        let mut result = EvaluationResult::labelled("2330", State::RiseBT);
        result.gain_rate = 0.123_456;
        let table = ResultTable::from_results([result]);
        assert_eq!(table.rows()[0].gain_rate, 0.123);
    }

    #[test]
    fn file_names_follow_the_date() {
        let date = NaiveDate::from_ymd_opt(2019, 3, 5).unwrap();
        let dir = Path::new("results");
        assert_eq!(result_path(dir, date), PathBuf::from("results/result_2019-3-05.csv"));
        assert_eq!(tmp_result_path(dir, date), PathBuf::from("results/result_tmp_2019-3-05.csv"));
    }

    #[test]
    fn latest_result_skips_tmp_and_later_tables() {
        let dir = tempfile::tempdir().unwrap();
        let ymd = |d: u32| NaiveDate::from_ymd_opt(2019, 3, d).unwrap();
        let table = ResultTable::from_rows([row("1", State::Rise, 0.0)]);
        for path in [
            result_path(dir.path(), ymd(5)),
            result_path(dir.path(), ymd(20)),
            tmp_result_path(dir.path(), ymd(22)),
            result_path(dir.path(), ymd(26)),
        ] {
            table.write(&path).unwrap();
        }

        let latest = latest_result_before(dir.path(), ymd(26)).unwrap();
        assert_eq!(latest, Some(result_path(dir.path(), ymd(20))));
        assert_eq!(latest_result_before(dir.path(), ymd(5)).unwrap(), None);
        assert_eq!(
            latest_result_before(&dir.path().join("absent"), ymd(26)).unwrap(),
            None
        );
    }
}
