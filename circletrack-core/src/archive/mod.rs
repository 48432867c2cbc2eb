//! Incremental archive contract.
//!
//! An archive is the resolved tail of one instrument's series on one
//! timeframe: every bar from the oldest row the next run still needs through
//! the final bar, with pivot and circle flags already settled, plus one
//! boundary row. The next run fetches bars from the boundary date onward and
//! seeds its first bar with the boundary's annotations.
//!
//! Persisted layout: one table, columns
//! `date,open,high,low,close,volume,turn,rise_circle,drop_circle`. The final
//! row is the boundary.

pub mod csv_store;

pub use csv_store::CsvArchiveStore;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

use crate::domain::{Bar, MarkedBar, Timeframe, Turn};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("corrupt archive: {0}")]
    Corrupt(String),
}

/// Resolved tail of a series plus the carry-in row for the next run.
#[derive(Debug, Clone, PartialEq)]
pub struct Archive {
    pub rows: Vec<MarkedBar>,
    pub boundary: MarkedBar,
}

impl Archive {
    /// First date the next run must fetch.
    pub fn resume_date(&self) -> NaiveDate {
        self.boundary.date()
    }

    /// Date of the newest bar the archive covers.
    pub fn last_date(&self) -> NaiveDate {
        self.rows
            .last()
            .map_or(self.boundary.date(), |m| m.date())
            .max(self.boundary.date())
    }

    /// BLAKE3 digest of the persisted content, used to tell whether a
    /// rewrite changed anything.
    pub fn fingerprint(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        for row in self.rows.iter().chain(std::iter::once(&self.boundary)) {
            let bar = &row.bar;
            hasher.update(bar.date.to_string().as_bytes());
            for price in [bar.open, bar.high, bar.low, bar.close] {
                hasher.update(&price.to_le_bytes());
            }
            hasher.update(&bar.volume.to_le_bytes());
            hasher.update(&[
                i8::from(row.turn) as u8,
                u8::from(row.rise_circle),
                u8::from(row.drop_circle),
            ]);
        }
        hasher.finalize()
    }

    /// Flatten to table rows, boundary last.
    pub fn to_records(&self) -> Vec<ArchiveRecord> {
        self.rows
            .iter()
            .chain(std::iter::once(&self.boundary))
            .map(ArchiveRecord::from)
            .collect()
    }

    /// Rebuild from table rows; the last row is the boundary.
    pub fn from_records(records: Vec<ArchiveRecord>) -> Result<Self, ArchiveError> {
        let mut rows = records
            .into_iter()
            .map(MarkedBar::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let boundary = rows
            .pop()
            .ok_or_else(|| ArchiveError::Corrupt("no boundary row".into()))?;
        if rows.windows(2).any(|w| w[1].date() <= w[0].date()) {
            return Err(ArchiveError::Corrupt("rows are not in date order".into()));
        }
        Ok(Self { rows, boundary })
    }
}

/// One persisted archive row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub turn: i8,
    pub rise_circle: u8,
    pub drop_circle: u8,
}

impl From<&MarkedBar> for ArchiveRecord {
    fn from(m: &MarkedBar) -> Self {
        Self {
            date: m.bar.date,
            open: m.bar.open,
            high: m.bar.high,
            low: m.bar.low,
            close: m.bar.close,
            volume: m.bar.volume,
            turn: i8::from(m.turn),
            rise_circle: u8::from(m.rise_circle),
            drop_circle: u8::from(m.drop_circle),
        }
    }
}

impl TryFrom<ArchiveRecord> for MarkedBar {
    type Error = ArchiveError;

    fn try_from(r: ArchiveRecord) -> Result<Self, Self::Error> {
        let turn = Turn::try_from(r.turn)
            .map_err(|e| ArchiveError::Corrupt(format!("{} on {}", e, r.date)))?;
        Ok(MarkedBar {
            bar: Bar {
                date: r.date,
                open: r.open,
                high: r.high,
                low: r.low,
                close: r.close,
                volume: r.volume,
            },
            turn,
            rise_circle: r.rise_circle != 0,
            drop_circle: r.rise_circle == 0 && r.drop_circle != 0,
        })
    }
}

/// Keyed persistence for archives: one entry per (code, timeframe).
///
/// Implementations must be safe to share across worker threads. Concurrent
/// evaluation of the *same* key is the caller's responsibility to avoid.
pub trait ArchiveStore: Send + Sync {
    fn load(&self, code: &str, timeframe: Timeframe) -> Result<Option<Archive>, ArchiveError>;

    fn save(&self, code: &str, timeframe: Timeframe, archive: &Archive) -> Result<(), ArchiveError>;

    fn remove(&self, code: &str, timeframe: Timeframe) -> Result<(), ArchiveError>;

    fn exists(&self, code: &str, timeframe: Timeframe) -> bool;
}

/// In-process store, for tests and single-run replays.
#[derive(Debug, Default)]
pub struct MemoryArchiveStore {
    entries: Mutex<HashMap<(String, Timeframe), Archive>>,
}

impl MemoryArchiveStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArchiveStore for MemoryArchiveStore {
    fn load(&self, code: &str, timeframe: Timeframe) -> Result<Option<Archive>, ArchiveError> {
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        Ok(entries.get(&(code.to_string(), timeframe)).cloned())
    }

    fn save(&self, code: &str, timeframe: Timeframe, archive: &Archive) -> Result<(), ArchiveError> {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.insert((code.to_string(), timeframe), archive.clone());
        Ok(())
    }

    fn remove(&self, code: &str, timeframe: Timeframe) -> Result<(), ArchiveError> {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.remove(&(code.to_string(), timeframe));
        Ok(())
    }

    fn exists(&self, code: &str, timeframe: Timeframe) -> bool {
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.contains_key(&(code.to_string(), timeframe))
    }
}
