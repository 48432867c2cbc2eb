//! circletrack runner: tracking passes and batch orchestration.
//!
//! This crate builds on `circletrack-core` to provide:
//! - TOML configuration and the symbol list
//! - Daily, weekly and historical tracking per instrument
//! - Frozen per-date resources for historical replay
//! - Parallel batch dispatch over a fixed worker pool
//! - Ordered, dated result tables and the calendar-driven schedule

pub mod aggregate;
pub mod batch;
pub mod config;
pub mod resources;
pub mod schedule;
pub mod symbols;
pub mod tracker;

use chrono::NaiveDate;

pub use aggregate::{latest_result_before, result_path, tmp_result_path, ResultRow, ResultTable};
pub use batch::{BatchError, BatchRunner, Job};
pub use config::{ConfigError, TrackerConfig};
pub use resources::{ResourceError, ResourceLoader};
pub use schedule::{run_history, stage_resources, DayReport, Schedule};
pub use symbols::{load_symbols, Symbol, SymbolError};
pub use tracker::{camouflage, Tracker};

/// Date stamp used in resource directories and result file names:
/// `2019-3-05` (unpadded month, padded day).
pub fn date_stamp(date: NaiveDate) -> String {
    date.format("%Y-%-m-%d").to_string()
}
