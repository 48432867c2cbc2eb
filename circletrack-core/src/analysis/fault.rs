//! Per-phase fault reporting.
//!
//! Each phase of the pipeline returns `Result<_, PhaseFault>`. A fault never
//! escapes a single instrument's evaluation: the evaluator turns it into a
//! `fail` result that still carries the diagnostic.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::domain::MarkedBar;

/// The pipeline stage that produced a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Pivot,
    Circle,
    Validate,
    Estimate,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Pivot => "pivot",
            Phase::Circle => "circle",
            Phase::Validate => "validate",
            Phase::Estimate => "estimate",
        };
        f.write_str(name)
    }
}

/// Unexpected numeric or ordering failure inside one phase.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{phase} phase fault{}: {reason}", .date.map(|d| format!(" at {d}")).unwrap_or_default())]
pub struct PhaseFault {
    pub phase: Phase,
    pub date: Option<NaiveDate>,
    pub reason: String,
}

impl PhaseFault {
    pub fn new(phase: Phase, date: Option<NaiveDate>, reason: impl Into<String>) -> Self {
        Self {
            phase,
            date,
            reason: reason.into(),
        }
    }
}

/// Reject series the phases cannot reason about: non-finite prices,
/// inverted ranges, and dates that do not strictly increase.
pub fn check_series(series: &[MarkedBar], phase: Phase) -> Result<(), PhaseFault> {
    let mut previous: Option<NaiveDate> = None;
    for marked in series {
        let bar = &marked.bar;
        if bar.is_void() {
            return Err(PhaseFault::new(phase, Some(bar.date), "non-finite price"));
        }
        if bar.high < bar.low {
            return Err(PhaseFault::new(
                phase,
                Some(bar.date),
                format!("high {} below low {}", bar.high, bar.low),
            ));
        }
        if let Some(prev) = previous {
            if bar.date <= prev {
                return Err(PhaseFault::new(
                    phase,
                    Some(bar.date),
                    format!("date does not advance past {prev}"),
                ));
            }
        }
        previous = Some(bar.date);
    }
    Ok(())
}
