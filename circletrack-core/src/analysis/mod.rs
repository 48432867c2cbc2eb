//! The four-phase analysis pipeline: pivot → circle → validate → estimate.
//!
//! Phases run strictly in sequence over one instrument's bars. Each returns
//! `Result<_, PhaseFault>`; [`analyze`] composes them and stops at the first
//! fault.

pub mod circle;
pub mod estimate;
pub mod fault;
pub mod pivot;
pub mod validate;

pub use estimate::{gain_rate, volume_rate, Outcome, Verdict};
pub use fault::{Phase, PhaseFault};

use crate::archive::Archive;
use crate::domain::{Bar, MarkedBar};

/// Annotated series and its classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub series: Vec<MarkedBar>,
    pub outcome: Outcome,
}

/// Run every phase over `bars`, resuming from `archive` when given.
///
/// The first fresh bar inherits the boundary row's annotations when their
/// dates agree.
pub fn analyze(bars: &[Bar], archive: Option<&Archive>) -> Result<Analysis, PhaseFault> {
    let mut fresh: Vec<MarkedBar> = bars.iter().copied().map(MarkedBar::from).collect();
    if let (Some(first), Some(archive)) = (fresh.first_mut(), archive) {
        if first.date() == archive.boundary.date() {
            first.carry_from(&archive.boundary);
        }
    }

    pivot::detect(&mut fresh)?;
    circle::classify(&mut fresh)?;
    let series = validate::validate(fresh, archive)?;
    let outcome = estimate::estimate(&series)?;

    Ok(Analysis { series, outcome })
}
