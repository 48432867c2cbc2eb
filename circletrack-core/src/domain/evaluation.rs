//! The unit handed from one evaluation to the tracker and the result table.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::state::State;
use crate::analysis::PhaseFault;

/// Outcome of evaluating one instrument on one timeframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub code: String,
    pub state: State,
    /// Close-to-close change of the last two bars, rounded to 3 places.
    pub gain_rate: f64,
    /// Date of the frontier circle the final close broke through.
    pub breakout_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub volume_rate: f64,
    /// Set when a pipeline phase faulted; `state` is then `Fail`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<PhaseFault>,
}

impl EvaluationResult {
    /// A bare result with no numbers attached.
    pub fn labelled(code: impl Into<String>, state: State) -> Self {
        Self {
            code: code.into(),
            state,
            gain_rate: 0.0,
            breakout_date: None,
            last_date: None,
            volume_rate: 0.0,
            fault: None,
        }
    }

    pub fn failed(code: impl Into<String>) -> Self {
        Self::labelled(code, State::Fail)
    }

    pub fn faulted(code: impl Into<String>, fault: PhaseFault) -> Self {
        Self {
            fault: Some(fault),
            ..Self::labelled(code, State::Fail)
        }
    }

    /// Same numbers, different label.
    pub fn relabel(mut self, state: State) -> Self {
        self.state = state;
        self
    }

    pub fn is_fail(&self) -> bool {
        self.state == State::Fail
    }
}

/// Round to three decimal places, as reported in the result table.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
