//! Trend-state labels.
//!
//! The label strings are part of the persisted result-table format and are
//! kept verbatim, including their mixed casing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Categorical classification of one instrument for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum State {
    /// No data, or the pipeline faulted.
    Fail,
    /// Not enough pivot structure yet.
    Invalid,
    /// Pivots exist but no circle frontier has formed.
    Toss,
    Rise,
    Drop,
    /// Upward breakout confirmed.
    RiseBT,
    /// Downward breakout confirmed.
    DropFT,
    /// Weekly frame does not qualify for daily tracking.
    Unfit,
    /// Daily and weekly upward breakouts agree.
    SynBT,
    /// Daily and weekly downward breakouts agree.
    SynFT,
    /// Historical replay: the breakout already fired earlier in the week.
    Cancel,
    MissingSource,
    DailyFailed,
    WeeklyFailed,
    MissingIntermediate,
}

impl State {
    pub const ALL: [State; 15] = [
        State::Fail,
        State::Invalid,
        State::Toss,
        State::Rise,
        State::Drop,
        State::RiseBT,
        State::DropFT,
        State::Unfit,
        State::SynBT,
        State::SynFT,
        State::Cancel,
        State::MissingSource,
        State::DailyFailed,
        State::WeeklyFailed,
        State::MissingIntermediate,
    ];

    pub fn label(self) -> &'static str {
        match self {
            State::Fail => "fail",
            State::Invalid => "invalid",
            State::Toss => "toss",
            State::Rise => "Rise",
            State::Drop => "Drop",
            State::RiseBT => "RiseBT",
            State::DropFT => "DropFT",
            State::Unfit => "Unfit",
            State::SynBT => "SynBT",
            State::SynFT => "SynFT",
            State::Cancel => "cancel",
            State::MissingSource => "Missing the source",
            State::DailyFailed => "Daily analysis failed",
            State::WeeklyFailed => "Weekly analysis failed",
            State::MissingIntermediate => "missing intermediate data",
        }
    }

    /// Confirmed breakout in either direction.
    pub fn is_breakout(self) -> bool {
        matches!(self, State::RiseBT | State::DropFT)
    }

    /// Unresolved continuation.
    pub fn is_continuation(self) -> bool {
        matches!(self, State::Rise | State::Drop)
    }

    /// Result-table bucket rank; `None` for states that are not reported.
    ///
    /// Order: `SynBT, SynFT, RiseBT, DropFT, {Rise, Drop}`.
    pub fn bucket(self) -> Option<u8> {
        match self {
            State::SynBT => Some(0),
            State::SynFT => Some(1),
            State::RiseBT => Some(2),
            State::DropFT => Some(3),
            State::Rise | State::Drop => Some(4),
            _ => None,
        }
    }

    /// Plain continuation label for the same direction as a breakout.
    pub fn base_form(self) -> State {
        match self {
            State::RiseBT | State::SynBT => State::Rise,
            State::DropFT | State::SynFT => State::Drop,
            other => other,
        }
    }

    /// Synchronized label for a breakout confirmed on both timeframes.
    pub fn synchronized(self) -> State {
        match self {
            State::RiseBT => State::SynBT,
            State::DropFT => State::SynFT,
            other => other,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A label that is not part of the state set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown state label '{0}'")]
pub struct UnknownState(pub String);

impl FromStr for State {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        State::ALL
            .iter()
            .copied()
            .find(|state| state.label() == s)
            .ok_or_else(|| UnknownState(s.to_string()))
    }
}

impl From<State> for String {
    fn from(state: State) -> String {
        state.label().to_string()
    }
}

impl TryFrom<String> for State {
    type Error = UnknownState;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
