//! Per-bar pivot annotation.

use serde::{Deserialize, Serialize};

/// Pivot ("turn") annotation on a bar.
///
/// Persisted as `1` (peak), `-1` (trough) and `0` (none).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Turn {
    #[default]
    None,
    Peak,
    Trough,
}

impl Turn {
    pub fn is_pivot(self) -> bool {
        !matches!(self, Turn::None)
    }

    /// The other pivot kind. `None` maps to itself.
    pub fn opposite(self) -> Turn {
        match self {
            Turn::Peak => Turn::Trough,
            Turn::Trough => Turn::Peak,
            Turn::None => Turn::None,
        }
    }
}

impl From<Turn> for i8 {
    fn from(turn: Turn) -> i8 {
        match turn {
            Turn::None => 0,
            Turn::Peak => 1,
            Turn::Trough => -1,
        }
    }
}

impl TryFrom<i8> for Turn {
    type Error = InvalidTurn;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Turn::None),
            1 => Ok(Turn::Peak),
            -1 => Ok(Turn::Trough),
            other => Err(InvalidTurn(other)),
        }
    }
}

/// A persisted turn value outside `{-1, 0, 1}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid turn value {0}")]
pub struct InvalidTurn(pub i8);
