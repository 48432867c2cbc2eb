//! Bar period granularity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "d")]
    Daily,
    #[serde(rename = "w")]
    Weekly,
}

impl Timeframe {
    /// Short code used in file names (`d` / `w`).
    pub fn code(self) -> &'static str {
        match self {
            Timeframe::Daily => "d",
            Timeframe::Weekly => "w",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "d" | "daily" => Ok(Timeframe::Daily),
            "w" | "weekly" => Ok(Timeframe::Weekly),
            other => Err(format!("unknown timeframe '{other}' (expected d or w)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_and_long_names() {
        assert_eq!("d".parse::<Timeframe>(), Ok(Timeframe::Daily));
        assert_eq!("weekly".parse::<Timeframe>(), Ok(Timeframe::Weekly));
        assert!("m".parse::<Timeframe>().is_err());
    }
}
