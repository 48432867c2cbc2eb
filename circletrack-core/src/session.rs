//! Wall-clock gate for archive writes.
//!
//! State is only checkpointed outside the market session so a still-forming
//! bar is never frozen into the archive.

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Half-open session interval `[open, close)` in local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWindow {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl Default for SessionWindow {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            close: NaiveTime::from_hms_opt(14, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl SessionWindow {
    /// Parse `HH:MM` bounds.
    pub fn parse(open: &str, close: &str) -> Result<Self, chrono::ParseError> {
        Ok(Self {
            open: NaiveTime::parse_from_str(open, "%H:%M")?,
            close: NaiveTime::parse_from_str(close, "%H:%M")?,
        })
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.open && time < self.close
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// A clock stuck at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// When an evaluation may rewrite its archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchivePolicy {
    Always,
    Never,
    OutsideSession(SessionWindow),
}

impl Default for ArchivePolicy {
    fn default() -> Self {
        ArchivePolicy::OutsideSession(SessionWindow::default())
    }
}

impl ArchivePolicy {
    pub fn permits_write(&self, clock: &dyn Clock) -> bool {
        match self {
            ArchivePolicy::Always => true,
            ArchivePolicy::Never => false,
            ArchivePolicy::OutsideSession(window) => !window.contains(clock.now().time()),
        }
    }
}
