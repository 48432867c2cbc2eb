//! Tracker configuration, read from `circletrack.toml`.
//!
//! ```toml
//! [dirs]
//! data = "data"
//! archive = "saves"
//! resource = "resources"
//! result = "results"
//!
//! [session]
//! open = "09:00"
//! close = "14:00"
//!
//! [files]
//! symbols = "config/codes.csv"
//! calendar = "config/holidays.csv"
//!
//! [batch]
//! workers = 0
//! ```
//!
//! Every section and field is optional.

use std::path::{Path, PathBuf};

use circletrack_core::session::{ArchivePolicy, SessionWindow};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid session time '{value}': {source}")]
    SessionTime {
        value: String,
        source: chrono::ParseError,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub dirs: DirsConfig,
    pub session: SessionConfig,
    pub files: FilesConfig,
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirsConfig {
    /// Live bar files, `{code}_{d|w}.csv`.
    pub data: PathBuf,
    pub archive: PathBuf,
    pub resource: PathBuf,
    pub result: PathBuf,
}

impl Default for DirsConfig {
    fn default() -> Self {
        Self {
            data: PathBuf::from("data"),
            archive: PathBuf::from("saves"),
            resource: PathBuf::from("resources"),
            result: PathBuf::from("results"),
        }
    }
}

/// Market session during which archive writes are suppressed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub open: String,
    pub close: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            open: "09:00".into(),
            close: "14:00".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// CSV with a `code,name` header.
    pub symbols: PathBuf,
    /// CSV with a `date,open` header. Without it every weekday trades.
    pub calendar: Option<PathBuf>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            symbols: PathBuf::from("config/codes.csv"),
            calendar: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Worker threads; 0 lets rayon choose.
    pub workers: usize,
}

impl TrackerConfig {
    /// Parse a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.session_window()?;
        Ok(config)
    }

    /// Load `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn session_window(&self) -> Result<SessionWindow, ConfigError> {
        let parse = |value: &str| {
            chrono::NaiveTime::parse_from_str(value, "%H:%M").map_err(|source| {
                ConfigError::SessionTime {
                    value: value.to_string(),
                    source,
                }
            })
        };
        Ok(SessionWindow {
            open: parse(&self.session.open)?,
            close: parse(&self.session.close)?,
        })
    }

    /// Archive writes are allowed only outside the configured session.
    pub fn archive_policy(&self) -> Result<ArchivePolicy, ConfigError> {
        Ok(ArchivePolicy::OutsideSession(self.session_window()?))
    }
}
