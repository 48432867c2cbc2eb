//! File-backed archive store.
//!
//! Layout: `{dir}/save_{code}_{d|w}.csv`, one file per instrument and
//! timeframe. Writes are atomic: write to .tmp then rename.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use super::{Archive, ArchiveError, ArchiveRecord, ArchiveStore};
use crate::domain::Timeframe;

pub struct CsvArchiveStore {
    dir: PathBuf,
}

impl CsvArchiveStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `{dir}/save_{code}_{tf}.csv`
    pub fn path_for(&self, code: &str, timeframe: Timeframe) -> PathBuf {
        self.dir.join(format!("save_{code}_{}.csv", timeframe.code()))
    }
}

impl ArchiveStore for CsvArchiveStore {
    fn load(&self, code: &str, timeframe: Timeframe) -> Result<Option<Archive>, ArchiveError> {
        let path = self.path_for(code, timeframe);
        if !path.exists() {
            return Ok(None);
        }

        let mut reader = csv::Reader::from_path(&path)?;
        let records = reader
            .deserialize::<ArchiveRecord>()
            .collect::<Result<Vec<_>, _>>()?;

        Archive::from_records(records).map(Some).map_err(|e| {
            warn!(code, timeframe = %timeframe, path = %path.display(), "unreadable archive: {e}");
            e
        })
    }

    fn save(&self, code: &str, timeframe: Timeframe, archive: &Archive) -> Result<(), ArchiveError> {
        fs::create_dir_all(&self.dir)?;

        let path = self.path_for(code, timeframe);
        let tmp_path = path.with_extension("csv.tmp");

        {
            let mut writer = csv::Writer::from_path(&tmp_path)?;
            for record in archive.to_records() {
                writer.serialize(record)?;
            }
            writer.flush()?;
        }

        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            ArchiveError::Io(e)
        })
    }

    fn remove(&self, code: &str, timeframe: Timeframe) -> Result<(), ArchiveError> {
        let path = self.path_for(code, timeframe);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn exists(&self, code: &str, timeframe: Timeframe) -> bool {
        self.path_for(code, timeframe).exists()
    }
}
