//! Append-only record store.
//!
//! One JSON document per collection cycle, named `log_<stamp>.json` from the
//! record's canonical timestamp, so a plain filename sort is a chronological
//! sort. Appends are whole-document: the record is serialized into a
//! temporary file in the store directory, fsynced, and atomically renamed
//! into place — a reader can never observe a half-written document.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::record::DiagnosticRecord;
use crate::timestamp;

/// A record's location and timestamp, from its filename alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    pub path: PathBuf,
    pub timestamp: DateTime<Utc>,
}

/// The live record directory.
pub struct RecordStore {
    dir: PathBuf,
}

impl RecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist one record. Whole-document, atomic; errors on a timestamp
    /// collision rather than overwriting (records are immutable).
    pub fn append(&self, record: &DiagnosticRecord) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::DirUnavailable {
            dir: self.dir.clone(),
            source: e,
        })?;

        let path = self.dir.join(timestamp::record_filename(record.timestamp));
        if path.exists() {
            return Err(StoreError::DuplicateStamp { path });
        }

        let json = serde_json::to_vec_pretty(record).map_err(|e| StoreError::WriteFailed {
            path: path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;

        let mut tmp =
            tempfile::NamedTempFile::new_in(&self.dir).map_err(|e| StoreError::DirUnavailable {
                dir: self.dir.clone(),
                source: e,
            })?;
        let write = tmp
            .write_all(&json)
            .and_then(|()| tmp.as_file().sync_all());
        if let Err(e) = write {
            return Err(StoreError::WriteFailed { path, source: e });
        }
        tmp.persist(&path)
            .map_err(|e| StoreError::WriteFailed {
                path: path.clone(),
                source: e.error,
            })?;
        Ok(path)
    }

    /// All record entries in `[since, until]`, sorted chronologically.
    /// Non-record files in the directory are ignored.
    pub fn entries(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<StoreEntry>, StoreError> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            // An absent store is an empty store.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::DirUnavailable {
                    dir: self.dir.clone(),
                    source: e,
                });
            }
        };

        let mut entries = Vec::new();
        for dirent in read_dir {
            let dirent = dirent.map_err(|e| StoreError::DirUnavailable {
                dir: self.dir.clone(),
                source: e,
            })?;
            let name = dirent.file_name();
            let Some(ts) = timestamp::parse_record_filename(&name.to_string_lossy()) else {
                continue;
            };
            if since.is_some_and(|s| ts < s) || until.is_some_and(|u| ts > u) {
                continue;
            }
            entries.push(StoreEntry {
                path: dirent.path(),
                timestamp: ts,
            });
        }
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }

    /// Entries strictly older than `cutoff` (the archiver's selection).
    pub fn entries_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<StoreEntry>, StoreError> {
        let mut entries = self.entries(None, None)?;
        entries.retain(|e| e.timestamp < cutoff);
        Ok(entries)
    }

    /// Lazy chronological iterator over records in `[since, until]`.
    /// Restartable: call again for a fresh pass.
    pub fn list(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<impl Iterator<Item = Result<DiagnosticRecord, StoreError>> + use<>, StoreError>
    {
        Ok(self.entries(since, until)?.into_iter().map(|e| load(&e.path)))
    }
}

/// Load one record document.
pub fn load(path: &Path) -> Result<DiagnosticRecord, StoreError> {
    let text = fs::read_to_string(path).map_err(|e| StoreError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&text).map_err(|e| StoreError::Corrupt {
        path: path.to_path_buf(),
        source: e,
    })
}
