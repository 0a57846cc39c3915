//! Error taxonomy for the collection pipeline.
//!
//! The guiding rule is absorption at the lowest level: probe and field-level
//! failures degrade the record, store write failures skip one cycle, archive
//! write failures retry on the next sweep. Only [`StoreError::DirUnavailable`]
//! is fatal to the daemon, because without a writable store directory no
//! durability can be promised at all.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Why a probe produced no text.
///
/// Never fatal: the normalizer receives the failure instead of text and the
/// corresponding record section degrades to null.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe `{probe}` timed out after {seconds:.0}s")]
    Timeout { probe: &'static str, seconds: f64 },

    #[error("probe `{probe}` denied: {source}")]
    PermissionDenied {
        probe: &'static str,
        source: io::Error,
    },

    #[error("probe `{probe}` command not found")]
    NotFound { probe: &'static str },

    #[error("probe `{probe}` exited with status {code}")]
    NonZeroExit { probe: &'static str, code: i32 },

    #[error("probe `{probe}` failed: {source}")]
    Io {
        probe: &'static str,
        source: io::Error,
    },
}

/// Record store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store directory itself cannot be created or written. Fatal: the
    /// daemon loop terminates on this variant.
    #[error("store directory {dir} unavailable: {source}")]
    DirUnavailable { dir: PathBuf, source: io::Error },

    /// One record failed to serialize or land. The cycle is skipped and the
    /// loop continues.
    #[error("failed to write record {path}: {source}")]
    WriteFailed { path: PathBuf, source: io::Error },

    #[error("record {path} already exists")]
    DuplicateStamp { path: PathBuf },

    #[error("failed to read record {path}: {source}")]
    ReadFailed { path: PathBuf, source: io::Error },

    #[error("record {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl StoreError {
    /// True for the storage-medium-level failure that should terminate the
    /// daemon rather than skip a cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::DirUnavailable { .. })
    }
}

/// Archive sweep failures. Group-level: on any error the originals stay in
/// the store and the next sweep retries the same records.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive directory {dir} unavailable: {source}")]
    DirUnavailable { dir: PathBuf, source: io::Error },

    #[error("failed to write bundle {path}: {source}")]
    BundleWrite { path: PathBuf, source: io::Error },

    #[error("failed to read bundle {path}: {source}")]
    BundleRead { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Daemon lifecycle failures. "Already running" and "not running" are
/// outcomes, not errors — see `daemon::StartOutcome` / `daemon::StopOutcome`.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("failed to read liveness marker {path}: {source}")]
    MarkerRead { path: PathBuf, source: io::Error },

    #[error("liveness marker {path} is malformed")]
    MarkerCorrupt { path: PathBuf },

    #[error("failed to write liveness marker {path}: {source}")]
    MarkerWrite { path: PathBuf, source: io::Error },

    #[error("failed to spawn daemon process: {0}")]
    Spawn(io::Error),

    #[error("failed to signal process {pid}: {source}")]
    Signal { pid: u32, source: io::Error },
}
