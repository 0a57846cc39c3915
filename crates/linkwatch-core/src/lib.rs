//! # linkwatch-core
//!
//! **One machine, one operator, a week of WiFi truth.**
//!
//! `linkwatch-core` is the collection–normalization–retention pipeline behind
//! the `linkwatch` monitor: it probes the host's WiFi state, connectivity,
//! and system event log through OS utilities, normalizes their free-text
//! output into structured diagnostic records, appends them to a store whose
//! filename order is chronological order, and retires aged records into
//! dated compressed bundles.
//!
//! ## Quick start
//!
//! ```no_run
//! use linkwatch_core::{Config, Monitor};
//!
//! let mut monitor = Monitor::new(Config::default());
//! let report = monitor.run_cycle(chrono::Utc::now()).unwrap();
//! println!("stored: {:?}, archived: {}", report.stored, report.archived);
//! ```
//!
//! ## Architecture
//!
//! Probes → Normalizer → Store → Archiver, scheduled by the daemon loop.
//!
//! Failure is absorbed at the lowest level that can hold it: a probe failure
//! nulls one record section, a field mismatch nulls one field, a store write
//! failure skips one cycle, an archive failure retries next sweep. Only an
//! unusable store directory is fatal. At any instant a record lives in
//! exactly one place — the store or one bundle — and sweeps are idempotent.

pub mod archive;
pub mod config;
pub mod daemon;
pub mod error;
pub mod normalize;
pub mod probe;
pub mod reader;
pub mod record;
pub mod store;
pub mod timestamp;

pub use archive::{Archiver, SweepReport, read_bundle};
pub use config::Config;
pub use daemon::{
    CycleReport, DaemonController, Monitor, OsProcessControl, ProcessControl, StartOutcome,
    Status, StopOutcome,
};
pub use error::{ArchiveError, DaemonError, ProbeError, StoreError};
pub use normalize::normalize;
pub use probe::{CycleOutputs, Probe, ProbeInfo, ProbeKind, ProbeSet};
pub use reader::RangeQuery;
pub use record::{DiagnosticRecord, DisconnectEvent, NetworkSample, WifiSample};
pub use store::{RecordStore, StoreEntry};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
