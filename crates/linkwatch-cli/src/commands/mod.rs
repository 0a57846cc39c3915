//! Subcommand implementations and shared CLI plumbing.

pub mod collect;
pub mod daemon;
pub mod list;

use std::path::PathBuf;

use linkwatch_core::Config;

/// Process exit codes. Downstream scripts key off these, so "already
/// running", "not running", and "degraded but completed" are distinguishable
/// from plain success and plain failure.
pub const EXIT_OK: i32 = 0;
pub const EXIT_FATAL: i32 = 1;
pub const EXIT_ALREADY_RUNNING: i32 = 2;
pub const EXIT_NOT_RUNNING: i32 = 3;
pub const EXIT_DEGRADED: i32 = 4;

/// Flags shared by every subcommand.
pub struct GlobalOpts {
    pub config: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub archive_dir: Option<PathBuf>,
}

/// Defaults, then the config file, then CLI flag overrides.
pub fn load_config(opts: &GlobalOpts) -> Result<Config, String> {
    let mut cfg = Config::load_or_default(opts.config.as_deref())
        .map_err(|e| format!("failed to load config: {e}"))?;
    if let Some(dir) = &opts.data_dir {
        cfg.data_dir = dir.clone();
    }
    if let Some(dir) = &opts.archive_dir {
        cfg.archive_dir = dir.clone();
    }
    Ok(cfg)
}
