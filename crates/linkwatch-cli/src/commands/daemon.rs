//! `linkwatch start|stop|status` and the hidden `run` loop.
//!
//! `start` re-execs this binary with the `run` subcommand in the background
//! and records its pid in the liveness marker; `stop`/`status` are
//! short-lived invocations that talk to that process only through the
//! marker and SIGTERM.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use linkwatch_core::{
    DaemonController, Monitor, OsProcessControl, StartOutcome, Status, StopOutcome,
};

use super::{
    EXIT_ALREADY_RUNNING, EXIT_FATAL, EXIT_NOT_RUNNING, EXIT_OK, GlobalOpts, load_config,
};

// The marker lives beside the configured data directory (see
// `Config::marker_path`), so `start`, `stop`, and `status` agree on the same
// daemon no matter which directory each is run from.
fn controller(
    opts: &GlobalOpts,
    args: Vec<String>,
) -> Result<DaemonController<OsProcessControl>, i32> {
    let config = load_config(opts).map_err(|e| {
        eprintln!("Error: {e}");
        EXIT_FATAL
    })?;
    let procs = OsProcessControl::current_exe(args).map_err(|e| {
        eprintln!("Error: cannot locate own executable: {e}");
        EXIT_FATAL
    })?;
    Ok(DaemonController::new(config.marker_path(), procs))
}

/// Arguments the spawned daemon process is launched with, carrying every
/// relevant flag through to the loop.
fn daemon_args(opts: &GlobalOpts, interval: Option<u64>) -> Vec<String> {
    let mut args = vec!["run".to_string()];
    if let Some(secs) = interval {
        args.push("--interval".to_string());
        args.push(secs.to_string());
    }
    if let Some(path) = &opts.config {
        args.push("--config".to_string());
        args.push(path.display().to_string());
    }
    if let Some(dir) = &opts.data_dir {
        args.push("--data-dir".to_string());
        args.push(dir.display().to_string());
    }
    if let Some(dir) = &opts.archive_dir {
        args.push("--archive-dir".to_string());
        args.push(dir.display().to_string());
    }
    args
}

pub fn start(opts: &GlobalOpts, interval: Option<u64>) -> i32 {
    let ctl = match controller(opts, daemon_args(opts, interval)) {
        Ok(c) => c,
        Err(code) => return code,
    };
    match ctl.start() {
        Ok(StartOutcome::Started { pid }) => {
            println!("Monitor daemon started (pid {pid})");
            EXIT_OK
        }
        Ok(StartOutcome::AlreadyRunning { pid }) => {
            eprintln!("Monitor daemon already running (pid {pid}); not starting another");
            EXIT_ALREADY_RUNNING
        }
        Ok(StartOutcome::StartedAfterStale { pid, stale_pid }) => {
            println!(
                "Stale marker for pid {stale_pid} cleaned (previous run may have crashed); \
                 monitor daemon started (pid {pid})"
            );
            EXIT_OK
        }
        Err(e) => {
            eprintln!("Error: {e}");
            EXIT_FATAL
        }
    }
}

pub fn stop(opts: &GlobalOpts) -> i32 {
    let ctl = match controller(opts, Vec::new()) {
        Ok(c) => c,
        Err(code) => return code,
    };
    match ctl.stop() {
        Ok(StopOutcome::Stopped { pid }) => {
            println!("Monitor daemon stopped (pid {pid})");
            EXIT_OK
        }
        Ok(StopOutcome::NotRunning) => {
            eprintln!("Monitor daemon is not running");
            EXIT_NOT_RUNNING
        }
        Ok(StopOutcome::StaleMarkerCleaned { pid }) => {
            println!(
                "Stale marker cleaned: pid {pid} was already gone \
                 (previous run may have crashed)"
            );
            EXIT_OK
        }
        Err(e) => {
            eprintln!("Error: {e}");
            EXIT_FATAL
        }
    }
}

pub fn status(opts: &GlobalOpts) -> i32 {
    let ctl = match controller(opts, Vec::new()) {
        Ok(c) => c,
        Err(code) => return code,
    };
    match ctl.status() {
        Ok(Status::Running { pid }) => {
            println!("Running (pid {pid})");
            EXIT_OK
        }
        Ok(Status::Stopped) => {
            println!("Stopped");
            EXIT_NOT_RUNNING
        }
        Ok(Status::Stale { pid }) => {
            println!("Stopped (stale marker for pid {pid}; previous run may have crashed)");
            EXIT_NOT_RUNNING
        }
        Err(e) => {
            eprintln!("Error: {e}");
            EXIT_FATAL
        }
    }
}

/// The daemon loop; runs in the process `start` spawned.
pub fn run_loop(opts: &GlobalOpts, interval: Option<u64>) -> i32 {
    let mut config = match load_config(opts) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return EXIT_FATAL;
        }
    };
    if let Some(secs) = interval {
        config.interval_secs = secs;
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        log::error!("cannot install termination handler: {e}");
        return EXIT_FATAL;
    }

    let mut monitor = Monitor::new(config);
    match monitor.run(&shutdown) {
        Ok(()) => EXIT_OK,
        Err(e) => {
            // Storage medium gone; nothing durable can be promised.
            log::error!("fatal: {e}");
            EXIT_FATAL
        }
    }
}
