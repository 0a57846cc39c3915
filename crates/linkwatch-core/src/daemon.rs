//! Daemon lifecycle and the collection loop.
//!
//! The controller (short-lived `start`/`stop`/`status` invocations) and the
//! daemon (one long-lived background process) share nothing but the
//! filesystem: a liveness marker file holding the daemon's pid, and OS
//! termination signals. Process spawning and signaling sit behind the
//! [`ProcessControl`] trait so lifecycle logic is testable without real
//! processes.
//!
//! The loop itself is a single cooperative scheduler: probe → normalize →
//! append → sweep, then sleep until the next tick, checking a shutdown flag
//! in short slices so a stop lands within a fraction of a second rather
//! than a full interval. Any single stage failure is logged and the loop
//! carries on; only an unusable store directory terminates it.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::archive::Archiver;
use crate::config::Config;
use crate::error::{DaemonError, StoreError};
use crate::normalize;
use crate::probe::ProbeSet;
use crate::store::RecordStore;
use crate::timestamp;

/// Granularity at which the inter-cycle sleep observes the shutdown flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(250);

// ---------------------------------------------------------------------------
// Process control
// ---------------------------------------------------------------------------

/// Spawning, liveness checking, and terminating the daemon process.
pub trait ProcessControl {
    /// Launch the background daemon; returns its pid.
    fn spawn_daemon(&self) -> Result<u32, DaemonError>;

    /// Best-effort: is a process with this pid alive right now?
    fn is_alive(&self, pid: u32) -> bool;

    /// Request graceful termination.
    fn terminate(&self, pid: u32) -> Result<(), DaemonError>;
}

/// Real implementation: re-exec the current binary with the daemon-loop
/// arguments, detached from the controller's stdio; signal with `libc`.
pub struct OsProcessControl {
    exe: PathBuf,
    args: Vec<String>,
}

impl OsProcessControl {
    /// Control a daemon that runs `current_exe` with `args`.
    pub fn current_exe(args: Vec<String>) -> std::io::Result<Self> {
        Ok(Self {
            exe: std::env::current_exe()?,
            args,
        })
    }
}

impl ProcessControl for OsProcessControl {
    fn spawn_daemon(&self) -> Result<u32, DaemonError> {
        let child = Command::new(&self.exe)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(DaemonError::Spawn)?;
        Ok(child.id())
    }

    fn is_alive(&self, pid: u32) -> bool {
        // kill(pid, 0) probes existence; EPERM still means "exists".
        let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
        rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }

    fn terminate(&self, pid: u32) -> Result<(), DaemonError> {
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        // Exited between our liveness check and the signal: already stopped.
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Ok(());
        }
        Err(DaemonError::Signal { pid, source: err })
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// What `start` did.
#[derive(Debug, PartialEq, Eq)]
pub enum StartOutcome {
    Started { pid: u32 },
    /// Marker present and its process verified alive; nothing changed.
    AlreadyRunning { pid: u32 },
    /// Marker present but its process is gone — a previous run ended
    /// uncleanly. The stale marker was replaced and a fresh daemon started.
    StartedAfterStale { pid: u32, stale_pid: u32 },
}

/// What `stop` did.
#[derive(Debug, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped { pid: u32 },
    NotRunning,
    /// Marker present but its process was already gone; the marker was
    /// cleaned up. Reported distinctly so the operator knows the previous
    /// run may have crashed.
    StaleMarkerCleaned { pid: u32 },
}

/// Best-effort daemon status.
#[derive(Debug, PartialEq, Eq)]
pub enum Status {
    Running { pid: u32 },
    Stopped,
    /// Marker present, process absent.
    Stale { pid: u32 },
}

/// Start/stop/status over the liveness marker.
pub struct DaemonController<P: ProcessControl> {
    marker_path: PathBuf,
    procs: P,
}

impl<P: ProcessControl> DaemonController<P> {
    pub fn new(marker_path: impl Into<PathBuf>, procs: P) -> Self {
        Self {
            marker_path: marker_path.into(),
            procs,
        }
    }

    pub fn marker_path(&self) -> &Path {
        &self.marker_path
    }

    /// Start the daemon unless the marker names a live process.
    pub fn start(&self) -> Result<StartOutcome, DaemonError> {
        match self.read_marker()? {
            Some(pid) if self.procs.is_alive(pid) => Ok(StartOutcome::AlreadyRunning { pid }),
            Some(stale_pid) => {
                self.remove_marker()?;
                let pid = self.launch()?;
                Ok(StartOutcome::StartedAfterStale { pid, stale_pid })
            }
            None => {
                let pid = self.launch()?;
                Ok(StartOutcome::Started { pid })
            }
        }
    }

    /// Stop the daemon named by the marker, cleaning up a stale marker.
    pub fn stop(&self) -> Result<StopOutcome, DaemonError> {
        match self.read_marker()? {
            None => Ok(StopOutcome::NotRunning),
            Some(pid) if self.procs.is_alive(pid) => {
                self.procs.terminate(pid)?;
                self.remove_marker()?;
                Ok(StopOutcome::Stopped { pid })
            }
            Some(pid) => {
                self.remove_marker()?;
                Ok(StopOutcome::StaleMarkerCleaned { pid })
            }
        }
    }

    pub fn status(&self) -> Result<Status, DaemonError> {
        match self.read_marker()? {
            None => Ok(Status::Stopped),
            Some(pid) if self.procs.is_alive(pid) => Ok(Status::Running { pid }),
            Some(pid) => Ok(Status::Stale { pid }),
        }
    }

    fn launch(&self) -> Result<u32, DaemonError> {
        let pid = self.procs.spawn_daemon()?;
        self.write_marker(pid)?;
        Ok(pid)
    }

    fn read_marker(&self) -> Result<Option<u32>, DaemonError> {
        let text = match fs::read_to_string(&self.marker_path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(DaemonError::MarkerRead {
                    path: self.marker_path.clone(),
                    source: e,
                });
            }
        };
        text.lines()
            .next()
            .and_then(|l| l.trim().parse::<u32>().ok())
            .map(Some)
            .ok_or_else(|| DaemonError::MarkerCorrupt {
                path: self.marker_path.clone(),
            })
    }

    fn write_marker(&self, pid: u32) -> Result<(), DaemonError> {
        let write = || -> std::io::Result<()> {
            let dir = self
                .marker_path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            fs::create_dir_all(dir)?;
            let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
            writeln!(tmp, "{pid}")?;
            tmp.as_file().sync_all()?;
            tmp.persist(&self.marker_path).map_err(|e| e.error)?;
            Ok(())
        };
        write().map_err(|e| DaemonError::MarkerWrite {
            path: self.marker_path.clone(),
            source: e,
        })
    }

    fn remove_marker(&self) -> Result<(), DaemonError> {
        match fs::remove_file(&self.marker_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DaemonError::MarkerWrite {
                path: self.marker_path.clone(),
                source: e,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// The collection loop
// ---------------------------------------------------------------------------

/// What one cycle did.
#[derive(Debug)]
pub struct CycleReport {
    pub timestamp: DateTime<Utc>,
    /// Path of the stored record; `None` when the write was skipped.
    pub stored: Option<PathBuf>,
    /// Human-readable failure per probe that yielded no text.
    pub probe_failures: Vec<String>,
    /// Records retired by this cycle's sweep.
    pub archived: usize,
}

impl CycleReport {
    /// The cycle completed but something along the way failed.
    pub fn degraded(&self) -> bool {
        self.stored.is_none() || !self.probe_failures.is_empty()
    }
}

/// The probe → normalize → store → sweep pipeline plus its scheduler.
pub struct Monitor {
    config: Config,
    probes: ProbeSet,
    store: RecordStore,
    archiver: Archiver,
    last_stamp: Option<DateTime<Utc>>,
}

impl Monitor {
    pub fn new(config: Config) -> Self {
        let probes = ProbeSet::for_config(&config);
        Self::with_probes(config, probes)
    }

    /// Inject probes (tests use canned ones).
    pub fn with_probes(config: Config, probes: ProbeSet) -> Self {
        let store = RecordStore::new(&config.data_dir);
        let archiver = Archiver::new(&config.archive_dir);
        Self {
            config,
            probes,
            store,
            archiver,
            last_stamp: None,
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn archiver(&self) -> &Archiver {
        &self.archiver
    }

    /// Run one full cycle.
    ///
    /// Returns `Err` only for the fatal store-directory failure; every other
    /// failure is absorbed into the report.
    pub fn run_cycle(&mut self, now: DateTime<Utc>) -> Result<CycleReport, StoreError> {
        let ts = self.next_stamp(now);
        let outputs = self.probes.run_all(self.config.probe_timeout());

        let probe_failures: Vec<String> = [&outputs.wifi, &outputs.connectivity, &outputs.event_log]
            .iter()
            .filter_map(|r| r.as_ref().err().map(|e| e.to_string()))
            .collect();

        let record = normalize::normalize(ts, &outputs, self.config.lookback());

        let stored = match self.store.append(&record) {
            Ok(path) => {
                log::info!("collected diagnostics at {}", timestamp::encode(ts));
                Some(path)
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                log::error!("record write skipped: {e}");
                None
            }
        };

        let archived = match self
            .archiver
            .sweep(&self.store, self.config.retention(), ts)
        {
            Ok(report) => report.archived,
            Err(e) => {
                // Originals stay put; the next sweep retries.
                log::error!("archive sweep failed: {e}");
                0
            }
        };

        Ok(CycleReport {
            timestamp: ts,
            stored,
            probe_failures,
            archived,
        })
    }

    /// Run cycles on the configured interval until `shutdown` is set.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<(), StoreError> {
        log::info!(
            "monitor loop starting: interval {}s, retention {}d",
            self.config.interval_secs,
            self.config.retention_days
        );
        while !shutdown.load(Ordering::SeqCst) {
            let tick = Instant::now();
            let report = self.run_cycle(Utc::now())?;
            if report.degraded() {
                log::warn!(
                    "cycle {} degraded: {} probe failure(s), stored={}",
                    timestamp::encode(report.timestamp),
                    report.probe_failures.len(),
                    report.stored.is_some()
                );
            }

            let next = tick + self.config.interval();
            while Instant::now() < next {
                if shutdown.load(Ordering::SeqCst) {
                    log::info!("monitor loop stopping");
                    return Ok(());
                }
                std::thread::sleep(SHUTDOWN_POLL.min(next.saturating_duration_since(Instant::now())));
            }
        }
        log::info!("monitor loop stopping");
        Ok(())
    }

    /// Strictly increasing stamps within one daemon run: a stalled or
    /// regressed clock bumps 1 ms past the previous record.
    fn next_stamp(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let mut ts = timestamp::truncate_to_millis(now);
        if let Some(last) = self.last_stamp {
            if ts <= last {
                ts = last + chrono::Duration::milliseconds(1);
            }
        }
        self.last_stamp = Some(ts);
        ts
    }
}
