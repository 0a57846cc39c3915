//! Probe adapters over OS diagnostic utilities.
//!
//! Every probe implements the [`Probe`] trait: metadata via a static
//! [`ProbeInfo`], and a `run` that executes the underlying OS query bounded
//! by a timeout and returns raw text or a typed [`ProbeError`]. Probes never
//! parse — normalization happens in one place (`crate::normalize`) so the
//! pattern-to-field mapping is not scattered across call sites.
//!
//! Probes within a cycle run independently: one probe timing out or erroring
//! never prevents the others from running, and never blocks record assembly.

mod command;
mod connectivity;
mod eventlog;
mod wifi;

use std::time::Duration;

use crate::config::Config;
use crate::error::ProbeError;

pub use command::{CmdOutput, run_command};
pub use connectivity::PingProbe;
pub use eventlog::EventLogProbe;
pub use wifi::WifiStateProbe;

/// The three diagnostic sources one cycle draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeKind {
    /// Current WiFi link state (SSID, RSSI, noise, channel, tx rate).
    WifiState,
    /// Round-trip latency and packet loss to a reference host.
    Connectivity,
    /// Disconnect-type entries in the system event log.
    EventLog,
}

impl std::fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WifiState => write!(f, "wifi-state"),
            Self::Connectivity => write!(f, "connectivity"),
            Self::EventLog => write!(f, "event-log"),
        }
    }
}

/// Metadata about a probe.
#[derive(Debug)]
pub struct ProbeInfo {
    pub name: &'static str,
    pub kind: ProbeKind,
    pub description: &'static str,
}

/// One OS diagnostic source.
pub trait Probe: Send {
    fn info(&self) -> &'static ProbeInfo;

    /// Execute the OS query. Must return within `timeout` (plus a small
    /// polling slack), either with the command's raw text or a typed failure.
    fn run(&self, timeout: Duration) -> Result<String, ProbeError>;
}

/// Raw-or-failed output of every probe for one cycle.
pub struct CycleOutputs {
    pub wifi: Result<String, ProbeError>,
    pub connectivity: Result<String, ProbeError>,
    pub event_log: Result<String, ProbeError>,
}

/// The probes for one collection cycle.
pub struct ProbeSet {
    pub wifi: Box<dyn Probe>,
    pub connectivity: Box<dyn Probe>,
    pub event_log: Box<dyn Probe>,
}

impl ProbeSet {
    /// Platform-default probes, parameterized from the config.
    pub fn for_config(cfg: &Config) -> Self {
        Self {
            wifi: Box::new(WifiStateProbe::new()),
            connectivity: Box::new(PingProbe::new(&cfg.ping_host, cfg.ping_count)),
            event_log: Box::new(EventLogProbe::new(cfg.lookback_minutes)),
        }
    }

    /// Run all probes for one cycle. Failures are logged and carried into
    /// the result rather than short-circuiting the remaining probes.
    pub fn run_all(&self, timeout: Duration) -> CycleOutputs {
        CycleOutputs {
            wifi: run_logged(self.wifi.as_ref(), timeout),
            connectivity: run_logged(self.connectivity.as_ref(), timeout),
            event_log: run_logged(self.event_log.as_ref(), timeout),
        }
    }
}

fn run_logged(probe: &dyn Probe, timeout: Duration) -> Result<String, ProbeError> {
    let result = probe.run(timeout);
    if let Err(e) = &result {
        log::warn!("{e}");
    }
    result
}
