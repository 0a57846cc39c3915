//! System event-log probe.
//!
//! Fetches the trailing lookback window of WiFi-related log lines. The
//! normalizer filters for disconnect-type lines and splits them into
//! timestamp/message pairs; this probe only bounds the window and picks the
//! per-platform log reader.
//!
//! macOS needs `log show`, which is slow and can be blocked by privacy
//! settings — a nonzero exit there usually means missing permissions, and is
//! surfaced as a typed failure so the cycle records a synthetic error event
//! instead of silence.

use std::time::Duration;

use crate::error::ProbeError;
use crate::probe::command::{require_success, run_command};
use crate::probe::{Probe, ProbeInfo, ProbeKind};

static EVENT_LOG_INFO: ProbeInfo = ProbeInfo {
    name: "event-log",
    kind: ProbeKind::EventLog,
    description: "WiFi-related system log lines from the lookback window",
};

/// Predicate limiting the macOS unified log to WiFi-adjacent messages.
#[cfg(target_os = "macos")]
const MACOS_PREDICATE: &str =
    r#"eventMessage CONTAINS "WiFi" OR eventMessage CONTAINS "AirPort" OR eventMessage CONTAINS "en0""#;

pub struct EventLogProbe {
    lookback_minutes: u32,
}

impl EventLogProbe {
    pub fn new(lookback_minutes: u32) -> Self {
        Self {
            lookback_minutes: lookback_minutes.max(1),
        }
    }
}

impl Probe for EventLogProbe {
    fn info(&self) -> &'static ProbeInfo {
        &EVENT_LOG_INFO
    }

    fn run(&self, timeout: Duration) -> Result<String, ProbeError> {
        #[cfg(target_os = "macos")]
        {
            let last = format!("{}m", self.lookback_minutes);
            let out = run_command(
                EVENT_LOG_INFO.name,
                "log",
                &[
                    "show",
                    "--style",
                    "syslog",
                    "--predicate",
                    MACOS_PREDICATE,
                    "--last",
                    &last,
                ],
                timeout,
            )?;
            require_success(EVENT_LOG_INFO.name, out)
        }
        #[cfg(target_os = "linux")]
        {
            let since = format!("-{}min", self.lookback_minutes);
            let out = run_command(
                EVENT_LOG_INFO.name,
                "journalctl",
                &["--since", &since, "--no-pager", "-q", "-o", "short-iso"],
                timeout,
            )?;
            require_success(EVENT_LOG_INFO.name, out)
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux")))]
        {
            let _ = timeout;
            Err(ProbeError::NotFound {
                probe: EVENT_LOG_INFO.name,
            })
        }
    }
}
