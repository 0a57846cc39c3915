//! Connectivity probe: ping a reference host for latency and loss.

use std::time::Duration;

use crate::error::ProbeError;
use crate::probe::command::run_command;
use crate::probe::{Probe, ProbeInfo, ProbeKind};

static CONNECTIVITY_INFO: ProbeInfo = ProbeInfo {
    name: "connectivity",
    kind: ProbeKind::Connectivity,
    description: "Round-trip latency and packet loss via ping",
};

pub struct PingProbe {
    host: String,
    count: u32,
}

impl PingProbe {
    pub fn new(host: &str, count: u32) -> Self {
        Self {
            host: host.to_string(),
            count: count.max(1),
        }
    }
}

impl Probe for PingProbe {
    fn info(&self) -> &'static ProbeInfo {
        &CONNECTIVITY_INFO
    }

    fn run(&self, timeout: Duration) -> Result<String, ProbeError> {
        let count = self.count.to_string();
        let out = run_command(
            CONNECTIVITY_INFO.name,
            "ping",
            &["-c", &count, &self.host],
            timeout,
        )?;
        // ping exits nonzero when replies are lost; the loss report in its
        // output is exactly the sample we are after, so only an empty report
        // counts as a failed probe.
        if out.stdout.trim().is_empty() {
            return Err(ProbeError::NonZeroExit {
                probe: CONNECTIVITY_INFO.name,
                code: out.code,
            });
        }
        Ok(out.stdout)
    }
}
