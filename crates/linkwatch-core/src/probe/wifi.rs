//! WiFi link-state probe.
//!
//! Returns the raw text of whichever platform utility reports the current
//! link best; extraction of SSID/RSSI/noise/channel/rate from that text is
//! the normalizer's job.
//!
//! On macOS the probe first discovers the Wi-Fi device name from
//! `networksetup -listallhardwareports`, reads `ipconfig getsummary <dev>`,
//! and falls back to the legacy `airport -I` when the summary carries no
//! signal fields. On Linux it prefers `iwconfig` and falls back to
//! `iw dev <dev> link`.

use std::time::Duration;

use crate::error::ProbeError;
use crate::probe::command::{require_success, run_command};
use crate::probe::{Probe, ProbeInfo, ProbeKind};

static WIFI_STATE_INFO: ProbeInfo = ProbeInfo {
    name: "wifi-state",
    kind: ProbeKind::WifiState,
    description: "Current WiFi link state via platform WiFi utilities",
};

pub struct WifiStateProbe;

impl WifiStateProbe {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WifiStateProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl Probe for WifiStateProbe {
    fn info(&self) -> &'static ProbeInfo {
        &WIFI_STATE_INFO
    }

    fn run(&self, timeout: Duration) -> Result<String, ProbeError> {
        #[cfg(target_os = "macos")]
        {
            run_macos(timeout)
        }
        #[cfg(target_os = "linux")]
        {
            run_linux(timeout)
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux")))]
        {
            let _ = timeout;
            Err(ProbeError::NotFound {
                probe: WIFI_STATE_INFO.name,
            })
        }
    }
}

#[cfg(target_os = "macos")]
fn run_macos(timeout: Duration) -> Result<String, ProbeError> {
    let name = WIFI_STATE_INFO.name;

    if let Some(device) = discover_wifi_device(timeout) {
        let out = run_command(
            name,
            "/usr/sbin/ipconfig",
            &["getsummary", &device],
            timeout,
        )?;
        // getsummary only carries RSSI on associated interfaces; otherwise
        // fall through to airport.
        if out.success() && out.stdout.contains("RSSI") {
            return Ok(out.stdout);
        }
    }

    let airport =
        "/System/Library/PrivateFrameworks/Apple80211.framework/Versions/Current/Resources/airport";
    let out = run_command(name, airport, &["-I"], timeout)?;
    require_success(name, out)
}

/// Parse `networksetup -listallhardwareports` for the Wi-Fi device (e.g. "en0").
#[cfg(target_os = "macos")]
fn discover_wifi_device(timeout: Duration) -> Option<String> {
    let out = run_command(
        WIFI_STATE_INFO.name,
        "/usr/sbin/networksetup",
        &["-listallhardwareports"],
        timeout,
    )
    .ok()?;
    if !out.success() {
        return None;
    }

    let mut found_wifi = false;
    for line in out.stdout.lines() {
        if line.contains("Wi-Fi") || line.contains("AirPort") {
            found_wifi = true;
            continue;
        }
        if found_wifi && line.starts_with("Device:") {
            let device = line.trim_start_matches("Device:").trim();
            if !device.is_empty() {
                return Some(device.to_string());
            }
        }
        // Next hardware port block without a device line: keep looking.
        if found_wifi && line.starts_with("Hardware Port:") {
            found_wifi = false;
        }
    }
    None
}

#[cfg(target_os = "linux")]
fn run_linux(timeout: Duration) -> Result<String, ProbeError> {
    let name = WIFI_STATE_INFO.name;

    match run_command(name, "iwconfig", &[], timeout) {
        Ok(out) if out.success() && !out.stdout.trim().is_empty() => return Ok(out.stdout),
        _ => {}
    }

    let device = discover_wireless_device(timeout).ok_or(ProbeError::NotFound { probe: name })?;
    let out = run_command(name, "iw", &["dev", &device, "link"], timeout)?;
    require_success(name, out)
}

/// Parse `iw dev` for the first `Interface <name>` line.
#[cfg(target_os = "linux")]
fn discover_wireless_device(timeout: Duration) -> Option<String> {
    let out = run_command(WIFI_STATE_INFO.name, "iw", &["dev"], timeout).ok()?;
    if !out.success() {
        return None;
    }
    out.stdout.lines().find_map(|line| {
        line.trim()
            .strip_prefix("Interface ")
            .map(|dev| dev.trim().to_string())
    })
}
