//! Diagnostic normalizer: free-text probe output → one [`DiagnosticRecord`].
//!
//! All pattern-to-field mappings live here, as per-field key tables plus a
//! small set of shared line-scanning extractors. Every field is extracted
//! independently: a key that never matches, or a matched value that fails
//! numeric conversion, yields null for that field and nothing else. Numeric
//! conversion parses the full value token — `-55.5` does not become `-55`
//! for an integer field, it becomes null.
//!
//! The key tables cover every utility the probes may have sampled:
//! `ipconfig getsummary` / `airport -I` on macOS, `iwconfig` / `iw … link`
//! on Linux, and both the BSD (`round-trip min/avg/max`) and Linux
//! (`rtt min/avg/max/mdev`) ping summary shapes.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

use crate::probe::CycleOutputs;
use crate::record::{DiagnosticRecord, DisconnectEvent, NetworkSample, WifiSample};

// ---------------------------------------------------------------------------
// Field key tables
// ---------------------------------------------------------------------------

const SSID_KEYS: &[&str] = &["agrCtlSSID", "ESSID", "SSID"];
const RSSI_KEYS: &[&str] = &["agrCtlRSSI", "RSSI", "Signal level", "signal"];
const NOISE_KEYS: &[&str] = &["agrCtlNoise", "Noise level", "Noise"];
const CHANNEL_KEYS: &[&str] = &["channel", "Channel"];
const TX_RATE_KEYS: &[&str] = &["lastTxRate", "Bit Rate", "tx bitrate"];

/// Case-insensitive markers of a disconnect-type log line. "disassociate"
/// also covers "disassociated".
const DISCONNECT_KEYWORDS: &[&str] = &["disconnect", "disassociate", "link down"];

/// Slack in seconds applied to the upper edge of the lookback window, so log
/// lines stamped marginally ahead of the cycle clock are not dropped.
const EVENT_CLOCK_SLACK_SECS: i64 = 60;

// ---------------------------------------------------------------------------
// Record assembly
// ---------------------------------------------------------------------------

/// Assemble one record from the three raw-or-failed probe outputs.
///
/// A failed probe leaves its section `None` (or, for the event log, a single
/// synthetic error event); a successful probe always yields a section, even
/// when none of its fields could be extracted. Record creation itself cannot
/// fail.
pub fn normalize(
    timestamp: DateTime<Utc>,
    outputs: &CycleOutputs,
    lookback: Duration,
) -> DiagnosticRecord {
    let wifi = outputs.wifi.as_ref().ok().map(|text| parse_wifi(text));
    let network = outputs
        .connectivity
        .as_ref()
        .ok()
        .map(|text| parse_network(text));
    let disconnect_events = match &outputs.event_log {
        Ok(text) => scrape_events(text, timestamp, lookback),
        Err(e) => vec![DisconnectEvent::probe_failure(timestamp, &e.to_string())],
    };

    DiagnosticRecord {
        timestamp,
        wifi,
        network,
        disconnect_events,
    }
}

// ---------------------------------------------------------------------------
// WiFi state
// ---------------------------------------------------------------------------

/// Extract WiFi link fields from whichever utility's text we were handed.
pub fn parse_wifi(text: &str) -> WifiSample {
    WifiSample {
        ssid: string_field(text, SSID_KEYS),
        rssi: int_field(text, RSSI_KEYS),
        noise: int_field(text, NOISE_KEYS),
        channel: token_field(text, CHANNEL_KEYS),
        tx_rate: float_field(text, TX_RATE_KEYS),
    }
}

// ---------------------------------------------------------------------------
// Connectivity
// ---------------------------------------------------------------------------

/// Extract packet loss and average latency from a ping report.
pub fn parse_network(text: &str) -> NetworkSample {
    NetworkSample {
        packet_loss_percent: parse_packet_loss(text),
        avg_latency_ms: parse_avg_latency(text),
    }
}

/// `5 packets transmitted, …, 2% packet loss` (BSD) or
/// `…, 2% packet loss, time 4004ms` (Linux): the token ending in `%` on the
/// packet-loss line.
fn parse_packet_loss(text: &str) -> Option<f64> {
    let line = text.lines().find(|l| l.contains("packet loss"))?;
    line.split([' ', ','])
        .find_map(|tok| tok.strip_suffix('%'))
        .and_then(parse_float_token)
}

/// `round-trip min/avg/max = 10/12/15 ms` (BSD) or
/// `rtt min/avg/max/mdev = 10.1/12.2/15.0/1.2 ms` (Linux): the second
/// slash-separated value after the `=`.
fn parse_avg_latency(text: &str) -> Option<f64> {
    let line = text.lines().find(|l| l.contains("min/avg/max"))?;
    let values = line.split_once('=')?.1;
    let avg = values.split('/').nth(1)?;
    parse_float_token(avg)
}

// ---------------------------------------------------------------------------
// Event log scraping
// ---------------------------------------------------------------------------

/// Filter log text for disconnect-type lines inside the lookback window and
/// split each into its leading timestamp token and trailing message.
///
/// The boundary rule: a matching line must begin with a `YYYY-MM-DD` date
/// token; the following whitespace-separated token joins the timestamp when
/// it starts with a digit (syslog time-of-day), and everything after is the
/// message. Lines that match a keyword but not the boundary rule are dropped
/// silently. Log order (chronological) is preserved.
pub fn scrape_events(
    text: &str,
    now: DateTime<Utc>,
    lookback: Duration,
) -> Vec<DisconnectEvent> {
    let cutoff = now - lookback;
    let horizon = now + Duration::seconds(EVENT_CLOCK_SLACK_SECS);

    let mut events = Vec::new();
    for line in text.lines() {
        let lower = line.to_lowercase();
        if !DISCONNECT_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            continue;
        }
        let Some((stamp_text, message)) = split_event_line(line) else {
            continue;
        };
        let Some(event_ts) = parse_event_timestamp(&stamp_text) else {
            continue;
        };
        if event_ts < cutoff || event_ts > horizon {
            continue;
        }
        events.push(DisconnectEvent {
            timestamp: stamp_text,
            message: message.to_string(),
        });
    }
    events
}

/// Apply the boundary rule to one line. Returns (timestamp text, message).
fn split_event_line(line: &str) -> Option<(String, &str)> {
    let line = line.trim_end();
    let (first, rest) = line.split_once(char::is_whitespace)?;
    if !is_date_token(first) {
        return None;
    }
    let rest = rest.trim_start();

    // Syslog style carries the time-of-day as a second token.
    if rest.starts_with(|c: char| c.is_ascii_digit()) {
        let (second, message) = rest.split_once(char::is_whitespace)?;
        let message = message.trim_start();
        if message.is_empty() {
            return None;
        }
        return Some((format!("{first} {second}"), message));
    }

    if rest.is_empty() {
        return None;
    }
    Some((first.to_string(), rest))
}

/// True for tokens beginning `YYYY-MM-DD` (possibly with a `T…` time suffix).
fn is_date_token(tok: &str) -> bool {
    let b = tok.as_bytes();
    b.len() >= 10
        && b[..4].iter().all(u8::is_ascii_digit)
        && b[4] == b'-'
        && b[5..7].iter().all(u8::is_ascii_digit)
        && b[7] == b'-'
        && b[8..10].iter().all(u8::is_ascii_digit)
}

/// Best-effort parse of an event timestamp; offset-free stamps are read as
/// UTC (the probes already bound the window at the source, this filter is a
/// second check).
fn parse_event_timestamp(s: &str) -> Option<DateTime<Utc>> {
    for fmt in [
        "%Y-%m-%d %H:%M:%S%.f%z",
        "%Y-%m-%dT%H:%M:%S%.f%z",
        "%Y-%m-%dT%H:%M:%S%z",
    ] {
        if let Ok(ts) = DateTime::parse_from_str(s, fmt) {
            return Some(ts.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Shared extractors
// ---------------------------------------------------------------------------

/// Find the first `key : value` / `key = value` occurrence for any key, in
/// key-table priority order, and return the raw value text (rest of line).
fn find_value<'a>(text: &'a str, keys: &[&str]) -> Option<&'a str> {
    for key in keys {
        for line in text.lines() {
            let Some(idx) = line.find(key) else { continue };
            let rest = line[idx + key.len()..].trim_start();
            let Some(value) = rest
                .strip_prefix(':')
                .or_else(|| rest.strip_prefix('='))
            else {
                continue;
            };
            let value = value.trim();
            if !value.is_empty() {
                return Some(value);
            }
        }
    }
    None
}

/// Whole remaining value as a string, unquoting `"…"` (iwconfig ESSIDs).
fn string_field(text: &str, keys: &[&str]) -> Option<String> {
    let value = find_value(text, keys)?;
    if let Some(inner) = value.strip_prefix('"').and_then(|v| v.split('"').next()) {
        if inner.is_empty() {
            return None;
        }
        return Some(inner.to_string());
    }
    Some(value.to_string())
}

/// First whitespace-delimited token of the value, kept as text.
fn token_field(text: &str, keys: &[&str]) -> Option<String> {
    find_value(text, keys)?
        .split_whitespace()
        .next()
        .map(str::to_string)
}

/// First value token parsed as an integer; a fractional or otherwise
/// malformed token is a non-match, never truncated.
fn int_field(text: &str, keys: &[&str]) -> Option<i64> {
    let value = find_value(text, keys)?;
    let tok = first_numeric_token(value)?;
    tok.parse::<i64>().ok()
}

/// First value token parsed as a float.
fn float_field(text: &str, keys: &[&str]) -> Option<f64> {
    let value = find_value(text, keys)?;
    let tok = first_numeric_token(value)?;
    parse_float_token(tok)
}

fn first_numeric_token(value: &str) -> Option<&str> {
    value.split([' ', '\t', ',']).find(|t| !t.is_empty())
}

fn parse_float_token(tok: &str) -> Option<f64> {
    let v = tok.trim().parse::<f64>().ok()?;
    v.is_finite().then_some(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;
    use chrono::TimeZone;

    fn cycle_ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 10, 5, 0).unwrap()
    }

    #[test]
    fn airport_style_wifi_fields() {
        let text = "\
     agrCtlRSSI: -55
    agrCtlNoise: -92
     agrCtlSSID: HomeNet 5G
        channel: 36,1
     lastTxRate: 866
";
        let sample = parse_wifi(text);
        assert_eq!(sample.rssi, Some(-55));
        assert_eq!(sample.noise, Some(-92));
        assert_eq!(sample.ssid.as_deref(), Some("HomeNet 5G"));
        assert_eq!(sample.channel.as_deref(), Some("36,1"));
        assert_eq!(sample.tx_rate, Some(866.0));
    }

    #[test]
    fn iwconfig_style_wifi_fields() {
        let text = "\
wlan0     IEEE 802.11  ESSID:\"HomeNet\"
          Bit Rate=866.7 Mb/s   Tx-Power=22 dBm
          Link Quality=70/70  Signal level=-55 dBm
";
        let sample = parse_wifi(text);
        assert_eq!(sample.ssid.as_deref(), Some("HomeNet"));
        assert_eq!(sample.rssi, Some(-55));
        assert_eq!(sample.tx_rate, Some(866.7));
        assert_eq!(sample.noise, None);
    }

    #[test]
    fn spec_probe_vector() {
        // "RSSI: -55 dBm" + BSD ping summary.
        let wifi = parse_wifi("RSSI: -55 dBm\n");
        assert_eq!(wifi.rssi, Some(-55));

        let net =
            parse_network("2% packet loss, round-trip min/avg/max = 10/12/15 ms\n");
        assert_eq!(net.packet_loss_percent, Some(2.0));
        assert_eq!(net.avg_latency_ms, Some(12.0));
    }

    #[test]
    fn linux_ping_summary() {
        let text = "\
5 packets transmitted, 5 received, 0% packet loss, time 4004ms
rtt min/avg/max/mdev = 10.123/12.456/15.012/1.234 ms
";
        let net = parse_network(text);
        assert_eq!(net.packet_loss_percent, Some(0.0));
        assert_eq!(net.avg_latency_ms, Some(12.456));
    }

    #[test]
    fn unparseable_numeric_match_is_null_not_truncated() {
        let sample = parse_wifi("RSSI: -55.5\n");
        assert_eq!(sample.rssi, None);

        let net = parse_network("n/a% packet loss\n");
        assert_eq!(net.packet_loss_percent, None);
    }

    #[test]
    fn missing_fields_do_not_invalidate_siblings() {
        let sample = parse_wifi("SSID: CoffeeShop\n");
        assert_eq!(sample.ssid.as_deref(), Some("CoffeeShop"));
        assert_eq!(sample.rssi, None);
        assert_eq!(sample.tx_rate, None);
    }

    #[test]
    fn event_scrape_splits_and_drops() {
        let text = "\
2024-03-10 10:00:00 wifi0 link down
2024-03-10 10:00:05 unrelated message
";
        let events = scrape_events(text, cycle_ts(), Duration::minutes(15));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp, "2024-03-10 10:00:00");
        assert_eq!(events[0].message, "wifi0 link down");
    }

    #[test]
    fn event_keywords_are_case_insensitive() {
        let text = "\
2024-03-10 10:01:00 en0 Disassociated from AP
2024-03-10 10:02:00 en0 DISCONNECT requested
";
        let events = scrape_events(text, cycle_ts(), Duration::minutes(15));
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].message, "en0 Disassociated from AP");
    }

    #[test]
    fn events_outside_lookback_are_excluded() {
        let text = "\
2024-03-10 09:00:00 en0 link down
2024-03-10 10:01:00 en0 link down
";
        let events = scrape_events(text, cycle_ts(), Duration::minutes(15));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp, "2024-03-10 10:01:00");
    }

    #[test]
    fn non_boundary_lines_are_dropped_silently() {
        let text = "kernel: wifi link down with no timestamp\n";
        assert!(scrape_events(text, cycle_ts(), Duration::minutes(15)).is_empty());
    }

    #[test]
    fn normalize_with_failed_wifi_probe_still_builds_record() {
        let outputs = CycleOutputs {
            wifi: Err(ProbeError::Timeout {
                probe: "wifi-state",
                seconds: 10.0,
            }),
            connectivity: Ok(
                "2% packet loss, round-trip min/avg/max = 10/12/15 ms\n".to_string()
            ),
            event_log: Ok(String::new()),
        };
        let record = normalize(cycle_ts(), &outputs, Duration::minutes(15));
        assert!(record.wifi.is_none());
        let net = record.network.expect("network section");
        assert_eq!(net.packet_loss_percent, Some(2.0));
        assert_eq!(net.avg_latency_ms, Some(12.0));
        assert!(record.disconnect_events.is_empty());
    }

    #[test]
    fn normalize_with_failed_event_log_records_synthetic_entry() {
        let outputs = CycleOutputs {
            wifi: Ok("RSSI: -60\n".to_string()),
            connectivity: Ok("0% packet loss\n".to_string()),
            event_log: Err(ProbeError::NonZeroExit {
                probe: "event-log",
                code: 1,
            }),
        };
        let record = normalize(cycle_ts(), &outputs, Duration::minutes(15));
        assert_eq!(record.disconnect_events.len(), 1);
        assert!(
            record.disconnect_events[0]
                .message
                .starts_with("event log probe failed")
        );
    }
}
