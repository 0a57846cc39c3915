//! Diagnostic record data model.
//!
//! One [`DiagnosticRecord`] is produced per collection cycle and never
//! mutated after it lands in the store. Each probe contributes an optional
//! section: a probe failure leaves its whole section `None`, while a probe
//! that ran but yielded nothing parseable contributes a section whose fields
//! are all null. Either way the record itself is always created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timestamp::stamp_serde;

/// One collection cycle's normalized diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticRecord {
    /// Cycle instant, UTC, unique per record within one daemon run.
    #[serde(with = "stamp_serde")]
    pub timestamp: DateTime<Utc>,
    /// WiFi link state, absent when the wifi-state probe failed.
    pub wifi: Option<WifiSample>,
    /// Connectivity stats, absent when the ping probe failed.
    pub network: Option<NetworkSample>,
    /// Disconnect-type events scraped from the system log, oldest first.
    /// A failed event-log probe yields a single synthetic error entry.
    pub disconnect_events: Vec<DisconnectEvent>,
}

/// Fields extracted from the wifi-state probe. Every field degrades to null
/// independently of its siblings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WifiSample {
    pub ssid: Option<String>,
    /// Signal strength in dBm (more negative = weaker).
    pub rssi: Option<i64>,
    /// Noise floor in dBm.
    pub noise: Option<i64>,
    pub channel: Option<String>,
    /// Transmit rate in Mbps.
    pub tx_rate: Option<f64>,
}

/// Fields extracted from the connectivity probe.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSample {
    /// 0–100.
    pub packet_loss_percent: Option<f64>,
    pub avg_latency_ms: Option<f64>,
}

/// One disconnect-type line from the system log, split into its leading
/// timestamp token and trailing message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectEvent {
    /// The log line's own timestamp text, as written by the logger.
    pub timestamp: String,
    pub message: String,
}

impl DisconnectEvent {
    /// Synthetic entry recorded when the event-log probe itself failed.
    pub fn probe_failure(cycle_ts: DateTime<Utc>, detail: &str) -> Self {
        Self {
            timestamp: crate::timestamp::encode(cycle_ts),
            message: format!("event log probe failed: {detail}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn record_json_shape() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 10, 10, 0, 0).unwrap();
        let record = DiagnosticRecord {
            timestamp: ts,
            wifi: Some(WifiSample {
                ssid: Some("HomeNet".to_string()),
                rssi: Some(-55),
                noise: Some(-92),
                channel: Some("36".to_string()),
                tx_rate: Some(866.0),
            }),
            network: Some(NetworkSample {
                packet_loss_percent: Some(2.0),
                avg_latency_ms: Some(12.0),
            }),
            disconnect_events: vec![],
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["timestamp"], "20240310T100000.000Z");
        assert_eq!(json["wifi"]["rssi"], -55);
        assert_eq!(json["network"]["packetLossPercent"], 2.0);
        assert_eq!(json["network"]["avgLatencyMs"], 12.0);
        assert_eq!(json["disconnectEvents"].as_array().unwrap().len(), 0);

        let back: DiagnosticRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn failed_probe_sections_serialize_as_null() {
        let record = DiagnosticRecord {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 10, 10, 0, 0).unwrap(),
            wifi: None,
            network: None,
            disconnect_events: vec![DisconnectEvent::probe_failure(
                Utc.with_ymd_and_hms(2024, 3, 10, 10, 0, 0).unwrap(),
                "timed out",
            )],
        };
        let json = serde_json::to_value(&record).unwrap();
        assert!(json["wifi"].is_null());
        assert!(json["network"].is_null());
        assert!(
            json["disconnectEvents"][0]["message"]
                .as_str()
                .unwrap()
                .contains("timed out")
        );
    }
}
