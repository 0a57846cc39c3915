//! Integration tests for linkwatch-core.
//!
//! These tests drive the full pipeline with canned probes:
//! probe → normalize → store → sweep → range read.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use linkwatch_core::probe::{Probe, ProbeInfo, ProbeKind, ProbeSet};
use linkwatch_core::{Config, Monitor, ProbeError, RangeQuery};

static WIFI_INFO: ProbeInfo = ProbeInfo {
    name: "wifi-state",
    kind: ProbeKind::WifiState,
    description: "canned",
};
static PING_INFO: ProbeInfo = ProbeInfo {
    name: "connectivity",
    kind: ProbeKind::Connectivity,
    description: "canned",
};
static LOG_INFO: ProbeInfo = ProbeInfo {
    name: "event-log",
    kind: ProbeKind::EventLog,
    description: "canned",
};

struct Canned {
    info: &'static ProbeInfo,
    output: Option<String>,
    runs: Arc<AtomicUsize>,
}

impl Canned {
    fn ok(info: &'static ProbeInfo, text: &str) -> (Box<dyn Probe>, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        (
            Box::new(Self {
                info,
                output: Some(text.to_string()),
                runs: runs.clone(),
            }),
            runs,
        )
    }

    fn failing(info: &'static ProbeInfo) -> (Box<dyn Probe>, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        (
            Box::new(Self {
                info,
                output: None,
                runs: runs.clone(),
            }),
            runs,
        )
    }
}

impl Probe for Canned {
    fn info(&self) -> &'static ProbeInfo {
        self.info
    }

    fn run(&self, _timeout: Duration) -> Result<String, ProbeError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        match &self.output {
            Some(text) => Ok(text.clone()),
            None => Err(ProbeError::Timeout {
                probe: self.info.name,
                seconds: 10.0,
            }),
        }
    }
}

fn test_config(tmp: &tempfile::TempDir) -> Config {
    Config {
        data_dir: tmp.path().join("data"),
        archive_dir: tmp.path().join("archive"),
        ..Config::default()
    }
}

#[test]
fn full_cycle_stores_a_normalized_record() {
    let tmp = tempfile::tempdir().unwrap();
    let (wifi, _) = Canned::ok(&WIFI_INFO, "agrCtlRSSI: -55\nagrCtlSSID: HomeNet\n");
    let (ping, _) = Canned::ok(
        &PING_INFO,
        "2% packet loss, round-trip min/avg/max = 10/12/15 ms\n",
    );
    let (log, _) = Canned::ok(&LOG_INFO, "");

    let mut monitor = Monitor::with_probes(
        test_config(&tmp),
        ProbeSet {
            wifi,
            connectivity: ping,
            event_log: log,
        },
    );
    let now = Utc.with_ymd_and_hms(2024, 3, 10, 10, 0, 0).unwrap();
    let report = monitor.run_cycle(now).unwrap();
    assert!(!report.degraded());

    let record = linkwatch_core::store::load(&report.stored.unwrap()).unwrap();
    assert_eq!(record.timestamp, now);
    assert_eq!(record.wifi.unwrap().rssi, Some(-55));
    let net = record.network.unwrap();
    assert_eq!(net.packet_loss_percent, Some(2.0));
    assert_eq!(net.avg_latency_ms, Some(12.0));
}

#[test]
fn one_probe_failure_never_blocks_the_others() {
    let tmp = tempfile::tempdir().unwrap();
    let (wifi, wifi_runs) = Canned::failing(&WIFI_INFO);
    let (ping, ping_runs) = Canned::ok(&PING_INFO, "0% packet loss\n");
    let (log, log_runs) = Canned::ok(&LOG_INFO, "");

    let mut monitor = Monitor::with_probes(
        test_config(&tmp),
        ProbeSet {
            wifi,
            connectivity: ping,
            event_log: log,
        },
    );
    let report = monitor
        .run_cycle(Utc.with_ymd_and_hms(2024, 3, 10, 10, 0, 0).unwrap())
        .unwrap();

    // All probes ran despite the wifi failure, the record still landed.
    assert_eq!(wifi_runs.load(Ordering::SeqCst), 1);
    assert_eq!(ping_runs.load(Ordering::SeqCst), 1);
    assert_eq!(log_runs.load(Ordering::SeqCst), 1);
    assert!(report.degraded());
    assert_eq!(report.probe_failures.len(), 1);

    let record = linkwatch_core::store::load(&report.stored.unwrap()).unwrap();
    assert!(record.wifi.is_none());
    assert_eq!(
        record.network.unwrap().packet_loss_percent,
        Some(0.0)
    );
}

#[test]
fn stamps_stay_strictly_increasing_across_a_stalled_clock() {
    let tmp = tempfile::tempdir().unwrap();
    let (wifi, _) = Canned::ok(&WIFI_INFO, "");
    let (ping, _) = Canned::ok(&PING_INFO, "");
    let (log, _) = Canned::ok(&LOG_INFO, "");

    let mut monitor = Monitor::with_probes(
        test_config(&tmp),
        ProbeSet {
            wifi,
            connectivity: ping,
            event_log: log,
        },
    );
    let now = Utc.with_ymd_and_hms(2024, 3, 10, 10, 0, 0).unwrap();
    let a = monitor.run_cycle(now).unwrap().timestamp;
    let b = monitor.run_cycle(now).unwrap().timestamp;
    let c = monitor.run_cycle(now).unwrap().timestamp;
    assert!(a < b && b < c);
}

#[test]
fn aged_records_flow_into_bundles_and_back_out_of_range_reads() {
    let tmp = tempfile::tempdir().unwrap();
    let (wifi, _) = Canned::ok(&WIFI_INFO, "RSSI: -60\n");
    let (ping, _) = Canned::ok(&PING_INFO, "0% packet loss\n");
    let (log, _) = Canned::ok(&LOG_INFO, "");

    let mut monitor = Monitor::with_probes(
        test_config(&tmp),
        ProbeSet {
            wifi,
            connectivity: ping,
            event_log: log,
        },
    );

    // Two old cycles, then one recent cycle whose sweep retires them.
    for day in [1, 2] {
        monitor
            .run_cycle(Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap())
            .unwrap();
    }
    let report = monitor
        .run_cycle(Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap())
        .unwrap();
    assert_eq!(report.archived, 2);

    // The range read spans store and bundle, in chronological order.
    let stamps: Vec<_> = RangeQuery::new(monitor.store(), monitor.archiver(), None, None)
        .unwrap()
        .map(|r| r.unwrap().timestamp)
        .collect();
    assert_eq!(stamps.len(), 3);
    assert!(stamps.windows(2).all(|w| w[0] < w[1]));

    // Live store holds exactly the one young record.
    assert_eq!(monitor.store().entries(None, None).unwrap().len(), 1);
}
