//! `linkwatch list` — the read side, for plotting and publishing consumers.

use chrono::{DateTime, NaiveDate, Utc};
use linkwatch_core::{Archiver, RangeQuery, RecordStore, timestamp};

use super::{EXIT_FATAL, EXIT_OK, GlobalOpts, load_config};

pub fn run(
    opts: &GlobalOpts,
    since: Option<String>,
    until: Option<String>,
    json: bool,
) -> i32 {
    let config = match load_config(opts) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            return EXIT_FATAL;
        }
    };

    let since = match since.as_deref().map(parse_when).transpose() {
        Ok(v) => v,
        Err(bad) => {
            eprintln!("Error: unrecognized --since value `{bad}`");
            return EXIT_FATAL;
        }
    };
    let until = match until.as_deref().map(parse_when).transpose() {
        Ok(v) => v,
        Err(bad) => {
            eprintln!("Error: unrecognized --until value `{bad}`");
            return EXIT_FATAL;
        }
    };

    let store = RecordStore::new(&config.data_dir);
    let archiver = Archiver::new(&config.archive_dir);
    let query = match RangeQuery::new(&store, &archiver, since, until) {
        Ok(q) => q,
        Err(e) => {
            eprintln!("Error: {e}");
            return EXIT_FATAL;
        }
    };

    for result in query {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                eprintln!("Error: {e}");
                return EXIT_FATAL;
            }
        };
        if json {
            match serde_json::to_string(&record) {
                Ok(line) => println!("{line}"),
                Err(e) => {
                    eprintln!("Error: {e}");
                    return EXIT_FATAL;
                }
            }
        } else {
            println!("{}", summary_line(&record));
        }
    }
    EXIT_OK
}

/// Accept a canonical stamp or a bare `YYYY-MM-DD` (read as UTC midnight).
fn parse_when(s: &str) -> Result<DateTime<Utc>, String> {
    if let Some(ts) = timestamp::decode(s) {
        return Ok(ts);
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    Err(s.to_string())
}

fn summary_line(record: &linkwatch_core::DiagnosticRecord) -> String {
    let rssi = record
        .wifi
        .as_ref()
        .and_then(|w| w.rssi)
        .map_or_else(|| "-".to_string(), |v| format!("{v} dBm"));
    let loss = record
        .network
        .as_ref()
        .and_then(|n| n.packet_loss_percent)
        .map_or_else(|| "-".to_string(), |v| format!("{v}%"));
    let latency = record
        .network
        .as_ref()
        .and_then(|n| n.avg_latency_ms)
        .map_or_else(|| "-".to_string(), |v| format!("{v} ms"));
    format!(
        "{}  rssi {:>8}  loss {:>6}  avg {:>8}  events {}",
        timestamp::encode(record.timestamp),
        rssi,
        loss,
        latency,
        record.disconnect_events.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parse_when_accepts_both_forms() {
        assert_eq!(
            parse_when("2024-03-10").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_when("20240310T100000.000Z").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 10, 10, 0, 0).unwrap()
        );
        assert!(parse_when("last tuesday").is_err());
    }
}
