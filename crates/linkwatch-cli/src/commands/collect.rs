//! `linkwatch collect` — run one collection cycle now.

use chrono::Utc;
use linkwatch_core::Monitor;

use super::{EXIT_DEGRADED, EXIT_FATAL, EXIT_OK, GlobalOpts, load_config};

pub fn run(opts: &GlobalOpts) -> i32 {
    let config = match load_config(opts) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            return EXIT_FATAL;
        }
    };

    let mut monitor = Monitor::new(config);
    let report = match monitor.run_cycle(Utc::now()) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {e}");
            return EXIT_FATAL;
        }
    };

    for failure in &report.probe_failures {
        eprintln!("Warning: {failure}");
    }
    match &report.stored {
        Some(path) => println!(
            "Collected diagnostics at {} -> {}",
            linkwatch_core::timestamp::encode(report.timestamp),
            path.display()
        ),
        None => eprintln!("Warning: record write skipped this cycle"),
    }
    if report.archived > 0 {
        println!("Archived {} aged record(s)", report.archived);
    }

    if report.degraded() {
        EXIT_DEGRADED
    } else {
        EXIT_OK
    }
}
