//! Monitor configuration.
//!
//! Defaults match the original deployment: collect every 15 minutes, retain
//! a week of live records, scan the last 15 minutes of system log per cycle.
//! An optional JSON config file overrides the defaults; CLI flags override
//! both (the CLI applies its overrides after [`Config::load`]).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Everything the collection pipeline needs to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Directory holding live record documents.
    pub data_dir: PathBuf,
    /// Directory holding dated archive bundles.
    pub archive_dir: PathBuf,
    /// Seconds between collection cycles.
    pub interval_secs: u64,
    /// Age in days past which a record is retired into a bundle.
    pub retention_days: u32,
    /// Per-probe timeout in seconds.
    pub probe_timeout_secs: u64,
    /// Trailing minutes of system log scanned for disconnect events.
    pub lookback_minutes: u32,
    /// Host pinged by the connectivity probe.
    pub ping_host: String,
    /// Packets sent per connectivity probe.
    pub ping_count: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            archive_dir: PathBuf::from("archive"),
            interval_secs: 900,
            retention_days: 7,
            probe_timeout_secs: 10,
            lookback_minutes: 15,
            ping_host: "1.1.1.1".to_string(),
            ping_count: 5,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> io::Result<Self> {
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Load from `path` if given, otherwise from `linkwatch.json` in the
    /// current directory if present, otherwise defaults.
    pub fn load_or_default(path: Option<&Path>) -> io::Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default_path = Path::new("linkwatch.json");
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }

    pub fn probe_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn lookback(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.lookback_minutes))
    }

    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs)
    }

    /// Liveness marker path, anchored beside the data directory so every
    /// invocation pointed at the same data resolves the same marker,
    /// whatever directory it happens to run from.
    pub fn marker_path(&self) -> PathBuf {
        self.data_dir
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .join("linkwatch.pid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment() {
        let cfg = Config::default();
        assert_eq!(cfg.interval_secs, 900);
        assert_eq!(cfg.retention_days, 7);
        assert_eq!(cfg.lookback_minutes, 15);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("linkwatch.json");
        std::fs::write(&path, r#"{"intervalSecs": 60, "retentionDays": 3}"#).unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.interval_secs, 60);
        assert_eq!(cfg.retention_days, 3);
        assert_eq!(cfg.ping_host, "1.1.1.1");
    }

    #[test]
    fn marker_sits_beside_the_data_dir() {
        let mut cfg = Config::default();
        cfg.data_dir = PathBuf::from("/var/lib/linkwatch/data");
        assert_eq!(
            cfg.marker_path(),
            PathBuf::from("/var/lib/linkwatch/linkwatch.pid")
        );

        // The relative default stays relative.
        cfg.data_dir = PathBuf::from("data");
        assert_eq!(cfg.marker_path(), PathBuf::from("./linkwatch.pid"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("linkwatch.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
