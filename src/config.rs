use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_COMPACT_THRESHOLD: u64 = 1_000;

/// Runtime settings, read from `FLEETBOOK_*` environment variables.
/// Unset or unparsable values fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding `reservations.wal`.
    pub data_dir: PathBuf,
    /// How long `reserve` waits for a busy resource before giving up.
    pub lock_timeout: Duration,
    /// WAL appends since the last compaction that trigger a new one.
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
            compact_threshold: DEFAULT_COMPACT_THRESHOLD,
            metrics_port: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = lookup("FLEETBOOK_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let lock_timeout_ms: u64 = lookup("FLEETBOOK_LOCK_TIMEOUT_MS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_LOCK_TIMEOUT_MS);
        let compact_threshold: u64 = lookup("FLEETBOOK_COMPACT_THRESHOLD")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_COMPACT_THRESHOLD);
        let metrics_port: Option<u16> = lookup("FLEETBOOK_METRICS_PORT").and_then(|s| s.parse().ok());

        Self {
            data_dir,
            lock_timeout: Duration::from_millis(lock_timeout_ms),
            compact_threshold,
            metrics_port,
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("reservations.wal")
    }
}
