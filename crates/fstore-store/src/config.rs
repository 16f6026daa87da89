use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Storage engine settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory; each namespace gets a subdirectory.
    pub path: PathBuf,
    /// Keep everything in temporary engine files that vanish on close.
    pub diskless: bool,
    /// Page cache size per namespace, in MiB.
    pub cache_size_mb: u64,
    /// Seconds between background space-reclamation ticks.
    pub maintenance_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("database"),
            diskless: false,
            cache_size_mb: 100,
            maintenance_interval_secs: 300,
        }
    }
}

impl StoreConfig {
    pub fn cache_capacity_bytes(&self) -> u64 {
        self.cache_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs.max(1))
    }
}
