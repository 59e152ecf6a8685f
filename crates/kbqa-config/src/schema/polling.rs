use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Document-ingestion polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Seconds between document-status fetches (valid range: 1-3600).
    pub interval_secs: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_secs: 3 }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.interval_secs))
    }
}
