//! URL reachability configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct UrlCheckConfig {
    /// Whether Tier 1 probes URLs at all. Default: true.
    pub enabled: Option<bool>,
    /// Per-request timeout in milliseconds. Default: 5000.
    pub timeout_ms: Option<u64>,
    /// Maximum probes per domain per scan. Default: 5.
    pub max_per_domain: Option<usize>,
}

impl UrlCheckConfig {
    pub fn effective_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn effective_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(5000))
    }

    pub fn effective_max_per_domain(&self) -> usize {
        self.max_per_domain.unwrap_or(5)
    }
}
