//! Health monitor configuration

use serde::{Deserialize, Serialize};

/// Three-signal health monitoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Seconds after which the push heartbeat counts as stale
    #[serde(default = "default_heartbeat_staleness")]
    pub heartbeat_staleness: u64,
    /// Interval between active health polls in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    /// Timeout for a single active poll in seconds
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: u64,
    /// Interval between cloud inventory queries in seconds
    #[serde(default = "default_cloud_poll_interval")]
    pub cloud_poll_interval: u64,
    /// Consecutive confirmations required before acting on a negative signal
    #[serde(default = "default_confirmations")]
    pub confirmations: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            heartbeat_staleness: default_heartbeat_staleness(),
            poll_interval: default_poll_interval(),
            probe_timeout: default_probe_timeout(),
            cloud_poll_interval: default_cloud_poll_interval(),
            confirmations: default_confirmations(),
        }
    }
}

impl MonitorConfig {
    /// Validate monitor configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval == 0 || self.cloud_poll_interval == 0 {
            return Err("monitor poll intervals cannot be 0".to_string());
        }
        if self.confirmations == 0 {
            return Err("monitor.confirmations cannot be 0".to_string());
        }
        Ok(())
    }
}

fn default_heartbeat_staleness() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    30
}

fn default_probe_timeout() -> u64 {
    5
}

fn default_cloud_poll_interval() -> u64 {
    60
}

fn default_confirmations() -> u32 {
    2
}
