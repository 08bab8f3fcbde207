//! Deployment reconciler configuration

use serde::{Deserialize, Serialize};

/// Deployment reconciliation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Per-deployment sweep period in seconds
    #[serde(default = "default_interval")]
    pub interval: u64,
    /// Stagger between sequential launch requests in seconds
    #[serde(default = "default_launch_stagger")]
    pub launch_stagger: u64,
    /// Surplus replicas tolerated before scale-down
    #[serde(default)]
    pub scale_down_slack: u32,
    /// Seconds an advisory reconciliation lock is held before expiry
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            launch_stagger: default_launch_stagger(),
            scale_down_slack: 0,
            lock_ttl: default_lock_ttl(),
        }
    }
}

impl ReconcilerConfig {
    /// Validate reconciler configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.interval == 0 {
            return Err("reconciler.interval cannot be 0".to_string());
        }
        if self.launch_stagger > 5 {
            return Err("reconciler.launch_stagger must be at most 5 seconds".to_string());
        }
        Ok(())
    }
}

fn default_interval() -> u64 {
    30
}

fn default_launch_stagger() -> u64 {
    2
}

fn default_lock_ttl() -> u64 {
    120
}
