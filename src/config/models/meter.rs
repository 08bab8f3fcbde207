//! Usage meter configuration

use serde::{Deserialize, Serialize};

/// Usage metering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeterConfig {
    /// Interval between buffer flushes in seconds
    #[serde(default = "default_drain_interval")]
    pub drain_interval: u64,
    /// Rolling window recomputed by the hourly aggregator, in hours
    #[serde(default = "default_rollup_window_hours")]
    pub rollup_window_hours: u64,
    /// Cost in micro-dollars per million prompt tokens
    #[serde(default = "default_prompt_micros")]
    pub prompt_micros_per_million: u64,
    /// Cost in micro-dollars per million completion tokens
    #[serde(default = "default_completion_micros")]
    pub completion_micros_per_million: u64,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            drain_interval: default_drain_interval(),
            rollup_window_hours: default_rollup_window_hours(),
            prompt_micros_per_million: default_prompt_micros(),
            completion_micros_per_million: default_completion_micros(),
        }
    }
}

impl MeterConfig {
    /// Validate meter configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.drain_interval == 0 || self.drain_interval > 60 {
            return Err("meter.drain_interval must be within [1, 60] seconds".to_string());
        }
        Ok(())
    }
}

fn default_drain_interval() -> u64 {
    30
}

fn default_rollup_window_hours() -> u64 {
    48
}

fn default_prompt_micros() -> u64 {
    500_000
}

fn default_completion_micros() -> u64 {
    1_500_000
}
