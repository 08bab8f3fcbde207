//! Scheduler configuration

use serde::{Deserialize, Serialize};

/// Worker scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Selection strategy across eligible workers
    #[serde(default)]
    pub strategy: SchedulingStrategy,
    /// Minimum health score required for normal scheduling
    #[serde(default = "default_health_threshold")]
    pub health_threshold: u8,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            strategy: SchedulingStrategy::default(),
            health_threshold: default_health_threshold(),
        }
    }
}

impl SchedulerConfig {
    /// Validate scheduler configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.health_threshold > 100 {
            return Err("scheduler.health_threshold must be within [0, 100]".to_string());
        }
        Ok(())
    }
}

/// Selection strategy for eligible workers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingStrategy {
    /// Fewest in-flight requests first
    #[default]
    LeastLoaded,
    /// Per-model rotating index
    RoundRobin,
    /// Probability inversely proportional to observed latency
    WeightedLatency,
    /// Uniform random
    Random,
}

fn default_health_threshold() -> u8 {
    50
}
