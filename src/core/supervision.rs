//! Background-loop supervision
//!
//! Each supervised loop owns a `LoopHealth`; one failure does not stop
//! siblings, but three consecutive failures of the same operation degrade
//! the self-health reported on `/ready`.

use std::sync::atomic::{AtomicU32, Ordering};

/// Consecutive failures after which a loop reports itself degraded
const DEGRADED_AFTER: u32 = 3;

/// Self-health of one supervised background loop
#[derive(Debug, Default)]
pub struct LoopHealth {
    consecutive_failures: AtomicU32,
}

impl LoopHealth {
    /// Create a healthy loop
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful iteration
    pub fn record_ok(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    /// Record a failed iteration
    pub fn record_err(&self) {
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Whether the loop is within its failure tolerance
    pub fn is_healthy(&self) -> bool {
        self.consecutive_failures.load(Ordering::Relaxed) < DEGRADED_AFTER
    }

    /// Consecutive failure count, surfaced in readiness payloads
    pub fn failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Snapshot for the readiness payload
    pub fn snapshot(&self) -> LoopHealthSnapshot {
        LoopHealthSnapshot {
            healthy: self.is_healthy(),
            consecutive_failures: self.failures(),
        }
    }
}

/// Point-in-time view of one supervised loop
#[derive(Debug, Clone, serde::Serialize)]
pub struct LoopHealthSnapshot {
    /// Within failure tolerance
    pub healthy: bool,
    /// Consecutive failures so far
    pub consecutive_failures: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_consecutive_failures_degrade() {
        let health = LoopHealth::new();
        assert!(health.is_healthy());
        health.record_err();
        health.record_err();
        assert!(health.is_healthy());
        health.record_err();
        assert!(!health.is_healthy());
        health.record_ok();
        assert!(health.is_healthy());
    }
}
