//! Three-signal health verdict
//!
//! A pure function from the signal triple to a verdict, so the same inputs
//! always produce the same classification.

/// The three independent signals for one node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalTriple {
    /// S1: push heartbeat received within the staleness window
    pub heartbeat_fresh: bool,
    /// S2: active `/health` poll answered 2xx (after confirmation debounce)
    pub probe_healthy: bool,
    /// S3: cloud inventory still lists the cluster (after debounce)
    pub cloud_present: bool,
}

/// Action the monitor takes on a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictAction {
    /// All signals good
    Maintain,
    /// Keep serving but raise operator attention
    Alert,
    /// Keep serving, re-evaluate next cycle
    Watch,
    /// Remove from scheduling, launch a replacement, terminate
    DrainReplace,
    /// The worker is gone: mark failed and replace
    FailReplace,
}

/// Derived classification of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthVerdict {
    /// Health score written back to the node
    pub score: u8,
    /// Monitor action
    pub action: VerdictAction,
    /// Stable label for the node's status message
    pub label: &'static str,
}

/// Evaluate the verdict table for a non-terminal node
pub fn evaluate(signals: SignalTriple) -> HealthVerdict {
    use VerdictAction::*;
    match (
        signals.heartbeat_fresh,
        signals.probe_healthy,
        signals.cloud_present,
    ) {
        (true, true, true) => HealthVerdict {
            score: 100,
            action: Maintain,
            label: "healthy",
        },
        (true, true, false) => HealthVerdict {
            score: 60,
            action: Alert,
            label: "degraded: cloud inventory missing",
        },
        (true, false, true) => HealthVerdict {
            score: 50,
            action: Watch,
            label: "degraded: health probe failing",
        },
        (true, false, false) => HealthVerdict {
            score: 20,
            action: DrainReplace,
            label: "dying: probe failing and cloud inventory missing",
        },
        (false, true, true) => HealthVerdict {
            score: 70,
            action: Watch,
            label: "degraded: heartbeat stale",
        },
        (false, false, true) => HealthVerdict {
            score: 30,
            action: DrainReplace,
            label: "dying: heartbeat stale and probe failing",
        },
        (false, _, false) => HealthVerdict {
            score: 0,
            action: FailReplace,
            label: "dead: heartbeat stale and cloud inventory missing",
        },
    }
}
