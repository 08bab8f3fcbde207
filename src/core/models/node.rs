//! Worker node model and lifecycle state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a worker node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Launch requested, cloud entity not yet provisioned
    Launching,
    /// Cloud entity up, model server still booting
    Initializing,
    /// Registered with an endpoint, no heartbeat yet
    Ready,
    /// Serving and heartbeating
    Active,
    /// Serving but with a degraded health verdict
    Degraded,
    /// Removed from scheduling, in-flight requests finishing
    Draining,
    /// Retired; row retained for audit
    Terminated,
    /// Launch or health failure; row retained for audit
    Failed,
}

impl NodeStatus {
    /// Terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated | Self::Failed)
    }

    /// Only these states are eligible for scheduling
    pub fn is_schedulable(&self) -> bool {
        matches!(self, Self::Active | Self::Ready)
    }

    /// States that count as observed replicas during reconciliation
    pub fn counts_toward_capacity(&self) -> bool {
        matches!(
            self,
            Self::Launching | Self::Initializing | Self::Ready | Self::Active | Self::Degraded
        )
    }

    /// States in which a node may hold an endpoint URL
    pub fn may_have_endpoint(&self) -> bool {
        matches!(
            self,
            Self::Ready | Self::Active | Self::Degraded | Self::Draining
        )
    }

    /// Whether `self -> next` is a legal lifecycle transition
    pub fn can_transition_to(&self, next: NodeStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if *self == next {
            return true;
        }
        match (self, next) {
            (Self::Launching, Self::Initializing)
            | (Self::Launching, Self::Ready)
            | (Self::Initializing, Self::Ready)
            | (Self::Ready, Self::Active)
            | (Self::Ready, Self::Degraded)
            | (Self::Active, Self::Degraded)
            | (Self::Degraded, Self::Active)
            | (Self::Ready, Self::Draining)
            | (Self::Active, Self::Draining)
            | (Self::Degraded, Self::Draining) => true,
            // Every non-terminal state may fail or be terminated.
            (_, Self::Failed) | (_, Self::Terminated) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Launching => "launching",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Active => "active",
            Self::Degraded => "degraded",
            Self::Draining => "draining",
            Self::Terminated => "terminated",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for NodeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "launching" => Ok(Self::Launching),
            "initializing" => Ok(Self::Initializing),
            "ready" => Ok(Self::Ready),
            "active" => Ok(Self::Active),
            "degraded" => Ok(Self::Degraded),
            "draining" => Ok(Self::Draining),
            "terminated" => Ok(Self::Terminated),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown node status: {}", other)),
        }
    }
}

/// A running inference worker bound to exactly one deployment
///
/// The ID is assigned at launch-request time and doubles as the worker's
/// registration identity; it survives cloud entity renames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Stable node ID, assigned before launch
    pub id: Uuid,
    /// External cloud entity handle (one node per cluster)
    pub cluster_name: String,
    /// Owning deployment
    pub deployment_id: Uuid,
    /// Cloud provider tag
    pub provider: String,
    /// Cloud region
    pub region: String,
    /// Accelerator class (e.g. `A100-80GB`)
    pub gpu_type: String,
    /// Cloud instance class
    pub instance_type: String,
    /// Whether this is a preemptible instance
    pub spot_instance: bool,
    /// Model served by this worker
    pub model_name: String,
    /// Reachable endpoint, present only after registration
    pub endpoint_url: Option<String>,
    /// Current lifecycle status
    pub status: NodeStatus,
    /// Last push heartbeat
    pub last_heartbeat: Option<DateTime<Utc>>,
    /// Health score in [0, 100], written by the health monitor
    pub health_score: u8,
    /// Free-form status line
    pub status_message: Option<String>,
    /// Launch request time
    pub launched_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
}

impl Node {
    /// Create a node record in state `launching`
    pub fn launching(
        id: Uuid,
        cluster_name: impl Into<String>,
        deployment_id: Uuid,
        provider: impl Into<String>,
        region: impl Into<String>,
        gpu_type: impl Into<String>,
        instance_type: impl Into<String>,
        spot_instance: bool,
        model_name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            cluster_name: cluster_name.into(),
            deployment_id,
            provider: provider.into(),
            region: region.into(),
            gpu_type: gpu_type.into(),
            instance_type: instance_type.into(),
            spot_instance,
            model_name: model_name.into(),
            endpoint_url: None,
            status: NodeStatus::Launching,
            last_heartbeat: None,
            health_score: 0,
            status_message: None,
            launched_at: now,
            updated_at: now,
        }
    }

    /// Whether the heartbeat is fresh given a staleness window
    pub fn heartbeat_fresh(&self, staleness: chrono::Duration, now: DateTime<Utc>) -> bool {
        self.last_heartbeat
            .map(|hb| now - hb <= staleness)
            .unwrap_or(false)
    }
}
