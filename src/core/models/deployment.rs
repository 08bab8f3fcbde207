//! Deployment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Deployment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    /// Reconciled every sweep
    Active,
    /// Ignored by the reconciler
    Paused,
}

/// Replica placement strategy across the region's zones
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementStrategy {
    /// Spread replicas across zones
    #[default]
    Spread,
    /// Pack replicas into as few zones as possible
    Packed,
}

impl PlacementStrategy {
    /// Stable wire/store spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spread => "spread",
            Self::Packed => "packed",
        }
    }
}

/// Declarative specification of a worker population
///
/// "N replicas of model M in region R on provider P using accelerator G."
/// Mutated by admins, consumed by the reconciler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    /// Deployment ID
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Model served by every replica
    pub model_name: String,
    /// Cloud provider
    pub provider: String,
    /// Cloud region
    pub region: String,
    /// Accelerator class
    pub gpu_type: String,
    /// Cloud instance class
    pub instance_type: String,
    /// Whether replicas launch as spot instances
    pub use_spot: bool,
    /// Replica floor guaranteed by reconciliation
    pub min_replicas: u32,
    /// Replica ceiling
    pub max_replicas: u32,
    /// Last observed replica count
    pub current_replicas: u32,
    /// Replica placement strategy
    pub strategy: PlacementStrategy,
    /// Deployment status
    pub status: DeploymentStatus,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
}

impl Deployment {
    /// Replica count the reconciler converges toward
    ///
    /// Scale-up on load is an autoscaler extension; the core guarantees the
    /// minimum only. A future autoscaler replaces this computation.
    pub fn desired_replicas(&self) -> u32 {
        self.min_replicas.min(self.max_replicas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment(min: u32, max: u32) -> Deployment {
        Deployment {
            id: Uuid::new_v4(),
            name: "llama-east".to_string(),
            model_name: "llama-3-8b".to_string(),
            provider: "aws".to_string(),
            region: "us-east-1".to_string(),
            gpu_type: "A100-80GB".to_string(),
            instance_type: "p4d.24xlarge".to_string(),
            use_spot: true,
            min_replicas: min,
            max_replicas: max,
            current_replicas: 0,
            strategy: PlacementStrategy::Spread,
            status: DeploymentStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn desired_is_clamped_by_max() {
        assert_eq!(deployment(3, 10).desired_replicas(), 3);
        assert_eq!(deployment(5, 2).desired_replicas(), 2);
        assert_eq!(deployment(0, 4).desired_replicas(), 0);
    }
}
