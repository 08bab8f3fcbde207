//! Retirement handler
//!
//! Drains a node out of scheduling, requests a replacement launch, waits a
//! bounded window for in-flight requests to finish, then tears the cloud
//! entity down. Rows are retained for audit.

use crate::core::models::{NodeStatus, PlacementStrategy};
use crate::core::orchestrator::{NodeConfig, WorkerOrchestrator};
use crate::core::registry::NodeRegistry;
use crate::storage::database::Database;
use crate::utils::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Default provider grace period when a spot warning carries no ETA
const DEFAULT_SPOT_ETA_SECS: u64 = 120;

/// Upper bound on the drain wait regardless of ETA
const MAX_DRAIN_SECS: u64 = 60;

/// Safety margin subtracted from a spot ETA before terminating
const ETA_MARGIN_SECS: u64 = 30;

/// Why a node is being retired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetirementReason {
    /// Provider announced preemption; ETA in seconds when known
    SpotWarning {
        /// Seconds until the provider reclaims the instance
        eta_secs: Option<u64>,
    },
    /// Health monitor verdict: drain and replace
    Dying,
    /// Health monitor verdict: already gone, mark failed and replace
    Dead,
    /// Deployment controller scale-down
    ScaleDown,
}

impl RetirementReason {
    /// Drain budget for this reason
    fn drain_budget(&self) -> Duration {
        match self {
            Self::SpotWarning { eta_secs } => {
                let eta = eta_secs.unwrap_or(DEFAULT_SPOT_ETA_SECS);
                Duration::from_secs(eta.saturating_sub(ETA_MARGIN_SECS).min(MAX_DRAIN_SECS))
            }
            Self::Dying | Self::ScaleDown => Duration::from_secs(MAX_DRAIN_SECS),
            Self::Dead => Duration::ZERO,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::SpotWarning { .. } => "spot termination warning",
            Self::Dying => "health verdict: dying",
            Self::Dead => "health verdict: dead",
            Self::ScaleDown => "deployment scale-down",
        }
    }
}

/// Retirement handler
pub struct RetirementHandler {
    registry: Arc<NodeRegistry>,
    orchestrator: Arc<WorkerOrchestrator>,
    db: Arc<Database>,
}

impl RetirementHandler {
    /// Create a retirement handler
    pub fn new(
        registry: Arc<NodeRegistry>,
        orchestrator: Arc<WorkerOrchestrator>,
        db: Arc<Database>,
    ) -> Self {
        Self {
            registry,
            orchestrator,
            db,
        }
    }

    /// Retire a node: drain, replace, terminate
    ///
    /// Idempotent per node: a node already draining or terminal is left to
    /// the retirement already in progress.
    pub async fn retire(
        &self,
        node_id: Uuid,
        reason: RetirementReason,
        launch_replacement: bool,
    ) -> Result<()> {
        let Some(node) = self.registry.snapshot(node_id) else {
            // Not in the index: either terminal already or unknown.
            return Ok(());
        };
        if node.status == NodeStatus::Draining || node.status.is_terminal() {
            return Ok(());
        }

        info!(node = %node_id, reason = reason.label(), "retiring node");

        if reason == RetirementReason::Dead {
            // The worker is gone; there is nothing to drain.
            let _ = self
                .registry
                .update_status(node_id, NodeStatus::Failed, Some(reason.label().to_string()))
                .await;
        } else {
            // Step 1: out of scheduling, in-flight requests keep going.
            self.registry
                .update_status(node_id, NodeStatus::Draining, Some(reason.label().to_string()))
                .await?;
        }

        // Step 2: replacement launch with the deployment's own shape.
        if launch_replacement {
            if let Err(e) = self.launch_replacement(&node).await {
                warn!(node = %node_id, "replacement launch failed: {}", e);
            }
        }

        // Step 3: bounded drain wait, truncated by a spot ETA.
        let budget = reason.drain_budget();
        if !budget.is_zero() {
            self.await_drain(node_id, budget).await;
        }

        // Step 4: tear down the cloud entity, then close out the row.
        self.orchestrator.cloud().down(&node.cluster_name).await;

        if reason != RetirementReason::Dead {
            let _ = self
                .registry
                .update_status(node_id, NodeStatus::Terminated, Some(reason.label().to_string()))
                .await;
        }
        Ok(())
    }

    /// Wait for in-flight requests to finish, up to the budget
    async fn await_drain(&self, node_id: Uuid, budget: Duration) {
        let deadline = tokio::time::Instant::now() + budget;
        loop {
            let in_flight = self
                .registry
                .runtime(node_id)
                .map(|rt| rt.in_flight())
                .unwrap_or(0);
            if in_flight == 0 {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(node = %node_id, in_flight, "drain budget exhausted with requests in flight");
                return;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    async fn launch_replacement(&self, node: &crate::core::models::Node) -> Result<()> {
        let deployment = self.db.get_deployment(node.deployment_id).await?;
        let (instance_type, use_spot, placement) = match &deployment {
            Some(d) => (d.instance_type.clone(), d.use_spot, d.strategy),
            None => (
                node.instance_type.clone(),
                node.spot_instance,
                PlacementStrategy::default(),
            ),
        };

        let handle = self
            .orchestrator
            .launch(NodeConfig {
                deployment_id: node.deployment_id,
                model_name: node.model_name.clone(),
                provider: node.provider.clone(),
                region: node.region.clone(),
                gpu_type: node.gpu_type.clone(),
                instance_type,
                use_spot,
                placement,
            })
            .await?;
        info!(
            replaced = %node.id,
            replacement = %handle.node_id,
            "replacement launch requested"
        );
        Ok(())
    }
}
