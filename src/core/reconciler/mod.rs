//! Deployment controller
//!
//! A single reconciliation loop converging every active deployment toward
//! its minimum replica count. Launches are sequential with a small stagger
//! to avoid cloud API bursts; scale-down drains the newest healthy nodes.
//! Instances coordinate through a store-backed advisory lock per
//! deployment; a held lock skips the tick without blocking.

use crate::config::ReconcilerConfig;
use crate::core::models::{Deployment, NodeStatus};
use crate::core::orchestrator::{NodeConfig, WorkerOrchestrator};
use crate::core::retirement::{RetirementHandler, RetirementReason};
use crate::core::supervision::LoopHealth;
use crate::storage::database::Database;
use crate::utils::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Deployment reconciler
pub struct DeploymentReconciler {
    config: ReconcilerConfig,
    db: Arc<Database>,
    orchestrator: Arc<WorkerOrchestrator>,
    retirement: Arc<RetirementHandler>,
    holder: String,
    health: Arc<LoopHealth>,
}

impl DeploymentReconciler {
    /// Create a reconciler
    pub fn new(
        config: ReconcilerConfig,
        db: Arc<Database>,
        orchestrator: Arc<WorkerOrchestrator>,
        retirement: Arc<RetirementHandler>,
    ) -> Self {
        let holder = format!(
            "{}:{}",
            std::env::var("HOSTNAME").unwrap_or_else(|_| "fleetgate".to_string()),
            std::process::id()
        );
        Self {
            config,
            db,
            orchestrator,
            retirement,
            holder,
            health: Arc::new(LoopHealth::new()),
        }
    }

    /// Self-health handle for `/ready`
    pub fn health(&self) -> Arc<LoopHealth> {
        Arc::clone(&self.health)
    }

    /// One reconciliation sweep over every active deployment
    pub async fn tick(&self) {
        let deployments = match self.db.list_active_deployments().await {
            Ok(d) => d,
            Err(e) => {
                // Counting queries failed: skip this tick, retry next.
                warn!("reconciler skipping tick, deployment query failed: {}", e);
                self.health.record_err();
                return;
            }
        };

        for deployment in deployments {
            if let Err(e) = self.reconcile_one(&deployment).await {
                warn!(
                    deployment = %deployment.id,
                    "reconciliation failed: {}", e
                );
                self.health.record_err();
                return;
            }
        }
        self.health.record_ok();
    }

    async fn reconcile_one(&self, deployment: &Deployment) -> Result<()> {
        let acquired = self
            .db
            .try_acquire_deployment_lock(deployment.id, &self.holder, self.config.lock_ttl)
            .await?;
        if !acquired {
            debug!(deployment = %deployment.id, "advisory lock held elsewhere, skipping");
            return Ok(());
        }

        let result = self.reconcile_locked(deployment).await;
        self.db
            .release_deployment_lock(deployment.id, &self.holder)
            .await?;
        result
    }

    async fn reconcile_locked(&self, deployment: &Deployment) -> Result<()> {
        let observed = self.db.count_capacity_nodes(deployment.id).await? as u32;
        let desired = deployment.desired_replicas();
        self.db.set_current_replicas(deployment.id, observed).await?;

        if observed < desired {
            let missing = desired - observed;
            info!(
                deployment = %deployment.id,
                observed, desired, missing,
                "scaling up"
            );
            for i in 0..missing {
                // Node IDs are reserved inside launch() before the cloud is
                // touched, so a crashed sweep cannot double-fill a slot held
                // by the advisory lock.
                if let Err(e) = self
                    .orchestrator
                    .launch(NodeConfig {
                        deployment_id: deployment.id,
                        model_name: deployment.model_name.clone(),
                        provider: deployment.provider.clone(),
                        region: deployment.region.clone(),
                        gpu_type: deployment.gpu_type.clone(),
                        instance_type: deployment.instance_type.clone(),
                        use_spot: deployment.use_spot,
                        placement: deployment.strategy,
                    })
                    .await
                {
                    warn!(deployment = %deployment.id, "launch request failed: {}", e);
                    break;
                }
                if i + 1 < missing {
                    tokio::time::sleep(Duration::from_secs(
                        self.config.launch_stagger.min(5),
                    ))
                    .await;
                }
            }
            return Ok(());
        }

        let ceiling = desired + self.config.scale_down_slack;
        if observed > ceiling {
            let surplus = (observed - desired) as usize;
            info!(
                deployment = %deployment.id,
                observed, desired, surplus,
                "scaling down"
            );

            // Newest healthy nodes go first; draining precedes termination.
            let nodes = self.db.list_nodes_by_deployment(deployment.id).await?;
            let victims: Vec<_> = nodes
                .into_iter()
                .filter(|n| {
                    matches!(
                        n.status,
                        NodeStatus::Ready | NodeStatus::Active | NodeStatus::Degraded
                    )
                })
                .take(surplus)
                .collect();

            for node in victims {
                let retirement = Arc::clone(&self.retirement);
                tokio::spawn(async move {
                    if let Err(e) = retirement
                        .retire(node.id, RetirementReason::ScaleDown, false)
                        .await
                    {
                        warn!(node = %node.id, "scale-down retirement failed: {}", e);
                    }
                });
            }
        }
        Ok(())
    }

    /// Spawn the periodic reconciliation loop
    pub fn spawn_loop(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let reconciler = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(
                reconciler.config.interval.max(1),
            ));
            interval.tick().await;
            loop {
                interval.tick().await;
                reconciler.tick().await;
            }
        })
    }
}
