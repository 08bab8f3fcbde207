//! Health monitor
//!
//! Evaluates three independent signals per node: the push heartbeat (S1),
//! an active health poll (S2), and the cloud inventory (S3). Negative S2
//! and S3 observations need consecutive confirmations before they count,
//! absorbing single-probe jitter. The verdict table decides the action;
//! the verdict score overwrites the worker's advisory heartbeat score.

mod verdict;

pub use verdict::{HealthVerdict, SignalTriple, VerdictAction, evaluate};

use crate::config::MonitorConfig;
use crate::core::models::NodeStatus;
use crate::core::orchestrator::{CloudClusterState, CloudTool};
use crate::core::registry::NodeRegistry;
use crate::core::retirement::{RetirementHandler, RetirementReason};
use crate::core::supervision::LoopHealth;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

struct CloudObservation {
    at: Instant,
    present: bool,
}

/// Health monitor over the node registry
pub struct HealthMonitor {
    config: MonitorConfig,
    registry: Arc<NodeRegistry>,
    retirement: Arc<RetirementHandler>,
    cloud: CloudTool,
    client: reqwest::Client,
    probe_failures: DashMap<Uuid, u32>,
    cloud_absences: DashMap<Uuid, u32>,
    cloud_cache: DashMap<Uuid, CloudObservation>,
    health: Arc<LoopHealth>,
}

impl HealthMonitor {
    /// Create a health monitor
    pub fn new(
        config: MonitorConfig,
        registry: Arc<NodeRegistry>,
        retirement: Arc<RetirementHandler>,
        cloud: CloudTool,
    ) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("reqwest client");
        Self {
            config,
            registry,
            retirement,
            cloud,
            client,
            probe_failures: DashMap::new(),
            cloud_absences: DashMap::new(),
            cloud_cache: DashMap::new(),
            health: Arc::new(LoopHealth::new()),
        }
    }

    /// Self-health handle for `/ready`
    pub fn health(&self) -> Arc<LoopHealth> {
        Arc::clone(&self.health)
    }

    /// One evaluation sweep over every monitorable node
    pub async fn tick(&self) {
        let now = chrono::Utc::now();
        let staleness = chrono::Duration::seconds(self.config.heartbeat_staleness as i64);
        let mut sweep_failed = false;

        for runtime in self.registry.list_live() {
            let node = runtime.snapshot();
            // Launching and initializing nodes belong to the orchestrator's
            // verification phase; draining nodes are already on the way out.
            if !matches!(
                node.status,
                NodeStatus::Ready | NodeStatus::Active | NodeStatus::Degraded
            ) {
                continue;
            }
            let Some(endpoint) = node.endpoint_url.clone() else {
                continue;
            };

            // S1: heartbeat freshness.
            let heartbeat_fresh = node.heartbeat_fresh(staleness, now);

            // S2: active poll with confirmation debounce.
            let probe_ok = self.probe(&endpoint).await;
            let probe_failures = if probe_ok {
                self.probe_failures.insert(node.id, 0);
                0
            } else {
                let mut entry = self.probe_failures.entry(node.id).or_insert(0);
                *entry += 1;
                *entry
            };
            let probe_healthy = probe_failures < self.config.confirmations;

            // S3: cloud inventory, polled on its own slower cadence.
            let cloud_raw = self.cloud_state(node.id, &node.cluster_name).await;
            let cloud_absences = if cloud_raw {
                self.cloud_absences.insert(node.id, 0);
                0
            } else {
                let mut entry = self.cloud_absences.entry(node.id).or_insert(0);
                *entry += 1;
                *entry
            };
            let cloud_present = cloud_absences < self.config.confirmations;

            let signals = SignalTriple {
                heartbeat_fresh,
                probe_healthy,
                cloud_present,
            };
            let verdict = evaluate(signals);
            debug!(
                node = %node.id,
                score = verdict.score,
                label = verdict.label,
                "health verdict"
            );

            if let Err(e) = self
                .registry
                .apply_verdict(node.id, verdict.score, Some(verdict.label.to_string()))
                .await
            {
                warn!(node = %node.id, "verdict write failed: {}", e);
                sweep_failed = true;
                continue;
            }

            match verdict.action {
                VerdictAction::Maintain => {
                    if node.status == NodeStatus::Degraded {
                        let _ = self
                            .registry
                            .update_status(node.id, NodeStatus::Active, Some("recovered".into()))
                            .await;
                    }
                }
                VerdictAction::Alert => {
                    warn!(
                        node = %node.id,
                        cluster = %node.cluster_name,
                        "cloud inventory lost track of a serving node"
                    );
                    self.degrade(node.id).await;
                }
                VerdictAction::Watch => {
                    self.degrade(node.id).await;
                }
                VerdictAction::DrainReplace => {
                    self.forget(node.id);
                    let retirement = Arc::clone(&self.retirement);
                    let node_id = node.id;
                    tokio::spawn(async move {
                        if let Err(e) = retirement
                            .retire(node_id, RetirementReason::Dying, true)
                            .await
                        {
                            warn!(node = %node_id, "retirement failed: {}", e);
                        }
                    });
                }
                VerdictAction::FailReplace => {
                    self.forget(node.id);
                    let retirement = Arc::clone(&self.retirement);
                    let node_id = node.id;
                    tokio::spawn(async move {
                        if let Err(e) = retirement
                            .retire(node_id, RetirementReason::Dead, true)
                            .await
                        {
                            warn!(node = %node_id, "dead-node handling failed: {}", e);
                        }
                    });
                }
            }
        }

        if sweep_failed {
            self.health.record_err();
        } else {
            self.health.record_ok();
        }
    }

    async fn degrade(&self, node_id: Uuid) {
        if let Some(node) = self.registry.snapshot(node_id) {
            if node.status == NodeStatus::Active || node.status == NodeStatus::Ready {
                let _ = self
                    .registry
                    .update_status(node_id, NodeStatus::Degraded, None)
                    .await;
            }
        }
    }

    fn forget(&self, node_id: Uuid) {
        self.probe_failures.remove(&node_id);
        self.cloud_absences.remove(&node_id);
        self.cloud_cache.remove(&node_id);
    }

    /// S2 probe: 2xx within the probe timeout counts as healthy
    async fn probe(&self, endpoint: &str) -> bool {
        let url = format!("{}/health", endpoint.trim_end_matches('/'));
        self.client
            .get(&url)
            .timeout(Duration::from_secs(self.config.probe_timeout))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    /// S3 query, cached between cloud poll intervals
    async fn cloud_state(&self, node_id: Uuid, cluster_name: &str) -> bool {
        let poll_every = Duration::from_secs(self.config.cloud_poll_interval);
        if let Some(obs) = self.cloud_cache.get(&node_id) {
            if obs.at.elapsed() < poll_every {
                return obs.present;
            }
        }

        let present = match self.cloud.cluster_state(cluster_name).await {
            Ok(CloudClusterState::Present) => true,
            Ok(CloudClusterState::Absent) => false,
            Err(e) => {
                // An unanswerable query is not evidence of absence.
                warn!(cluster = cluster_name, "cloud status query failed: {}", e);
                true
            }
        };
        self.cloud_cache.insert(
            node_id,
            CloudObservation {
                at: Instant::now(),
                present,
            },
        );
        present
    }

    /// Spawn the periodic evaluation loop
    pub fn spawn_loop(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(
                monitor.config.poll_interval.max(1),
            ));
            interval.tick().await;
            loop {
                interval.tick().await;
                monitor.tick().await;
            }
        })
    }
}
