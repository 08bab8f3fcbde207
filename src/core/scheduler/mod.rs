//! Worker scheduler
//!
//! Filters the node index down to the eligible set for a request, then
//! applies the configured selection strategy. Eligibility in order: status
//! schedulable, model match, health at or above threshold, region match
//! when a preference is present. An empty region-filtered set retries
//! without the region; an empty set after that is `NoCapacity` unless a
//! below-threshold candidate can serve degraded.

mod selection;

use crate::config::{SchedulerConfig, SchedulingStrategy};
use crate::core::registry::{NodeRegistry, NodeRuntime};
use crate::core::models::NodeStatus;
use crate::utils::error::{FleetError, Result};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tracing::{debug, warn};
use uuid::Uuid;

/// A routing request
#[derive(Debug, Clone, Copy)]
pub struct RouteRequest<'a> {
    /// Requested model
    pub model: &'a str,
    /// Pinned region preference, dropped if it empties the set
    pub preferred_region: Option<&'a str>,
    /// Nodes excluded from this decision (retry after upstream failure)
    pub exclude: &'a [Uuid],
}

/// Worker scheduler
pub struct Scheduler {
    config: SchedulerConfig,
    registry: Arc<NodeRegistry>,
    round_robin: DashMap<String, AtomicUsize>,
}

impl Scheduler {
    /// Create a scheduler over the node registry
    pub fn new(config: SchedulerConfig, registry: Arc<NodeRegistry>) -> Self {
        Self {
            config,
            registry,
            round_robin: DashMap::new(),
        }
    }

    /// Select an eligible worker for a request
    pub fn select(&self, request: RouteRequest<'_>) -> Result<Arc<NodeRuntime>> {
        let candidates = self.eligible(request.model, request.preferred_region, request.exclude);

        let candidates = if candidates.is_empty() && request.preferred_region.is_some() {
            debug!(
                model = request.model,
                region = request.preferred_region,
                "region preference yielded no workers, retrying without region"
            );
            self.eligible(request.model, None, request.exclude)
        } else {
            candidates
        };

        if !candidates.is_empty() {
            return self.pick(request.model, candidates);
        }

        // Graceful degradation: schedulable workers exist but all sit below
        // the health threshold. Serve from the best of them and say so.
        let degraded = self.below_threshold(request.model, request.exclude);
        if let Some(best) = degraded {
            warn!(
                model = request.model,
                node = %best.snapshot().id,
                health = best.snapshot().health_score,
                "degraded serving: all candidates below health threshold"
            );
            return Ok(best);
        }

        Err(FleetError::NoCapacity(format!(
            "no eligible worker for model {}",
            request.model
        )))
    }

    /// The eligible set for a model/region, preferring `active` over `ready`
    fn eligible(
        &self,
        model: &str,
        region: Option<&str>,
        exclude: &[Uuid],
    ) -> Vec<Arc<NodeRuntime>> {
        let threshold = self.config.health_threshold;
        let all: Vec<Arc<NodeRuntime>> = self
            .registry
            .list_healthy(model, region)
            .into_iter()
            .filter(|rt| {
                let n = rt.snapshot();
                n.health_score >= threshold && !exclude.contains(&n.id)
            })
            .collect();

        // A worker with a heartbeat is strictly better informed than one
        // that only just registered; restrict to active when mixed.
        let has_active = all
            .iter()
            .any(|rt| rt.snapshot().status == NodeStatus::Active);
        if has_active {
            all.into_iter()
                .filter(|rt| rt.snapshot().status == NodeStatus::Active)
                .collect()
        } else {
            all
        }
    }

    /// Best-scoring schedulable node under the threshold, if any
    fn below_threshold(&self, model: &str, exclude: &[Uuid]) -> Option<Arc<NodeRuntime>> {
        self.registry
            .list_healthy(model, None)
            .into_iter()
            .filter(|rt| !exclude.contains(&rt.snapshot().id))
            .max_by_key(|rt| rt.snapshot().health_score)
    }

    /// Apply the configured strategy to a non-empty eligible set
    fn pick(&self, model: &str, candidates: Vec<Arc<NodeRuntime>>) -> Result<Arc<NodeRuntime>> {
        let selected = match self.config.strategy {
            SchedulingStrategy::LeastLoaded => selection::least_loaded(&candidates),
            SchedulingStrategy::RoundRobin => {
                let counter = self
                    .round_robin
                    .entry(model.to_string())
                    .or_insert_with(|| AtomicUsize::new(0));
                selection::round_robin(&candidates, &counter)
            }
            SchedulingStrategy::WeightedLatency => selection::weighted_latency(&candidates),
            SchedulingStrategy::Random => selection::random(&candidates),
        };
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::Node;
    use crate::storage::database::Database;

    async fn registry() -> Arc<NodeRegistry> {
        // The registry's in-memory index is exercised directly; the store
        // behind it is an in-memory SQLite database.
        let db = Database::new(&crate::config::DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..Default::default()
        })
        .await
        .unwrap();
        db.migrate().await.unwrap();
        Arc::new(NodeRegistry::new(Arc::new(db)))
    }

    fn node(model: &str, region: &str, status: NodeStatus, health: u8) -> Node {
        let mut n = Node::launching(
            Uuid::new_v4(),
            format!("fg-{}", Uuid::new_v4().simple()),
            Uuid::new_v4(),
            "aws",
            region,
            "A100-80GB",
            "p4d.24xlarge",
            false,
            model,
        );
        n.status = status;
        n.health_score = health;
        n.endpoint_url = status.may_have_endpoint().then(|| "http://n:8000".to_string());
        n
    }

    async fn seed(registry: &NodeRegistry, n: Node) {
        let launching = Node {
            status: NodeStatus::Launching,
            endpoint_url: None,
            health_score: 0,
            ..n.clone()
        };
        registry.register(launching).await.unwrap();
        if n.status != NodeStatus::Launching {
            let ready = registry
                .mark_ready(n.id, n.endpoint_url.as_deref().unwrap_or("http://n:8000"))
                .await
                .unwrap();
            assert_eq!(ready.status, NodeStatus::Ready);
            if n.status == NodeStatus::Active {
                registry
                    .record_heartbeat(n.id, n.health_score, None)
                    .await
                    .unwrap();
            }
            registry
                .apply_verdict(n.id, n.health_score, None)
                .await
                .unwrap();
        }
    }

    fn scheduler(registry: Arc<NodeRegistry>, strategy: SchedulingStrategy) -> Scheduler {
        Scheduler::new(
            SchedulerConfig {
                strategy,
                health_threshold: 50,
            },
            registry,
        )
    }

    #[tokio::test]
    async fn selects_only_matching_model() {
        let registry = registry().await;
        let a = node("llama-3-8b", "us-east-1", NodeStatus::Active, 90);
        let b = node("mistral-7b", "us-east-1", NodeStatus::Active, 90);
        let a_id = a.id;
        seed(&registry, a).await;
        seed(&registry, b).await;

        let sched = scheduler(registry, SchedulingStrategy::LeastLoaded);
        let picked = sched
            .select(RouteRequest {
                model: "llama-3-8b",
                preferred_region: None,
                exclude: &[],
            })
            .unwrap();
        assert_eq!(picked.snapshot().id, a_id);
    }

    #[tokio::test]
    async fn region_preference_relaxes_when_empty() {
        let registry = registry().await;
        let east = node("llama-3-8b", "us-east-1", NodeStatus::Active, 90);
        let east_id = east.id;
        seed(&registry, east).await;

        let sched = scheduler(registry, SchedulingStrategy::LeastLoaded);
        let picked = sched
            .select(RouteRequest {
                model: "llama-3-8b",
                preferred_region: Some("eu-west-1"),
                exclude: &[],
            })
            .unwrap();
        assert_eq!(picked.snapshot().id, east_id);
    }

    #[tokio::test]
    async fn no_capacity_when_nothing_matches() {
        let registry = registry().await;
        let sched = scheduler(registry, SchedulingStrategy::LeastLoaded);
        let err = sched
            .select(RouteRequest {
                model: "llama-3-8b",
                preferred_region: None,
                exclude: &[],
            })
            .unwrap_err();
        assert!(matches!(err, FleetError::NoCapacity(_)));
    }

    #[tokio::test]
    async fn active_preferred_over_ready() {
        let registry = registry().await;
        let ready = node("llama-3-8b", "us-east-1", NodeStatus::Ready, 90);
        let active = node("llama-3-8b", "us-east-1", NodeStatus::Active, 60);
        let active_id = active.id;
        seed(&registry, ready).await;
        seed(&registry, active).await;

        let sched = scheduler(registry, SchedulingStrategy::LeastLoaded);
        for _ in 0..4 {
            let picked = sched
                .select(RouteRequest {
                    model: "llama-3-8b",
                    preferred_region: None,
                    exclude: &[],
                })
                .unwrap();
            assert_eq!(picked.snapshot().id, active_id);
        }
    }

    #[tokio::test]
    async fn below_threshold_serves_best_degraded() {
        let registry = registry().await;
        let weak = node("llama-3-8b", "us-east-1", NodeStatus::Active, 20);
        let weaker = node("llama-3-8b", "us-east-1", NodeStatus::Active, 10);
        let weak_id = weak.id;
        seed(&registry, weak).await;
        seed(&registry, weaker).await;

        let sched = scheduler(registry, SchedulingStrategy::LeastLoaded);
        let picked = sched
            .select(RouteRequest {
                model: "llama-3-8b",
                preferred_region: None,
                exclude: &[],
            })
            .unwrap();
        assert_eq!(picked.snapshot().id, weak_id);
    }

    #[tokio::test]
    async fn exclusion_skips_failed_node() {
        let registry = registry().await;
        let a = node("llama-3-8b", "us-east-1", NodeStatus::Active, 90);
        let b = node("llama-3-8b", "us-east-1", NodeStatus::Active, 90);
        let a_id = a.id;
        let b_id = b.id;
        seed(&registry, a).await;
        seed(&registry, b).await;

        let sched = scheduler(registry, SchedulingStrategy::LeastLoaded);
        let picked = sched
            .select(RouteRequest {
                model: "llama-3-8b",
                preferred_region: None,
                exclude: &[a_id],
            })
            .unwrap();
        assert_eq!(picked.snapshot().id, b_id);
    }
}
