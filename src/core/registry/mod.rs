//! Node registry
//!
//! Canonical state of every worker. Two tiers: the persistent store is the
//! source of truth; a process-local index serves sub-millisecond lookups on
//! the request path. Writes go store-first under a node-keyed mutex, then
//! republish the in-memory snapshot; reads never take a lock.

mod runtime;

pub use runtime::{InFlightGuard, NodeRuntime};

use crate::core::models::{Node, NodeStatus};
use crate::core::supervision::LoopHealth;
use crate::storage::database::Database;
use crate::utils::error::{FleetError, Result};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Node registry with persistent store and in-memory index
pub struct NodeRegistry {
    db: Arc<Database>,
    index: DashMap<Uuid, Arc<NodeRuntime>>,
    write_locks: DashMap<Uuid, Arc<Mutex<()>>>,
    resync_health: Arc<LoopHealth>,
}

impl NodeRegistry {
    /// Create an empty registry backed by the store
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            index: DashMap::new(),
            write_locks: DashMap::new(),
            resync_health: Arc::new(LoopHealth::new()),
        }
    }

    /// Resync-loop self-health handle for `/ready`
    pub fn resync_health(&self) -> Arc<LoopHealth> {
        Arc::clone(&self.resync_health)
    }

    /// Rebuild the in-memory index from the store
    ///
    /// Runs at startup and from the periodic resync loop; repairs any drift
    /// between index and store.
    pub async fn rebuild(&self) -> Result<usize> {
        let nodes = self.db.list_live_nodes().await?;
        let live_ids: std::collections::HashSet<Uuid> = nodes.iter().map(|n| n.id).collect();

        self.index.retain(|id, _| live_ids.contains(id));
        let count = nodes.len();
        for node in nodes {
            match self.index.get(&node.id) {
                Some(existing) => existing.node.store(Arc::new(node)),
                None => {
                    self.index
                        .insert(node.id, Arc::new(NodeRuntime::new(node)));
                }
            }
        }

        debug!(nodes = count, "node index rebuilt");
        Ok(count)
    }

    fn write_lock(&self, node_id: Uuid) -> Arc<Mutex<()>> {
        self.write_locks
            .entry(node_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Register a freshly assigned node in state `launching`
    pub async fn register(&self, node: Node) -> Result<()> {
        if node.status != NodeStatus::Launching {
            return Err(FleetError::conflict(format!(
                "node {} must register in launching state, got {}",
                node.id, node.status
            )));
        }
        let lock = self.write_lock(node.id);
        let _guard = lock.lock().await;

        self.db.insert_node(&node).await?;
        self.index
            .insert(node.id, Arc::new(NodeRuntime::new(node)));
        Ok(())
    }

    async fn load(&self, node_id: Uuid) -> Result<Node> {
        if let Some(runtime) = self.index.get(&node_id) {
            return Ok(runtime.snapshot().as_ref().clone());
        }
        self.db
            .get_node(node_id)
            .await?
            .ok_or_else(|| FleetError::not_found(format!("node {}", node_id)))
    }

    async fn commit(&self, node: Node) -> Result<()> {
        // Store first; the index is only updated once the row is durable.
        self.db.update_node(&node).await?;
        match self.index.get(&node.id) {
            Some(runtime) => runtime.node.store(Arc::new(node)),
            None => {
                if !node.status.is_terminal() {
                    self.index
                        .insert(node.id, Arc::new(NodeRuntime::new(node)));
                }
            }
        }
        Ok(())
    }

    /// General status transition; rejects illegal moves
    pub async fn update_status(
        &self,
        node_id: Uuid,
        status: NodeStatus,
        status_message: Option<String>,
    ) -> Result<Node> {
        let lock = self.write_lock(node_id);
        let _guard = lock.lock().await;

        let mut node = self.load(node_id).await?;
        if !node.status.can_transition_to(status) {
            return Err(FleetError::conflict(format!(
                "illegal node transition {} -> {} for {}",
                node.status, status, node_id
            )));
        }

        node.status = status;
        if status_message.is_some() {
            node.status_message = status_message;
        }
        if !status.may_have_endpoint() {
            node.endpoint_url = None;
        }
        node.updated_at = Utc::now();

        self.commit(node.clone()).await?;

        if status.is_terminal() {
            self.index.remove(&node_id);
            self.write_locks.remove(&node_id);
        }
        Ok(node)
    }

    /// Transition `launching`/`initializing` to `ready` and record the endpoint
    ///
    /// Invoked by the registration endpoint when a worker boots; this is the
    /// moment the worker becomes schedulable.
    pub async fn mark_ready(&self, node_id: Uuid, endpoint_url: &str) -> Result<Node> {
        let lock = self.write_lock(node_id);
        let _guard = lock.lock().await;

        let mut node = self.load(node_id).await?;
        if !matches!(
            node.status,
            NodeStatus::Launching | NodeStatus::Initializing
        ) {
            return Err(FleetError::conflict(format!(
                "node {} cannot register from state {}",
                node_id, node.status
            )));
        }

        node.status = NodeStatus::Ready;
        node.endpoint_url = Some(endpoint_url.to_string());
        node.updated_at = Utc::now();
        self.commit(node.clone()).await?;

        info!(node = %node_id, endpoint = endpoint_url, "node registered and ready");
        Ok(node)
    }

    /// Record a push heartbeat; promotes `ready -> active` on first beat
    ///
    /// The worker-reported score is advisory; the health monitor's verdict
    /// overwrites it on the next evaluation cycle.
    pub async fn record_heartbeat(
        &self,
        node_id: Uuid,
        health_score: u8,
        status_message: Option<String>,
    ) -> Result<Node> {
        let lock = self.write_lock(node_id);
        let _guard = lock.lock().await;

        let mut node = self.load(node_id).await?;
        if node.status.is_terminal() {
            return Err(FleetError::conflict(format!(
                "heartbeat for terminal node {}",
                node_id
            )));
        }

        node.last_heartbeat = Some(Utc::now());
        node.health_score = health_score.min(100);
        if status_message.is_some() {
            node.status_message = status_message;
        }
        if node.status == NodeStatus::Ready {
            node.status = NodeStatus::Active;
            debug!(node = %node_id, "first heartbeat, node active");
        }
        node.updated_at = Utc::now();

        self.commit(node.clone()).await?;
        Ok(node)
    }

    /// Overwrite the health verdict fields; used by the health monitor
    pub async fn apply_verdict(
        &self,
        node_id: Uuid,
        health_score: u8,
        status_message: Option<String>,
    ) -> Result<()> {
        let lock = self.write_lock(node_id);
        let _guard = lock.lock().await;

        let mut node = self.load(node_id).await?;
        if node.status.is_terminal() {
            return Ok(());
        }
        node.health_score = health_score.min(100);
        if status_message.is_some() {
            node.status_message = status_message;
        }
        node.updated_at = Utc::now();
        self.commit(node).await
    }

    /// Retire a node, preserving the row for audit
    pub async fn terminate(&self, node_id: Uuid, reason: &str) -> Result<Node> {
        self.update_status(node_id, NodeStatus::Terminated, Some(reason.to_string()))
            .await
    }

    /// Runtime handle for the proxy's in-flight accounting
    pub fn runtime(&self, node_id: Uuid) -> Option<Arc<NodeRuntime>> {
        self.index.get(&node_id).map(|r| r.clone())
    }

    /// Lock-free snapshot of one node
    pub fn snapshot(&self, node_id: Uuid) -> Option<Arc<Node>> {
        self.index.get(&node_id).map(|r| r.snapshot())
    }

    /// All indexed runtimes serving a model
    pub fn list_by_model(&self, model: &str) -> Vec<Arc<NodeRuntime>> {
        self.index
            .iter()
            .filter(|entry| entry.snapshot().model_name == model)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// All indexed runtimes of one deployment
    pub fn list_by_deployment(&self, deployment_id: Uuid) -> Vec<Arc<NodeRuntime>> {
        self.index
            .iter()
            .filter(|entry| entry.snapshot().deployment_id == deployment_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Schedulable nodes for a model, optionally filtered by region
    pub fn list_healthy(&self, model: &str, region: Option<&str>) -> Vec<Arc<NodeRuntime>> {
        self.index
            .iter()
            .filter(|entry| {
                let n = entry.snapshot();
                n.model_name == model
                    && n.status.is_schedulable()
                    && region.is_none_or(|r| n.region == r)
            })
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// All non-terminal snapshots, the monitor's working set
    pub fn list_live(&self) -> Vec<Arc<NodeRuntime>> {
        self.index.iter().map(|e| e.value().clone()).collect()
    }

    /// Spawn the periodic full-resync loop that repairs index drift
    pub fn spawn_resync_loop(self: &Arc<Self>, interval_secs: u64) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(interval_secs.max(30)));
            interval.tick().await;
            loop {
                interval.tick().await;
                match registry.rebuild().await {
                    Ok(_) => registry.resync_health.record_ok(),
                    Err(e) => {
                        warn!("node index resync failed: {}", e);
                        registry.resync_health.record_err();
                    }
                }
            }
        })
    }
}
