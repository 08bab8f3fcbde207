//! Application state shared across HTTP handlers

use crate::auth::AuthSystem;
use crate::config::Config;
use crate::core::limiter::RateLimiter;
use crate::core::meter::UsageMeter;
use crate::core::monitor::HealthMonitor;
use crate::core::orchestrator::{JobStore, WorkerOrchestrator};
use crate::core::proxy::InferenceProxy;
use crate::core::reconciler::DeploymentReconciler;
use crate::core::registry::NodeRegistry;
use crate::core::retirement::RetirementHandler;
use crate::core::scheduler::Scheduler;
use crate::core::supervision::LoopHealth;
use crate::storage::StorageLayer;
use crate::utils::error::Result;
use std::sync::Arc;
use tracing::debug;

/// HTTP server state shared across handlers
///
/// All fields are wrapped in Arc for efficient sharing across threads.
#[derive(Clone)]
pub struct AppState {
    /// Control-plane configuration (shared read-only)
    pub config: Arc<Config>,
    /// Storage layer
    pub storage: Arc<StorageLayer>,
    /// Authentication system
    pub auth: Arc<AuthSystem>,
    /// Layered rate limiter
    pub limiter: Arc<RateLimiter>,
    /// Node registry
    pub registry: Arc<NodeRegistry>,
    /// Inference proxy
    pub proxy: Arc<InferenceProxy>,
    /// Usage meter
    pub meter: Arc<UsageMeter>,
    /// Worker orchestrator
    pub orchestrator: Arc<WorkerOrchestrator>,
    /// Retirement handler
    pub retirement: Arc<RetirementHandler>,
    /// Health monitor
    pub monitor: Arc<HealthMonitor>,
    /// Deployment reconciler
    pub reconciler: Arc<DeploymentReconciler>,
    /// Reconciler self-health, surfaced on `/ready`
    pub reconciler_health: Arc<LoopHealth>,
    /// Monitor self-health, surfaced on `/ready`
    pub monitor_health: Arc<LoopHealth>,
    /// Meter drain-loop self-health, surfaced on `/ready`
    pub meter_health: Arc<LoopHealth>,
    /// Registry resync-loop self-health, surfaced on `/ready`
    pub resync_health: Arc<LoopHealth>,
}

impl AppState {
    /// Wire up every subsystem over a connected storage layer
    pub async fn build(config: Config) -> Result<Self> {
        let config = Arc::new(config);

        debug!("initializing storage layer");
        let storage = Arc::new(StorageLayer::new(&config.storage).await?);
        storage.migrate().await?;

        let auth = Arc::new(AuthSystem::new(&config.auth, Arc::clone(&storage)));
        let limiter = Arc::new(RateLimiter::new(
            config.rate_limits.clone(),
            Arc::clone(&storage.redis),
        ));

        let registry = Arc::new(NodeRegistry::new(Arc::clone(&storage.database)));
        registry.rebuild().await?;

        let scheduler = Arc::new(Scheduler::new(
            config.scheduler.clone(),
            Arc::clone(&registry),
        ));
        let meter = Arc::new(UsageMeter::new(
            config.meter.clone(),
            Arc::clone(&storage.database),
        ));
        let proxy = Arc::new(InferenceProxy::new(
            config.proxy.clone(),
            Arc::clone(&scheduler),
            Arc::clone(&meter),
        ));

        let jobs = Arc::new(JobStore::new(Arc::clone(&storage.database)));
        let orchestrator = Arc::new(WorkerOrchestrator::new(
            config.orchestrator.clone(),
            Arc::clone(&storage.database),
            Arc::clone(&registry),
            jobs,
        ));
        let retirement = Arc::new(RetirementHandler::new(
            Arc::clone(&registry),
            Arc::clone(&orchestrator),
            Arc::clone(&storage.database),
        ));
        let monitor = Arc::new(HealthMonitor::new(
            config.monitor.clone(),
            Arc::clone(&registry),
            Arc::clone(&retirement),
            orchestrator.cloud().clone(),
        ));
        let reconciler = Arc::new(DeploymentReconciler::new(
            config.reconciler.clone(),
            Arc::clone(&storage.database),
            Arc::clone(&orchestrator),
            Arc::clone(&retirement),
        ));
        let reconciler_health = reconciler.health();
        let monitor_health = monitor.health();
        let meter_health = meter.health();
        let resync_health = registry.resync_health();

        Ok(Self {
            config,
            storage,
            auth,
            limiter,
            registry,
            proxy,
            meter,
            orchestrator,
            retirement,
            monitor,
            reconciler,
            reconciler_health,
            monitor_health,
            meter_health,
            resync_health,
        })
    }

    /// Start the supervised background loops
    pub fn spawn_background_loops(&self) {
        debug!("starting background loops");
        self.registry.spawn_resync_loop(300);
        self.meter.spawn_drain_loop();
        self.monitor.spawn_loop();
        self.reconciler.spawn_loop();
        self.orchestrator.spawn_gc_loop();
    }
}
