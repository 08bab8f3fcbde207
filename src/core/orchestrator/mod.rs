//! Worker orchestrator
//!
//! Turns a `NodeConfig` into a running, registered worker and exposes live
//! progress through the launch job table. The node ID is assigned before
//! the cloud entity exists and doubles as the worker's registration
//! identity, so it survives cloud-side renames.

mod classify;
mod cloud;
mod jobs;
mod scanner;
mod spec;

pub use cloud::{CloudClusterState, CloudTool};
pub use jobs::JobStore;
pub use spec::{NodeConfig, cluster_name_for, render_spec};

use crate::config::OrchestratorConfig;
use crate::core::models::{LaunchJob, LaunchJobStatus, Node, NodeStatus};
use crate::core::registry::NodeRegistry;
use crate::storage::database::Database;
use crate::utils::error::{FleetError, LaunchFailureCategory, Result};
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Handle returned to the caller while the launch runs in the background
#[derive(Debug, Clone, Copy)]
pub struct LaunchHandle {
    /// Progress handle
    pub job_id: Uuid,
    /// The node being brought up
    pub node_id: Uuid,
}

enum SequenceError {
    Cancelled,
    Failed(LaunchFailureCategory, String),
}

/// Worker orchestrator
pub struct WorkerOrchestrator {
    config: OrchestratorConfig,
    db: Arc<Database>,
    registry: Arc<NodeRegistry>,
    jobs: Arc<JobStore>,
    cloud: CloudTool,
    client: reqwest::Client,
}

impl WorkerOrchestrator {
    /// Create an orchestrator
    pub fn new(
        config: OrchestratorConfig,
        db: Arc<Database>,
        registry: Arc<NodeRegistry>,
        jobs: Arc<JobStore>,
    ) -> Self {
        let cloud = CloudTool::new(config.launch_tool.clone());
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("reqwest client");
        Self {
            config,
            db,
            registry,
            jobs,
            cloud,
            client,
        }
    }

    /// The cloud tool handle, shared with the monitor and retirement handler
    pub fn cloud(&self) -> &CloudTool {
        &self.cloud
    }

    /// The job store, shared with the admin status endpoint
    pub fn jobs(&self) -> &Arc<JobStore> {
        &self.jobs
    }

    /// Start a worker launch; returns once the job is tracked
    pub async fn launch(self: &Arc<Self>, node_config: NodeConfig) -> Result<LaunchHandle> {
        // Pre-flight: credentials and registry validity, rejected before any
        // node row exists.
        if !CloudTool::credentials_present(&node_config.provider) {
            return Err(FleetError::launch_failed(
                LaunchFailureCategory::Credentials,
                format!(
                    "no credentials found for provider {}",
                    node_config.provider
                ),
            ));
        }
        match self.db.get_model(&node_config.model_name).await? {
            Some(model) if model.status == crate::core::models::ModelStatus::Active => {}
            Some(_) => {
                return Err(FleetError::invalid_request(format!(
                    "model {} is retired",
                    node_config.model_name
                )));
            }
            None => {
                return Err(FleetError::invalid_request(format!(
                    "unknown model {}",
                    node_config.model_name
                )));
            }
        }
        if self.db.get_region(&node_config.region).await?.is_none() {
            return Err(FleetError::invalid_request(format!(
                "unknown region {}",
                node_config.region
            )));
        }

        // Step 1: assign the node ID and persist the launching row.
        let node_id = Uuid::new_v4();
        let cluster_name = cluster_name_for(&node_config.model_name, node_id);
        let node = Node::launching(
            node_id,
            cluster_name.clone(),
            node_config.deployment_id,
            node_config.provider.clone(),
            node_config.region.clone(),
            node_config.gpu_type.clone(),
            node_config.instance_type.clone(),
            node_config.use_spot,
            node_config.model_name.clone(),
        );
        self.registry.register(node).await?;

        // Step 2: create the progress record.
        let deadline = Utc::now() + ChronoDuration::seconds(self.config.launch_timeout as i64);
        let job = LaunchJob::new(node_id, deadline);
        let job_id = job.id;
        let token = self.jobs.create(job).await?;

        info!(%job_id, %node_id, cluster = %cluster_name, "launch requested");

        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            orchestrator
                .run_launch(node_config, node_id, cluster_name, job_id, token)
                .await;
        });

        Ok(LaunchHandle { job_id, node_id })
    }

    /// Cancel a running launch
    pub async fn cancel(&self, job_id: Uuid) -> Result<()> {
        match self.jobs.token(job_id) {
            Some(token) => {
                token.cancel();
                Ok(())
            }
            None => Err(FleetError::not_found(format!(
                "launch job {} is not running",
                job_id
            ))),
        }
    }

    /// Fetch a job's current state
    pub async fn job(&self, job_id: Uuid) -> Result<Option<LaunchJob>> {
        self.jobs.get(job_id).await
    }

    async fn run_launch(
        self: Arc<Self>,
        node_config: NodeConfig,
        node_id: Uuid,
        cluster_name: String,
        job_id: Uuid,
        token: CancellationToken,
    ) {
        let overall = Duration::from_secs(self.config.launch_timeout);
        let outcome = tokio::time::timeout(
            overall,
            self.run_sequence(&node_config, node_id, &cluster_name, job_id, &token),
        )
        .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(SequenceError::Cancelled)) => {
                warn!(%job_id, "launch cancelled");
                self.jobs
                    .update(job_id, |j| {
                        if !j.status.is_terminal() {
                            j.advance(j.status, "launch cancelled by operator");
                            j.status = LaunchJobStatus::Cancelled;
                            j.percent = 100;
                        }
                    })
                    .await;
                self.fail_node(node_id, "launch cancelled").await;
                // Best-effort teardown of any partially provisioned entity.
                self.cloud.down(&cluster_name).await;
            }
            Ok(Err(SequenceError::Failed(category, message))) => {
                warn!(%job_id, %category, "launch failed: {}", message);
                self.jobs
                    .update(job_id, |j| j.fail(category, message.clone()))
                    .await;
                self.fail_node(node_id, &message).await;
            }
            Err(_) => {
                warn!(%job_id, "launch exceeded overall deadline");
                self.jobs
                    .update(job_id, |j| {
                        j.fail(
                            LaunchFailureCategory::Timeout,
                            format!(
                                "launch did not finish within {}s",
                                self.config.launch_timeout
                            ),
                        )
                    })
                    .await;
                self.fail_node(node_id, "launch deadline exceeded").await;
                self.cloud.down(&cluster_name).await;
            }
        }

        self.jobs.finish(job_id).await;
    }

    async fn run_sequence(
        &self,
        node_config: &NodeConfig,
        node_id: Uuid,
        cluster_name: &str,
        job_id: Uuid,
        token: &CancellationToken,
    ) -> std::result::Result<(), SequenceError> {
        self.jobs
            .update(job_id, |j| {
                j.advance(LaunchJobStatus::Validating, "pre-flight checks passed")
            })
            .await;

        // Step 3: render the launch spec.
        let rendered =
            render_spec(node_config, node_id, cluster_name, &self.config.control_plane_url)
                .map_err(|e| {
                    SequenceError::Failed(
                        LaunchFailureCategory::Internal,
                        format!("spec rendering failed: {}", e),
                    )
                })?;
        let spec_dir = std::path::Path::new(&self.config.spec_dir);
        let spec_path = spec_dir.join(format!("{}.yaml", cluster_name));
        tokio::fs::create_dir_all(spec_dir).await.map_err(|e| {
            SequenceError::Failed(
                LaunchFailureCategory::Internal,
                format!("spec dir creation failed: {}", e),
            )
        })?;
        tokio::fs::write(&spec_path, rendered).await.map_err(|e| {
            SequenceError::Failed(
                LaunchFailureCategory::Internal,
                format!("spec write failed: {}", e),
            )
        })?;

        // Step 4: invoke the launch tool, streaming its output.
        let mut child = self
            .cloud
            .launch_command(cluster_name, &spec_path.to_string_lossy())
            .spawn()
            .map_err(|e| {
                SequenceError::Failed(
                    LaunchFailureCategory::Internal,
                    format!("failed to spawn launch tool: {}", e),
                )
            })?;

        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");

        let jobs = Arc::clone(&self.jobs);
        let registry = Arc::clone(&self.registry);
        let scan_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(stage) = scanner::stage_for_line(&line) {
                    debug!(%job_id, stage = %stage, "launch stage transition");
                    jobs.update(job_id, |j| j.advance(stage, line.clone())).await;
                    if stage == LaunchJobStatus::Starting {
                        // The instance is up and the server is booting.
                        let _ = registry
                            .update_status(node_id, NodeStatus::Initializing, None)
                            .await;
                    }
                } else if scanner::is_progress_line(&line) {
                    jobs.update(job_id, |j| j.advance(j.status, line.clone())).await;
                }
            }
        });

        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut tail: Vec<String> = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                tail.push(line);
                if tail.len() > 40 {
                    tail.remove(0);
                }
            }
            tail
        });

        // Step 5: wait for exit, honouring cancellation.
        let waited = tokio::select! {
            status = child.wait() => Some(status),
            _ = token.cancelled() => None,
        };
        let status = match waited {
            Some(status) => status.map_err(|e| {
                SequenceError::Failed(
                    LaunchFailureCategory::Internal,
                    format!("launch tool wait failed: {}", e),
                )
            })?,
            None => {
                let _ = child.start_kill();
                return Err(SequenceError::Cancelled);
            }
        };

        let _ = scan_task.await;
        let stderr_tail = stderr_task.await.unwrap_or_default().join("\n");

        if !status.success() {
            let category = classify::classify_stderr(&stderr_tail);
            let last = stderr_tail.lines().last().unwrap_or("launch tool failed");
            return Err(SequenceError::Failed(
                category,
                format!("launch tool exited {}: {}", status, last),
            ));
        }

        // Step 6: verify the worker registers and answers its health check.
        self.jobs
            .update(job_id, |j| {
                j.advance(LaunchJobStatus::Verifying, "waiting for worker registration")
            })
            .await;
        self.verify_health(node_id, job_id, token).await
    }

    /// Poll for registration and a passing health check
    async fn verify_health(
        &self,
        node_id: Uuid,
        job_id: Uuid,
        token: &CancellationToken,
    ) -> std::result::Result<(), SequenceError> {
        let window = Duration::from_secs(self.config.health_check_timeout);
        let poll = Duration::from_secs(self.config.health_poll_interval.clamp(1, 5));
        let deadline = tokio::time::Instant::now() + window;

        while tokio::time::Instant::now() < deadline {
            if token.is_cancelled() {
                return Err(SequenceError::Cancelled);
            }

            let endpoint = match self.registry.snapshot(node_id) {
                Some(node) => node.endpoint_url.clone(),
                None => self
                    .db
                    .get_node(node_id)
                    .await
                    .ok()
                    .flatten()
                    .and_then(|n| n.endpoint_url),
            };

            if let Some(endpoint) = endpoint {
                let url = format!("{}/health", endpoint.trim_end_matches('/'));
                let healthy = self
                    .client
                    .get(&url)
                    .timeout(Duration::from_secs(5))
                    .send()
                    .await
                    .map(|r| r.status().is_success())
                    .unwrap_or(false);
                if healthy {
                    info!(%node_id, "worker verified healthy");
                    self.jobs
                        .update(job_id, |j| {
                            j.advance(LaunchJobStatus::Completed, "worker verified healthy")
                        })
                        .await;
                    return Ok(());
                }
            }

            tokio::time::sleep(poll).await;
        }

        Err(SequenceError::Failed(
            LaunchFailureCategory::Timeout,
            format!(
                "worker did not pass verification within {}s",
                self.config.health_check_timeout
            ),
        ))
    }

    async fn fail_node(&self, node_id: Uuid, message: &str) {
        if let Err(e) = self
            .registry
            .update_status(node_id, NodeStatus::Failed, Some(message.to_string()))
            .await
        {
            // Already terminal is fine; anything else is worth a log line.
            debug!(%node_id, "node failure transition skipped: {}", e);
        }
    }

    /// Spawn the hourly garbage collection of terminal launch jobs
    pub fn spawn_gc_loop(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(3600));
            interval.tick().await;
            loop {
                interval.tick().await;
                match orchestrator
                    .jobs
                    .gc(orchestrator.config.job_retention_hours)
                    .await
                {
                    Ok(0) => {}
                    Ok(n) => debug!(removed = n, "launch job GC"),
                    Err(e) => warn!("launch job GC failed: {}", e),
                }
            }
        })
    }
}
