//! Launch orchestration tests with a scripted cloud tool

use crate::common::fixtures;
use fleetgate::config::OrchestratorConfig;
use fleetgate::core::models::{LaunchJobStatus, NodeStatus, PlacementStrategy};
use fleetgate::core::orchestrator::{JobStore, NodeConfig, WorkerOrchestrator};
use fleetgate::core::registry::NodeRegistry;
use fleetgate::storage::StorageLayer;
use fleetgate::utils::error::{FleetError, LaunchFailureCategory};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Write an executable fake launch tool
fn fake_tool(dir: &TempDir, script_body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.path().join("fake-launch-tool");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", script_body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().into_owned()
}

struct Harness {
    storage: Arc<StorageLayer>,
    registry: Arc<NodeRegistry>,
    orchestrator: Arc<WorkerOrchestrator>,
    deployment_id: Uuid,
    _spec_dir: TempDir,
}

async fn harness(tool_dir: &TempDir, tool: String) -> Harness {
    // The pre-flight check only verifies credential presence.
    unsafe { std::env::set_var("AWS_ACCESS_KEY_ID", "test-access-key") };

    let storage = fixtures::storage().await;
    fixtures::seed_catalog(&storage).await;
    let deployment = fixtures::seed_deployment(&storage, 1, 3).await;
    let registry = Arc::new(NodeRegistry::new(Arc::clone(&storage.database)));

    let spec_dir = TempDir::new_in(tool_dir.path()).unwrap();
    let config = OrchestratorConfig {
        launch_tool: tool,
        spec_dir: spec_dir.path().to_string_lossy().into_owned(),
        health_check_timeout: 20,
        health_poll_interval: 1,
        ..Default::default()
    };

    let jobs = Arc::new(JobStore::new(Arc::clone(&storage.database)));
    let orchestrator = Arc::new(WorkerOrchestrator::new(
        config,
        Arc::clone(&storage.database),
        Arc::clone(&registry),
        jobs,
    ));

    Harness {
        storage,
        registry,
        orchestrator,
        deployment_id: deployment.id,
        _spec_dir: spec_dir,
    }
}

fn node_config(deployment_id: Uuid) -> NodeConfig {
    NodeConfig {
        deployment_id,
        model_name: "llama-3-8b".to_string(),
        provider: "aws".to_string(),
        region: "us-east-1".to_string(),
        gpu_type: "A100-80GB".to_string(),
        instance_type: "p4d.24xlarge".to_string(),
        use_spot: true,
        placement: PlacementStrategy::Spread,
    }
}

async fn wait_for_terminal(
    orchestrator: &WorkerOrchestrator,
    job_id: Uuid,
    timeout: Duration,
) -> fleetgate::core::models::LaunchJob {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let job = orchestrator.job(job_id).await.unwrap().unwrap();
        if job.status.is_terminal() {
            return job;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {} never reached a terminal state (status {})",
            job_id,
            job.status
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

#[tokio::test]
async fn no_capacity_failure_is_classified_with_remediation() {
    let dir = TempDir::new().unwrap();
    let tool = fake_tool(
        &dir,
        r#"echo "Launching a new cluster..."
echo "Failed to acquire resources in all zones in us-east-1." >&2
exit 1"#,
    );
    let h = harness(&dir, tool).await;

    let handle = h
        .orchestrator
        .launch(node_config(h.deployment_id))
        .await
        .unwrap();
    let job = wait_for_terminal(&h.orchestrator, handle.job_id, Duration::from_secs(10)).await;

    assert_eq!(job.status, LaunchJobStatus::Failed);
    let error = job.error.expect("classified error");
    assert_eq!(error.category, LaunchFailureCategory::NoCapacity);
    assert!(!error.remediation.is_empty());

    // The scanner saw the provisioning marker before the failure.
    assert!(
        job.stages
            .iter()
            .any(|s| s.stage == LaunchJobStatus::Provisioning)
    );

    // The node row is failed with no endpoint.
    let node = h.storage.db().get_node(handle.node_id).await.unwrap().unwrap();
    assert_eq!(node.status, NodeStatus::Failed);
    assert!(node.endpoint_url.is_none());
}

#[tokio::test]
async fn successful_launch_completes_after_worker_registers() {
    let dir = TempDir::new().unwrap();
    let tool = fake_tool(
        &dir,
        r#"if [ "$1" = "launch" ]; then
  echo "Launching a new cluster..."
  echo "Running setup on 1 node."
  echo "Starting vLLM server on port 8000"
fi
exit 0"#,
    );
    let h = harness(&dir, tool).await;

    // The "worker" is a stub answering its health endpoint.
    let worker = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&worker)
        .await;

    let handle = h
        .orchestrator
        .launch(node_config(h.deployment_id))
        .await
        .unwrap();

    // Node ID stability: the row created before launch is the identity the
    // worker registers with.
    tokio::time::sleep(Duration::from_millis(300)).await;
    h.registry
        .mark_ready(handle.node_id, &worker.uri())
        .await
        .unwrap();

    let job = wait_for_terminal(&h.orchestrator, handle.job_id, Duration::from_secs(15)).await;
    assert_eq!(job.status, LaunchJobStatus::Completed);
    assert_eq!(job.percent, 100);

    let node = h.storage.db().get_node(handle.node_id).await.unwrap().unwrap();
    assert_eq!(node.status, NodeStatus::Ready);
    assert_eq!(node.endpoint_url.as_deref(), Some(worker.uri().as_str()));
}

#[tokio::test]
async fn verification_window_exhaustion_fails_the_job() {
    let dir = TempDir::new().unwrap();
    let tool = fake_tool(&dir, "exit 0");
    let h = harness(&dir, tool).await;
    // Shrink the verification window so the test stays fast; the worker
    // never registers.
    let orchestrator = {
        let config = OrchestratorConfig {
            launch_tool: fake_tool(&dir, "exit 0"),
            spec_dir: dir.path().to_string_lossy().into_owned(),
            health_check_timeout: 2,
            health_poll_interval: 1,
            ..Default::default()
        };
        Arc::new(WorkerOrchestrator::new(
            config,
            Arc::clone(&h.storage.database),
            Arc::clone(&h.registry),
            Arc::new(JobStore::new(Arc::clone(&h.storage.database))),
        ))
    };

    let handle = orchestrator.launch(node_config(h.deployment_id)).await.unwrap();
    let job = wait_for_terminal(&orchestrator, handle.job_id, Duration::from_secs(15)).await;

    assert_eq!(job.status, LaunchJobStatus::Timeout);
    assert_eq!(
        job.error.unwrap().category,
        LaunchFailureCategory::Timeout
    );
}

#[tokio::test]
async fn missing_credentials_reject_before_any_node_row() {
    let dir = TempDir::new().unwrap();
    let tool = fake_tool(&dir, "exit 0");
    let h = harness(&dir, tool).await;

    let mut config = node_config(h.deployment_id);
    config.provider = "gcp".to_string();
    unsafe { std::env::remove_var("GOOGLE_APPLICATION_CREDENTIALS") };

    let err = h.orchestrator.launch(config).await.unwrap_err();
    assert!(matches!(
        err,
        FleetError::LaunchFailed {
            category: LaunchFailureCategory::Credentials,
            ..
        }
    ));
}

#[tokio::test]
async fn unknown_model_is_an_invalid_request() {
    let dir = TempDir::new().unwrap();
    let tool = fake_tool(&dir, "exit 0");
    let h = harness(&dir, tool).await;

    let mut config = node_config(h.deployment_id);
    config.model_name = "model-that-does-not-exist".to_string();
    let err = h.orchestrator.launch(config).await.unwrap_err();
    assert!(matches!(err, FleetError::InvalidRequest(_)));
}

#[tokio::test]
async fn cancellation_terminates_the_launch() {
    let dir = TempDir::new().unwrap();
    let tool = fake_tool(
        &dir,
        r#"if [ "$1" = "launch" ]; then
  echo "Launching a new cluster..."
  sleep 60
fi
exit 0"#,
    );
    let h = harness(&dir, tool).await;

    let handle = h
        .orchestrator
        .launch(node_config(h.deployment_id))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    h.orchestrator.cancel(handle.job_id).await.unwrap();

    let job = wait_for_terminal(&h.orchestrator, handle.job_id, Duration::from_secs(10)).await;
    assert_eq!(job.status, LaunchJobStatus::Cancelled);

    let node = h.storage.db().get_node(handle.node_id).await.unwrap().unwrap();
    assert_eq!(node.status, NodeStatus::Failed);
}
