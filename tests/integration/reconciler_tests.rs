//! Deployment reconciliation tests

use crate::common::fixtures;
use fleetgate::config::{OrchestratorConfig, ReconcilerConfig};
use fleetgate::core::models::NodeStatus;
use fleetgate::core::orchestrator::{JobStore, WorkerOrchestrator};
use fleetgate::core::reconciler::DeploymentReconciler;
use fleetgate::core::registry::NodeRegistry;
use fleetgate::core::retirement::RetirementHandler;
use fleetgate::storage::StorageLayer;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

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
    reconciler: DeploymentReconciler,
}

async fn harness(tool: String, spec_dir: String) -> Harness {
    unsafe { std::env::set_var("AWS_ACCESS_KEY_ID", "test-access-key") };

    let storage = fixtures::storage().await;
    fixtures::seed_catalog(&storage).await;
    let registry = Arc::new(NodeRegistry::new(Arc::clone(&storage.database)));
    let orchestrator = Arc::new(WorkerOrchestrator::new(
        OrchestratorConfig {
            launch_tool: tool,
            spec_dir,
            ..Default::default()
        },
        Arc::clone(&storage.database),
        Arc::clone(&registry),
        Arc::new(JobStore::new(Arc::clone(&storage.database))),
    ));
    let retirement = Arc::new(RetirementHandler::new(
        Arc::clone(&registry),
        Arc::clone(&orchestrator),
        Arc::clone(&storage.database),
    ));
    let reconciler = DeploymentReconciler::new(
        ReconcilerConfig {
            launch_stagger: 0,
            ..Default::default()
        },
        Arc::clone(&storage.database),
        orchestrator,
        retirement,
    );

    Harness {
        storage,
        registry,
        reconciler,
    }
}

#[tokio::test]
async fn advisory_lock_is_exclusive_and_reclaimable() {
    let storage = fixtures::storage().await;
    let deployment_id = Uuid::new_v4();

    assert!(
        storage
            .db()
            .try_acquire_deployment_lock(deployment_id, "holder-a", 60)
            .await
            .unwrap()
    );
    // A second holder cannot acquire without blocking.
    assert!(
        !storage
            .db()
            .try_acquire_deployment_lock(deployment_id, "holder-b", 60)
            .await
            .unwrap()
    );
    storage
        .db()
        .release_deployment_lock(deployment_id, "holder-a")
        .await
        .unwrap();
    assert!(
        storage
            .db()
            .try_acquire_deployment_lock(deployment_id, "holder-b", 60)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn expired_lock_is_reclaimed() {
    let storage = fixtures::storage().await;
    let deployment_id = Uuid::new_v4();

    assert!(
        storage
            .db()
            .try_acquire_deployment_lock(deployment_id, "crashed-holder", 0)
            .await
            .unwrap()
    );
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(
        storage
            .db()
            .try_acquire_deployment_lock(deployment_id, "new-holder", 60)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn missing_replicas_are_launched_until_converged() {
    let dir = TempDir::new().unwrap();
    // The launch tool never finishes, keeping nodes in `launching`, which
    // still counts toward observed capacity.
    let tool = fake_tool(
        &dir,
        r#"if [ "$1" = "launch" ]; then sleep 120; fi
exit 0"#,
    );
    let h = harness(tool, dir.path().to_string_lossy().into_owned()).await;
    let deployment = fixtures::seed_deployment(&h.storage, 2, 5).await;

    h.reconciler.tick().await;
    let observed = h
        .storage
        .db()
        .count_capacity_nodes(deployment.id)
        .await
        .unwrap();
    assert_eq!(observed, 2);

    // Convergence: further sweeps do not over-provision.
    h.reconciler.tick().await;
    h.reconciler.tick().await;
    let observed = h
        .storage
        .db()
        .count_capacity_nodes(deployment.id)
        .await
        .unwrap();
    assert_eq!(observed, 2);

    let row = h
        .storage
        .db()
        .get_deployment(deployment.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.current_replicas, 2);
}

#[tokio::test]
async fn surplus_replicas_are_drained_newest_first() {
    let dir = TempDir::new().unwrap();
    let tool = fake_tool(&dir, "exit 0");
    let h = harness(tool, dir.path().to_string_lossy().into_owned()).await;
    let deployment = fixtures::seed_deployment(&h.storage, 1, 5).await;

    let _older = fixtures::seed_active_node(&h.registry, deployment.id, "http://n1:8000").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let newer = fixtures::seed_active_node(&h.registry, deployment.id, "http://n2:8000").await;

    h.reconciler.tick().await;

    // The newest node drains first; the retirement runs asynchronously.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let node = h.storage.db().get_node(newer).await.unwrap().unwrap();
        if matches!(node.status, NodeStatus::Draining | NodeStatus::Terminated) {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "surplus node was never drained (status {})",
            node.status
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

#[tokio::test]
async fn paused_deployments_are_ignored() {
    let dir = TempDir::new().unwrap();
    let tool = fake_tool(&dir, "sleep 120");
    let h = harness(tool, dir.path().to_string_lossy().into_owned()).await;
    let deployment = fixtures::seed_deployment(&h.storage, 3, 5).await;
    h.storage
        .db()
        .set_deployment_status(
            deployment.id,
            fleetgate::core::models::DeploymentStatus::Paused,
        )
        .await
        .unwrap();

    h.reconciler.tick().await;
    let observed = h
        .storage
        .db()
        .count_capacity_nodes(deployment.id)
        .await
        .unwrap();
    assert_eq!(observed, 0);
}
