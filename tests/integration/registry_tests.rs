//! Node registry lifecycle tests

use crate::common::fixtures;
use fleetgate::core::models::{Node, NodeStatus};
use fleetgate::core::registry::NodeRegistry;
use fleetgate::utils::error::FleetError;
use std::sync::Arc;
use uuid::Uuid;

async fn setup() -> (Arc<fleetgate::storage::StorageLayer>, NodeRegistry, Uuid) {
    let storage = fixtures::storage().await;
    fixtures::seed_catalog(&storage).await;
    let deployment = fixtures::seed_deployment(&storage, 1, 3).await;
    let registry = NodeRegistry::new(Arc::clone(&storage.database));
    (storage, registry, deployment.id)
}

fn launching_node(deployment_id: Uuid) -> Node {
    Node::launching(
        Uuid::new_v4(),
        format!("fg-test-{}", &Uuid::new_v4().simple().to_string()[..8]),
        deployment_id,
        "aws",
        "us-east-1",
        "A100-80GB",
        "p4d.24xlarge",
        true,
        "llama-3-8b",
    )
}

#[tokio::test]
async fn launch_register_heartbeat_lifecycle() {
    let (_storage, registry, deployment_id) = setup().await;
    let node = launching_node(deployment_id);
    let node_id = node.id;

    registry.register(node).await.unwrap();
    assert_eq!(
        registry.snapshot(node_id).unwrap().status,
        NodeStatus::Launching
    );

    // Worker boots and registers with its endpoint.
    let ready = registry
        .mark_ready(node_id, "http://10.0.0.4:8000")
        .await
        .unwrap();
    assert_eq!(ready.status, NodeStatus::Ready);
    assert_eq!(ready.endpoint_url.as_deref(), Some("http://10.0.0.4:8000"));

    // First heartbeat promotes ready to active.
    let active = registry.record_heartbeat(node_id, 95, None).await.unwrap();
    assert_eq!(active.status, NodeStatus::Active);
    assert_eq!(active.health_score, 95);
    assert!(active.last_heartbeat.is_some());
}

#[tokio::test]
async fn registration_is_rejected_for_terminal_nodes() {
    let (_storage, registry, deployment_id) = setup().await;
    let node = launching_node(deployment_id);
    let node_id = node.id;
    registry.register(node).await.unwrap();

    registry
        .update_status(node_id, NodeStatus::Failed, Some("launch failed".into()))
        .await
        .unwrap();

    let err = registry
        .mark_ready(node_id, "http://10.0.0.4:8000")
        .await
        .unwrap_err();
    assert!(matches!(err, FleetError::Conflict(_)));
}

#[tokio::test]
async fn terminal_states_are_immutable() {
    let (storage, registry, deployment_id) = setup().await;
    let node = launching_node(deployment_id);
    let node_id = node.id;
    registry.register(node).await.unwrap();
    registry.mark_ready(node_id, "http://n:8000").await.unwrap();
    registry.terminate(node_id, "test retirement").await.unwrap();

    // The row survives for audit with its endpoint cleared.
    let row = storage.db().get_node(node_id).await.unwrap().unwrap();
    assert_eq!(row.status, NodeStatus::Terminated);
    assert!(row.endpoint_url.is_none());

    // No transition out of terminated, heartbeats included.
    for next in [NodeStatus::Active, NodeStatus::Ready, NodeStatus::Failed] {
        let err = registry.update_status(node_id, next, None).await.unwrap_err();
        assert!(matches!(err, FleetError::Conflict(_)), "{} allowed", next);
    }
    assert!(registry.record_heartbeat(node_id, 50, None).await.is_err());
}

#[tokio::test]
async fn cluster_names_are_unique() {
    let (_storage, registry, deployment_id) = setup().await;
    let node = launching_node(deployment_id);
    let mut twin = launching_node(deployment_id);
    twin.cluster_name = node.cluster_name.clone();

    registry.register(node).await.unwrap();
    assert!(registry.register(twin).await.is_err());
}

#[tokio::test]
async fn index_rebuild_restores_live_nodes_only() {
    let (storage, registry, deployment_id) = setup().await;
    let live = launching_node(deployment_id);
    let dead = launching_node(deployment_id);
    let live_id = live.id;
    let dead_id = dead.id;
    registry.register(live).await.unwrap();
    registry.register(dead).await.unwrap();
    registry.mark_ready(live_id, "http://n:8000").await.unwrap();
    registry
        .update_status(dead_id, NodeStatus::Failed, None)
        .await
        .unwrap();

    // A fresh registry over the same store sees only the live node.
    let rebuilt = NodeRegistry::new(Arc::clone(&storage.database));
    let count = rebuilt.rebuild().await.unwrap();
    assert_eq!(count, 1);
    assert!(rebuilt.snapshot(live_id).is_some());
    assert!(rebuilt.snapshot(dead_id).is_none());
}

#[tokio::test]
async fn heartbeat_for_unknown_node_is_not_found() {
    let (_storage, registry, _deployment_id) = setup().await;
    let err = registry
        .record_heartbeat(Uuid::new_v4(), 80, None)
        .await
        .unwrap_err();
    assert!(matches!(err, FleetError::NotFound(_)));
}
