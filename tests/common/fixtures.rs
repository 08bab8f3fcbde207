//! Test fixtures and data factories
//!
//! Factories create real objects over an in-memory SQLite store and a
//! no-op Redis pool, not mocks.

use chrono::Utc;
use fleetgate::auth::Principal;
use fleetgate::config::{Config, DatabaseConfig};
use fleetgate::core::models::{
    ApiKey, Deployment, DeploymentStatus, Environment, KeyStatus, ModelSpec, ModelStatus, Node,
    NodeStatus, PlacementStrategy, Region, Tenant, TenantStatus, fingerprint,
};
use fleetgate::core::registry::NodeRegistry;
use fleetgate::storage::StorageLayer;
use std::sync::Arc;
use uuid::Uuid;

/// Control-plane configuration for tests: in-memory store, no Redis
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.storage.database = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        connection_timeout: 5,
    };
    config.storage.redis.enabled = false;
    config.auth.admin_token = "test-admin-token".to_string();
    config.reconciler.launch_stagger = 0;
    config
}

/// Connected and migrated storage layer for tests
pub async fn storage() -> Arc<StorageLayer> {
    let config = test_config();
    let storage = StorageLayer::new(&config.storage).await.unwrap();
    storage.migrate().await.unwrap();
    Arc::new(storage)
}

/// Seed the model and region catalog used by most scenarios
pub async fn seed_catalog(storage: &StorageLayer) {
    storage
        .db()
        .upsert_model(&ModelSpec {
            name: "llama-3-8b".to_string(),
            family: "llama-3".to_string(),
            size_class: "8b".to_string(),
            min_gpu_memory_gb: 24,
            status: ModelStatus::Active,
        })
        .await
        .unwrap();
    storage
        .db()
        .upsert_region(&Region {
            name: "us-east-1".to_string(),
            provider: "aws".to_string(),
        })
        .await
        .unwrap();
}

/// Seeded principal chain plus the bearer secret that resolves to it
pub struct SeededPrincipal {
    pub bearer: String,
    pub tenant_id: Uuid,
    pub environment_id: Uuid,
    pub key_id: Uuid,
}

/// Insert an active tenant/environment/key chain
pub async fn seed_principal(
    storage: &StorageLayer,
    key_rps: Option<u32>,
    key_concurrency: Option<u32>,
) -> SeededPrincipal {
    let bearer = format!("sk-fg-{}", Uuid::new_v4().simple());
    let tenant_id = Uuid::new_v4();
    let environment_id = Uuid::new_v4();
    let key_id = Uuid::new_v4();
    let now = Utc::now();

    storage
        .db()
        .insert_tenant(&Tenant {
            id: tenant_id,
            name: format!("tenant-{}", &tenant_id.simple().to_string()[..8]),
            status: TenantStatus::Active,
            rps_override: None,
            tokens_per_minute_override: None,
            created_at: now,
        })
        .await
        .unwrap();
    storage
        .db()
        .insert_environment(&Environment {
            id: environment_id,
            tenant_id,
            name: "prod".to_string(),
            region_preference: None,
            rps_override: None,
            created_at: now,
        })
        .await
        .unwrap();
    storage
        .db()
        .insert_api_key(&ApiKey {
            id: key_id,
            fingerprint: fingerprint(&bearer),
            environment_id,
            status: KeyStatus::Active,
            rps_override: key_rps,
            concurrency_override: key_concurrency,
            created_at: now,
        })
        .await
        .unwrap();

    SeededPrincipal {
        bearer,
        tenant_id,
        environment_id,
        key_id,
    }
}

/// An in-memory principal for components that do not consult the store
pub fn principal() -> Principal {
    let tenant_id = Uuid::new_v4();
    let environment_id = Uuid::new_v4();
    Principal {
        tenant: Tenant {
            id: tenant_id,
            name: "acme".to_string(),
            status: TenantStatus::Active,
            rps_override: None,
            tokens_per_minute_override: None,
            created_at: Utc::now(),
        },
        environment: Environment {
            id: environment_id,
            tenant_id,
            name: "prod".to_string(),
            region_preference: None,
            rps_override: None,
            created_at: Utc::now(),
        },
        key: ApiKey {
            id: Uuid::new_v4(),
            fingerprint: "fp".to_string(),
            environment_id,
            status: KeyStatus::Active,
            rps_override: None,
            concurrency_override: None,
            created_at: Utc::now(),
        },
    }
}

/// Insert a deployment row
pub async fn seed_deployment(
    storage: &StorageLayer,
    min_replicas: u32,
    max_replicas: u32,
) -> Deployment {
    let now = Utc::now();
    let deployment = Deployment {
        id: Uuid::new_v4(),
        name: format!("llama-east-{}", &Uuid::new_v4().simple().to_string()[..8]),
        model_name: "llama-3-8b".to_string(),
        provider: "aws".to_string(),
        region: "us-east-1".to_string(),
        gpu_type: "A100-80GB".to_string(),
        instance_type: "p4d.24xlarge".to_string(),
        use_spot: true,
        min_replicas,
        max_replicas,
        current_replicas: 0,
        strategy: PlacementStrategy::Spread,
        status: DeploymentStatus::Active,
        created_at: now,
        updated_at: now,
    };
    storage.db().insert_deployment(&deployment).await.unwrap();
    deployment
}

/// Register an active, heartbeating node serving `llama-3-8b`
pub async fn seed_active_node(
    registry: &NodeRegistry,
    deployment_id: Uuid,
    endpoint: &str,
) -> Uuid {
    let node = Node::launching(
        Uuid::new_v4(),
        format!("fg-llama-3-8b-{}", &Uuid::new_v4().simple().to_string()[..8]),
        deployment_id,
        "aws",
        "us-east-1",
        "A100-80GB",
        "p4d.24xlarge",
        true,
        "llama-3-8b",
    );
    let node_id = node.id;
    registry.register(node).await.unwrap();
    registry.mark_ready(node_id, endpoint).await.unwrap();
    let active = registry
        .record_heartbeat(node_id, 90, None)
        .await
        .unwrap();
    assert_eq!(active.status, NodeStatus::Active);
    node_id
}
