//! Deployment management endpoints

use crate::core::models::{Deployment, DeploymentStatus, NodeStatus, PlacementStrategy};
use crate::core::retirement::RetirementReason;
use crate::server::state::AppState;
use crate::utils::error::{FleetError, Result};
use actix_web::{HttpRequest, HttpResponse, web};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateDeploymentBody {
    pub name: String,
    pub model_name: String,
    pub provider: String,
    pub region: String,
    pub gpu_type: String,
    pub instance_type: String,
    #[serde(default)]
    pub use_spot: bool,
    #[serde(default)]
    pub min_replicas: u32,
    #[serde(default = "default_max_replicas")]
    pub max_replicas: u32,
    #[serde(default)]
    pub strategy: PlacementStrategy,
}

fn default_max_replicas() -> u32 {
    1
}

/// Create a deployment
pub async fn create(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<CreateDeploymentBody>,
) -> Result<HttpResponse> {
    super::require_admin(&state, &req)?;
    let body = body.into_inner();

    if body.min_replicas > body.max_replicas {
        return Err(FleetError::Validation(
            "min_replicas cannot exceed max_replicas".into(),
        ));
    }
    if state.storage.db().get_model(&body.model_name).await?.is_none() {
        return Err(FleetError::invalid_request(format!(
            "unknown model {}",
            body.model_name
        )));
    }
    if state.storage.db().get_region(&body.region).await?.is_none() {
        return Err(FleetError::invalid_request(format!(
            "unknown region {}",
            body.region
        )));
    }

    let now = Utc::now();
    let deployment = Deployment {
        id: Uuid::new_v4(),
        name: body.name,
        model_name: body.model_name,
        provider: body.provider,
        region: body.region,
        gpu_type: body.gpu_type,
        instance_type: body.instance_type,
        use_spot: body.use_spot,
        min_replicas: body.min_replicas,
        max_replicas: body.max_replicas,
        current_replicas: 0,
        strategy: body.strategy,
        status: DeploymentStatus::Active,
        created_at: now,
        updated_at: now,
    };
    state.storage.db().insert_deployment(&deployment).await?;

    info!(deployment = %deployment.id, name = %deployment.name, "deployment created");
    Ok(HttpResponse::Created().json(deployment))
}

/// List all deployments
pub async fn list(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    super::require_admin(&state, &req)?;
    let deployments = state.storage.db().list_deployments().await?;
    Ok(HttpResponse::Ok().json(deployments))
}

#[derive(Debug, Deserialize)]
pub struct ScaleBody {
    pub min_replicas: u32,
    pub max_replicas: u32,
}

/// Update a deployment's replica bounds
pub async fn scale(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<ScaleBody>,
) -> Result<HttpResponse> {
    super::require_admin(&state, &req)?;
    let body = body.into_inner();
    if body.min_replicas > body.max_replicas {
        return Err(FleetError::Validation(
            "min_replicas cannot exceed max_replicas".into(),
        ));
    }

    let deployment = state
        .storage
        .db()
        .update_deployment_scale(path.into_inner(), body.min_replicas, body.max_replicas)
        .await?;
    Ok(HttpResponse::Ok().json(deployment))
}

/// Retire a deployment
///
/// Deletion cascades to a termination request for every live replica; the
/// deployment row itself is retained in `paused` state, and node rows are
/// soft-retired.
pub async fn delete(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    super::require_admin(&state, &req)?;
    let deployment_id = path.into_inner();

    state
        .storage
        .db()
        .set_deployment_status(deployment_id, DeploymentStatus::Paused)
        .await?;

    let nodes = state.storage.db().list_nodes_by_deployment(deployment_id).await?;
    let mut retired = 0usize;
    for node in nodes {
        if node.status.is_terminal() || node.status == NodeStatus::Draining {
            continue;
        }
        retired += 1;
        let retirement = Arc::clone(&state.retirement);
        tokio::spawn(async move {
            if let Err(e) = retirement
                .retire(node.id, RetirementReason::ScaleDown, false)
                .await
            {
                warn!(node = %node.id, "deployment teardown retirement failed: {}", e);
            }
        });
    }

    info!(deployment = %deployment_id, retiring = retired, "deployment deleted");
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "deleted",
        "retiring_nodes": retired,
    })))
}
