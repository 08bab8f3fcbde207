//! Instance launch endpoints

use crate::core::models::{Deployment, DeploymentStatus, PlacementStrategy};
use crate::core::orchestrator::NodeConfig;
use crate::server::state::AppState;
use crate::utils::error::Result;
use actix_web::{HttpRequest, HttpResponse, web};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct LaunchBody {
    pub model_name: String,
    pub provider: String,
    pub region: String,
    pub instance_type: String,
    #[serde(default)]
    pub use_spot: bool,
    /// Accelerator class; defaults to the fleet's standard class
    #[serde(default = "default_gpu_type")]
    pub gpu_type: String,
}

fn default_gpu_type() -> String {
    "A100-80GB".to_string()
}

/// Launch one worker instance
///
/// Ad-hoc launches are parented to a matching deployment when one exists;
/// otherwise a paused ad-hoc deployment is created so the node still has
/// an owner without the reconciler fighting manual capacity.
pub async fn launch(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<LaunchBody>,
) -> Result<HttpResponse> {
    super::require_admin(&state, &req)?;
    let body = body.into_inner();

    let deployment = find_or_create_deployment(&state, &body).await?;
    let handle = state
        .orchestrator
        .launch(NodeConfig {
            deployment_id: deployment.id,
            model_name: body.model_name,
            provider: body.provider,
            region: body.region,
            gpu_type: body.gpu_type,
            instance_type: body.instance_type,
            use_spot: body.use_spot,
            placement: deployment.strategy,
        })
        .await?;

    info!(job = %handle.job_id, node = %handle.node_id, "instance launch accepted");
    Ok(HttpResponse::Accepted().json(serde_json::json!({
        "job_id": handle.job_id,
        "node_id": handle.node_id,
        "status": "launching",
    })))
}

async fn find_or_create_deployment(state: &AppState, body: &LaunchBody) -> Result<Deployment> {
    let existing = state
        .storage
        .db()
        .list_deployments()
        .await?
        .into_iter()
        .find(|d| {
            d.model_name == body.model_name
                && d.provider == body.provider
                && d.region == body.region
        });
    if let Some(deployment) = existing {
        return Ok(deployment);
    }

    let now = Utc::now();
    let deployment = Deployment {
        id: Uuid::new_v4(),
        name: format!("adhoc-{}-{}", body.model_name, body.region),
        model_name: body.model_name.clone(),
        provider: body.provider.clone(),
        region: body.region.clone(),
        gpu_type: body.gpu_type.clone(),
        instance_type: body.instance_type.clone(),
        use_spot: body.use_spot,
        min_replicas: 0,
        max_replicas: 100,
        current_replicas: 0,
        strategy: PlacementStrategy::Spread,
        status: DeploymentStatus::Paused,
        created_at: now,
        updated_at: now,
    };
    state.storage.db().insert_deployment(&deployment).await?;
    Ok(deployment)
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    job_id: Uuid,
}

/// Launch job progress
pub async fn status(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<StatusQuery>,
) -> Result<HttpResponse> {
    super::require_admin(&state, &req)?;

    let Some(job) = state.orchestrator.job(query.job_id).await? else {
        return Err(crate::utils::error::FleetError::not_found(format!(
            "launch job {}",
            query.job_id
        )));
    };

    let stages: Vec<serde_json::Value> = job
        .stages
        .iter()
        .map(|s| {
            serde_json::json!({
                "at": s.at,
                "stage": s.stage.to_string(),
                "message": s.message,
            })
        })
        .collect();

    let mut payload = serde_json::json!({
        "job_id": job.id,
        "node_id": job.node_id,
        "status": job.status.to_string(),
        "stage": if job.error.is_some() { "error".to_string() } else { job.status.to_string() },
        "progress": job.percent,
        "stages": stages,
    });
    if let Some(error) = &job.error {
        payload["error"] = serde_json::json!({
            "category": error.category,
            "message": error.message,
            "remediation": error.remediation,
        });
    }

    Ok(HttpResponse::Ok().json(payload))
}

/// Cancel a running launch
pub async fn cancel(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    super::require_admin(&state, &req)?;
    state.orchestrator.cancel(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"status": "cancelling"})))
}
