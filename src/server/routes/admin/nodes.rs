//! Worker-facing node endpoints

use crate::core::retirement::RetirementReason;
use crate::server::state::AppState;
use crate::utils::error::{FleetError, Result};
use actix_web::{HttpResponse, web};
use dashmap::DashSet;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Unknown payload fields already logged once per field name
static LOGGED_UNKNOWN_FIELDS: Lazy<DashSet<String>> = Lazy::new(DashSet::new);

fn log_unknown_fields(endpoint: &str, extra: &serde_json::Map<String, serde_json::Value>) {
    for field in extra.keys() {
        let key = format!("{}:{}", endpoint, field);
        if LOGGED_UNKNOWN_FIELDS.insert(key) {
            warn!(endpoint, field, "ignoring unrecognized payload field");
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterQuery {
    node_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    pub endpoint_url: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub gpu_type: Option<String>,
    #[serde(default)]
    pub instance_type: Option<String>,
    #[serde(default)]
    pub spot_instance: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Worker registration, invoked once the worker boots
///
/// Validates that the claimed node ID exists in `launching` or
/// `initializing`, then transitions it to `ready` with the endpoint
/// recorded. This is the moment the worker becomes schedulable.
pub async fn register_node(
    state: web::Data<AppState>,
    query: web::Query<RegisterQuery>,
    body: web::Json<RegisterBody>,
) -> Result<HttpResponse> {
    let body = body.into_inner();
    log_unknown_fields("register", &body.extra);

    if body.endpoint_url.is_empty() {
        return Err(FleetError::invalid_request("endpoint_url is required"));
    }
    url::Url::parse(&body.endpoint_url)
        .map_err(|e| FleetError::invalid_request(format!("endpoint_url is invalid: {}", e)))?;

    // A worker claiming the wrong model is misconfigured; refuse before it
    // becomes schedulable.
    if let Some(node) = state.registry.snapshot(query.node_id) {
        if let Some(model) = &body.model_name {
            if model != &node.model_name {
                return Err(FleetError::invalid_request(format!(
                    "worker claims model {} but node {} serves {}",
                    model, node.id, node.model_name
                )));
            }
        }
    }

    let node = state
        .registry
        .mark_ready(query.node_id, &body.endpoint_url)
        .await?;

    info!(
        node = %node.id,
        endpoint = %body.endpoint_url,
        provider = ?body.provider,
        region = ?body.region,
        gpu = ?body.gpu_type,
        instance = ?body.instance_type,
        spot = ?body.spot_instance,
        "worker registered"
    );
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "registered",
        "node_id": node.id,
    })))
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatBody {
    #[serde(default)]
    pub node_id: Option<Uuid>,
    pub health_score: u8,
    #[serde(default)]
    pub status_message: Option<String>,
    #[serde(default)]
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Push heartbeat from the worker agent
pub async fn heartbeat(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<HeartbeatBody>,
) -> Result<HttpResponse> {
    let node_id = path.into_inner();
    let body = body.into_inner();
    log_unknown_fields("heartbeat", &body.extra);

    if let Some(claimed) = body.node_id {
        if claimed != node_id {
            return Err(FleetError::invalid_request(
                "body node_id does not match the path",
            ));
        }
    }
    if let Some(sent_at) = body.timestamp {
        let skew = (chrono::Utc::now() - sent_at).num_seconds().abs();
        if skew > 60 {
            warn!(node = %node_id, skew, "heartbeat timestamp skew exceeds 60s");
        }
    }

    state
        .registry
        .record_heartbeat(node_id, body.health_score, body.status_message)
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"status": "ok"})))
}

#[derive(Debug, Deserialize)]
pub struct TerminationWarningBody {
    #[serde(default)]
    pub provider: Option<String>,
    /// Seconds until the provider reclaims the instance
    #[serde(default)]
    pub eta: Option<u64>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Spot termination warning relayed by the worker agent
pub async fn termination_warning(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<TerminationWarningBody>,
) -> Result<HttpResponse> {
    let node_id = path.into_inner();
    let body = body.into_inner();
    log_unknown_fields("termination-warning", &body.extra);

    info!(
        node = %node_id,
        provider = ?body.provider,
        eta = ?body.eta,
        reason = ?body.reason,
        "spot termination warning received"
    );

    let retirement = Arc::clone(&state.retirement);
    let eta_secs = body.eta;
    tokio::spawn(async move {
        if let Err(e) = retirement
            .retire(node_id, RetirementReason::SpotWarning { eta_secs }, true)
            .await
        {
            warn!(node = %node_id, "spot retirement failed: {}", e);
        }
    });

    Ok(HttpResponse::Ok().json(serde_json::json!({"status": "draining"})))
}
