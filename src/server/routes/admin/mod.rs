//! Control surface for workers and operators
//!
//! Worker-facing endpoints (register, heartbeat, termination-warning)
//! authenticate by node-ID knowledge: the ID is assigned before launch and
//! handed to the worker through its launch spec. Operator endpoints
//! require the shared admin token, compared in constant time.

mod deployments;
mod instances;
mod nodes;

use crate::server::state::AppState;
use crate::utils::constant_time_eq;
use crate::utils::error::{FleetError, Result};
use actix_web::{HttpRequest, web};

/// Configure the `/admin` routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/nodes/register", web::post().to(nodes::register_node))
            .route(
                "/nodes/{node_id}/heartbeat",
                web::post().to(nodes::heartbeat),
            )
            .route(
                "/nodes/{node_id}/termination-warning",
                web::post().to(nodes::termination_warning),
            )
            .route("/deployments", web::post().to(deployments::create))
            .route("/deployments", web::get().to(deployments::list))
            .route(
                "/deployments/{id}/scale",
                web::put().to(deployments::scale),
            )
            .route("/deployments/{id}", web::delete().to(deployments::delete))
            .route("/instances/launch", web::post().to(instances::launch))
            .route("/instances/status", web::get().to(instances::status))
            .route(
                "/instances/{job_id}",
                web::delete().to(instances::cancel),
            ),
    );
}

/// Require the shared admin token (`X-Admin-Token`, constant-time compare)
pub(super) fn require_admin(state: &AppState, req: &HttpRequest) -> Result<()> {
    let configured = state.config.auth.admin_token.as_bytes();
    if configured.is_empty() {
        return Err(FleetError::Forbidden(
            "admin surface disabled: no admin token configured".into(),
        ));
    }

    let provided = req
        .headers()
        .get("x-admin-token")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    if constant_time_eq(provided.as_bytes(), configured) {
        Ok(())
    } else {
        Err(FleetError::Unauthenticated("invalid admin token".into()))
    }
}
