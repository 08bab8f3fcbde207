//! Liveness and readiness endpoints

use crate::server::state::AppState;
use actix_web::{HttpResponse, web};

/// Configure the health routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/ready", web::get().to(ready));
}

/// Liveness: the process is up
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness: storage reachable and supervised loops within tolerance
pub async fn ready(state: web::Data<AppState>) -> HttpResponse {
    let storage = state.storage.health_check().await;
    let reconciler = state.reconciler_health.snapshot();
    let monitor = state.monitor_health.snapshot();
    let meter_drain = state.meter_health.snapshot();
    let registry_resync = state.resync_health.snapshot();
    let loops_healthy =
        reconciler.healthy && monitor.healthy && meter_drain.healthy && registry_resync.healthy;
    let ready = storage.database && loops_healthy;

    let payload = serde_json::json!({
        "status": if ready { "ready" } else { "degraded" },
        "storage": storage,
        "loops": {
            "reconciler": reconciler,
            "monitor": monitor,
            "meter_drain": meter_drain,
            "registry_resync": registry_resync,
        },
    });

    if ready {
        HttpResponse::Ok().json(payload)
    } else {
        HttpResponse::ServiceUnavailable().json(payload)
    }
}
