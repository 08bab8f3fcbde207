//! HTTP surface tests

use crate::common::fixtures;
use actix_web::{App, test, web};
use fleetgate::server::{AppState, routes};
use fleetgate::utils::error::ErrorResponse;
use uuid::Uuid;

async fn state() -> AppState {
    AppState::build(fixtures::test_config()).await.unwrap()
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .configure(routes::health::configure_routes)
                .configure(routes::ai::configure_routes)
                .configure(routes::admin::configure_routes),
        )
        .await
    };
}

#[actix_web::test]
async fn liveness_answers() {
    let state = state().await;
    let app = app!(state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert!(resp.status().is_success());
}

#[actix_web::test]
async fn readiness_reports_storage_and_loops() {
    let state = state().await;
    let app = app!(state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/ready").to_request()).await;
    assert!(resp.status().is_success());
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ready");
    for loop_name in ["reconciler", "monitor", "meter_drain", "registry_resync"] {
        assert_eq!(
            body["loops"][loop_name]["healthy"], true,
            "loop {} not surfaced as healthy",
            loop_name
        );
    }
}

#[actix_web::test]
async fn inference_without_credentials_is_unauthenticated() {
    let state = state().await;
    let app = app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/v1/chat/completions")
            .set_json(serde_json::json!({
                "model": "llama-3-8b",
                "messages": [{"role": "user", "content": "hi"}],
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 401);
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error.error_type, "authentication_error");
}

#[actix_web::test]
async fn inference_with_unknown_key_is_unauthenticated() {
    let state = state().await;
    let app = app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/v1/chat/completions")
            .insert_header(("Authorization", "Bearer sk-fg-nonexistent"))
            .set_json(serde_json::json!({
                "model": "llama-3-8b",
                "messages": [{"role": "user", "content": "hi"}],
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 401);
}

#[actix_web::test]
async fn valid_key_with_no_workers_is_no_capacity() {
    let state = state().await;
    let seeded = fixtures::seed_principal(&state.storage, None, None).await;
    let app = app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/v1/chat/completions")
            .insert_header(("Authorization", format!("Bearer {}", seeded.bearer)))
            .set_json(serde_json::json!({
                "model": "llama-3-8b",
                "messages": [{"role": "user", "content": "hi"}],
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 503);
    assert!(resp.headers().get("X-Request-Id").is_some());
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error.code, "no_capacity");
    assert!(body.error.request_id.is_some());
}

#[actix_web::test]
async fn key_quota_boundary_is_exact() {
    let state = state().await;
    // Quota of one request per second on the key gate.
    let seeded = fixtures::seed_principal(&state.storage, Some(1), None).await;
    let app = app!(state);

    let request = |bearer: &str| {
        test::TestRequest::post()
            .uri("/v1/chat/completions")
            .insert_header(("Authorization", format!("Bearer {}", bearer)))
            .set_json(serde_json::json!({
                "model": "llama-3-8b",
                "messages": [{"role": "user", "content": "hi"}],
            }))
            .to_request()
    };

    // First request passes the limiter (and then fails on capacity).
    let first = test::call_service(&app, request(&seeded.bearer)).await;
    assert_eq!(first.status().as_u16(), 503);

    // Second request within the window is rejected by the key gate.
    let second = test::call_service(&app, request(&seeded.bearer)).await;
    assert_eq!(second.status().as_u16(), 429);
    assert!(second.headers().get("Retry-After").is_some());
    let body: ErrorResponse = test::read_body_json(second).await;
    assert_eq!(body.error.code, "rate_limited_key");
}

#[actix_web::test]
async fn model_catalog_lists_active_models() {
    let state = state().await;
    fixtures::seed_catalog(&state.storage).await;
    let app = app!(state);

    let resp =
        test::call_service(&app, test::TestRequest::get().uri("/v1/models").to_request()).await;
    assert!(resp.status().is_success());
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["object"], "list");
    assert_eq!(body["data"][0]["id"], "llama-3-8b");
}

#[actix_web::test]
async fn worker_registration_flow_over_http() {
    let state = state().await;
    fixtures::seed_catalog(&state.storage).await;
    let deployment = fixtures::seed_deployment(&state.storage, 1, 3).await;
    let app = app!(state);

    // Reserve the node the way the orchestrator does.
    let node = fleetgate::core::models::Node::launching(
        Uuid::new_v4(),
        "fg-llama-3-8b-e2e00001",
        deployment.id,
        "aws",
        "us-east-1",
        "A100-80GB",
        "p4d.24xlarge",
        true,
        "llama-3-8b",
    );
    let node_id = node.id;
    state.registry.register(node).await.unwrap();

    // The worker posts its endpoint with its assigned identity.
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/admin/nodes/register?node_id={}", node_id))
            .set_json(serde_json::json!({
                "provider": "aws",
                "region": "us-east-1",
                "model_name": "llama-3-8b",
                "endpoint_url": "http://10.0.0.4:8000",
                "gpu_type": "A100-80GB",
                "instance_type": "p4d.24xlarge",
                "spot_instance": true,
            }))
            .to_request(),
    )
    .await;
    assert!(resp.status().is_success());
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "registered");

    // Heartbeat promotes the node to active.
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/admin/nodes/{}/heartbeat", node_id))
            .set_json(serde_json::json!({
                "node_id": node_id,
                "health_score": 97,
            }))
            .to_request(),
    )
    .await;
    assert!(resp.status().is_success());

    let node = state.registry.snapshot(node_id).unwrap();
    assert_eq!(node.status, fleetgate::core::models::NodeStatus::Active);
    assert_eq!(node.health_score, 97);
}

#[actix_web::test]
async fn registration_with_unknown_id_is_not_found() {
    let state = state().await;
    let app = app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/admin/nodes/register?node_id={}", Uuid::new_v4()))
            .set_json(serde_json::json!({"endpoint_url": "http://10.0.0.4:8000"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 404);
}

#[actix_web::test]
async fn admin_surface_requires_the_token() {
    let state = state().await;
    let app = app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/admin/deployments").to_request(),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 401);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/admin/deployments")
            .insert_header(("X-Admin-Token", "test-admin-token"))
            .to_request(),
    )
    .await;
    assert!(resp.status().is_success());
}

#[actix_web::test]
async fn deployment_create_and_scale() {
    let state = state().await;
    fixtures::seed_catalog(&state.storage).await;
    let app = app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/admin/deployments")
            .insert_header(("X-Admin-Token", "test-admin-token"))
            .set_json(serde_json::json!({
                "name": "llama-east",
                "model_name": "llama-3-8b",
                "provider": "aws",
                "region": "us-east-1",
                "gpu_type": "A100-80GB",
                "instance_type": "p4d.24xlarge",
                "use_spot": true,
                "min_replicas": 1,
                "max_replicas": 4,
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 201);
    let body: serde_json::Value = test::read_body_json(resp).await;
    let id = body["id"].as_str().unwrap().to_string();

    let resp = test::call_service(
        &app,
        test::TestRequest::put()
            .uri(&format!("/admin/deployments/{}/scale", id))
            .insert_header(("X-Admin-Token", "test-admin-token"))
            .set_json(serde_json::json!({"min_replicas": 2, "max_replicas": 6}))
            .to_request(),
    )
    .await;
    assert!(resp.status().is_success());
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["min_replicas"], 2);
    assert_eq!(body["max_replicas"], 6);
}

#[actix_web::test]
async fn launch_status_for_unknown_job_is_not_found() {
    let state = state().await;
    let app = app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/admin/instances/status?job_id={}", Uuid::new_v4()))
            .insert_header(("X-Admin-Token", "test-admin-token"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 404);
}
