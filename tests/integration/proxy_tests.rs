//! Inference proxy tests against stubbed workers

use crate::common::fixtures;
use fleetgate::config::{ProxyConfig, RateLimitsConfig, SchedulerConfig};
use fleetgate::core::limiter::RateLimiter;
use fleetgate::core::meter::UsageMeter;
use fleetgate::core::models::openai::InferenceRequest;
use fleetgate::core::proxy::{InferenceProxy, ProxyOutcome};
use fleetgate::core::registry::{InFlightGuard, NodeRegistry};
use fleetgate::core::scheduler::Scheduler;
use fleetgate::storage::StorageLayer;
use fleetgate::storage::redis::RedisPool;
use fleetgate::utils::error::FleetError;
use futures::StreamExt;
use std::sync::Arc;
use uuid::Uuid;
use wiremock::matchers::{body_json_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    storage: Arc<StorageLayer>,
    registry: Arc<NodeRegistry>,
    meter: Arc<UsageMeter>,
    proxy: InferenceProxy,
    limiter: RateLimiter,
    deployment_id: Uuid,
}

async fn harness() -> Harness {
    let storage = fixtures::storage().await;
    fixtures::seed_catalog(&storage).await;
    let deployment = fixtures::seed_deployment(&storage, 1, 3).await;
    let registry = Arc::new(NodeRegistry::new(Arc::clone(&storage.database)));
    let scheduler = Arc::new(Scheduler::new(
        SchedulerConfig::default(),
        Arc::clone(&registry),
    ));
    let meter = Arc::new(UsageMeter::new(
        Default::default(),
        Arc::clone(&storage.database),
    ));
    let proxy = InferenceProxy::new(
        ProxyConfig::default(),
        scheduler,
        Arc::clone(&meter),
    );
    let limiter = RateLimiter::new(
        RateLimitsConfig::default(),
        Arc::new(RedisPool::create_noop()),
    );
    Harness {
        storage,
        registry,
        meter,
        proxy,
        limiter,
        deployment_id: deployment.id,
    }
}

fn chat_request(stream: bool) -> InferenceRequest {
    serde_json::from_value(serde_json::json!({
        "model": "llama-3-8b",
        "messages": [{"role": "user", "content": "hi"}],
        "stream": stream,
    }))
    .unwrap()
}

#[tokio::test]
async fn unary_completion_forwards_body_and_meters_usage() {
    let h = harness().await;
    let worker = MockServer::start().await;
    let upstream_body = serde_json::json!({
        "id": "chatcmpl-1",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": "hello"}}],
        "usage": {"prompt_tokens": 8, "completion_tokens": 12, "total_tokens": 20},
    });
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(upstream_body.clone()))
        .mount(&worker)
        .await;

    fixtures::seed_active_node(&h.registry, h.deployment_id, &worker.uri()).await;

    let principal = fixtures::principal();
    let ticket = h.limiter.admit(&principal, 10).await.unwrap();
    let outcome = h
        .proxy
        .execute(&principal, "/v1/chat/completions", chat_request(false), ticket, Uuid::new_v4())
        .await
        .unwrap();

    // The client receives the upstream body unchanged.
    let ProxyOutcome::Unary { status, body } = outcome else {
        panic!("expected unary outcome");
    };
    assert_eq!(status, 200);
    let forwarded: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(forwarded, upstream_body);

    // Exactly one usage record lands in the store within a flush.
    let counters = h
        .meter
        .counters(principal.tenant.id, principal.environment.id, "llama-3-8b");
    assert_eq!(counters.request_count, 1);
    assert_eq!(counters.prompt_tokens, 8);
    assert_eq!(counters.completion_tokens, 12);

    h.meter.drain().await.unwrap();
    let records = h
        .storage
        .db()
        .list_usage_events(principal.environment.id)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].prompt_tokens, 8);
    assert_eq!(records[0].completion_tokens, 12);
    assert_eq!(records[0].status_code, 200);
}

#[tokio::test]
async fn streaming_preserves_bytes_and_captures_usage() {
    let h = harness().await;
    let worker = MockServer::start().await;
    let sse_body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n\n",
        "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":8,\"completion_tokens\":3}}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_body, "text/event-stream"),
        )
        .mount(&worker)
        .await;

    fixtures::seed_active_node(&h.registry, h.deployment_id, &worker.uri()).await;

    let principal = fixtures::principal();
    let ticket = h.limiter.admit(&principal, 10).await.unwrap();
    let outcome = h
        .proxy
        .execute(&principal, "/v1/chat/completions", chat_request(true), ticket, Uuid::new_v4())
        .await
        .unwrap();

    let ProxyOutcome::Stream(mut stream) = outcome else {
        panic!("expected streaming outcome");
    };
    let mut forwarded = Vec::new();
    while let Some(chunk) = stream.next().await {
        forwarded.extend_from_slice(&chunk.unwrap());
    }

    // Byte-for-byte preservation of the upstream stream.
    assert_eq!(forwarded, sse_body.as_bytes());

    // The usage block from the intermediate chunk was captured.
    let counters = h
        .meter
        .counters(principal.tenant.id, principal.environment.id, "llama-3-8b");
    assert_eq!(counters.request_count, 1);
    assert_eq!(counters.prompt_tokens, 8);
    assert_eq!(counters.completion_tokens, 3);

    h.meter.drain().await.unwrap();
    let records = h
        .storage
        .db()
        .list_usage_events(principal.environment.id)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status_code, 200);
}

#[tokio::test]
async fn transient_upstream_failure_retries_on_a_fresh_node() {
    let h = harness().await;

    let broken = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&broken)
        .await;

    let healthy = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [],
            "usage": {"prompt_tokens": 4, "completion_tokens": 6, "total_tokens": 10},
        })))
        .mount(&healthy)
        .await;

    let _broken_id =
        fixtures::seed_active_node(&h.registry, h.deployment_id, &broken.uri()).await;
    let healthy_id =
        fixtures::seed_active_node(&h.registry, h.deployment_id, &healthy.uri()).await;

    // Bias least-loaded toward the broken node so the retry path is the
    // one that reaches the healthy worker.
    let healthy_runtime = h.registry.runtime(healthy_id).unwrap();
    let bias = InFlightGuard::acquire(healthy_runtime);

    let principal = fixtures::principal();
    let ticket = h.limiter.admit(&principal, 10).await.unwrap();
    let outcome = h
        .proxy
        .execute(&principal, "/v1/chat/completions", chat_request(false), ticket, Uuid::new_v4())
        .await
        .unwrap();
    drop(bias);

    let ProxyOutcome::Unary { status, .. } = outcome else {
        panic!("expected unary outcome");
    };
    assert_eq!(status, 200);
}

#[tokio::test]
async fn no_workers_yields_no_capacity() {
    let h = harness().await;
    let principal = fixtures::principal();
    let ticket = h.limiter.admit(&principal, 10).await.unwrap();
    let err = h
        .proxy
        .execute(&principal, "/v1/chat/completions", chat_request(false), ticket, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, FleetError::NoCapacity(_)));
}

#[tokio::test]
async fn request_body_reaches_worker_unchanged() {
    let h = harness().await;
    let worker = MockServer::start().await;
    let request = chat_request(false);
    let expected_body = serde_json::to_string(&request).unwrap();
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_json_string(expected_body))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [],
        })))
        .expect(1)
        .mount(&worker)
        .await;

    fixtures::seed_active_node(&h.registry, h.deployment_id, &worker.uri()).await;

    let principal = fixtures::principal();
    let ticket = h.limiter.admit(&principal, 10).await.unwrap();
    h.proxy
        .execute(&principal, "/v1/chat/completions", request, ticket, Uuid::new_v4())
        .await
        .unwrap();
}
