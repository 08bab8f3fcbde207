//! Inference proxy
//!
//! Forwards unary and streaming requests to a scheduled worker, meters
//! token usage, and retries once on transient upstream failure with a
//! fresh scheduling decision that excludes the failed node. Once any body
//! byte has been forwarded downstream, no retry happens.

mod streaming;

use crate::auth::Principal;
use crate::config::ProxyConfig;
use crate::core::limiter::RequestTicket;
use crate::core::meter::UsageMeter;
use crate::core::models::UsageEvent;
use crate::core::models::openai::{InferenceRequest, SseEvent, UsageEnvelope};
use crate::core::registry::InFlightGuard;
use crate::core::scheduler::{RouteRequest, Scheduler};
use crate::utils::error::{FleetError, Result};
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use streaming::{SseScanner, StreamFinalizer};
use tracing::{debug, warn};
use uuid::Uuid;

/// Result of a proxied request
pub enum ProxyOutcome {
    /// Buffered JSON response, forwarded unchanged
    Unary {
        /// Upstream status code
        status: u16,
        /// Upstream body bytes
        body: Bytes,
    },
    /// Server-sent-events relay
    Stream(Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>),
}

impl std::fmt::Debug for ProxyOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProxyOutcome::Unary { status, body } => f
                .debug_struct("Unary")
                .field("status", status)
                .field("body", body)
                .finish(),
            ProxyOutcome::Stream(_) => f.debug_tuple("Stream").field(&"<stream>").finish(),
        }
    }
}

/// Inference proxy over the scheduler and meter
pub struct InferenceProxy {
    config: ProxyConfig,
    client: reqwest::Client,
    scheduler: Arc<Scheduler>,
    meter: Arc<UsageMeter>,
}

impl InferenceProxy {
    /// Create a proxy with a shared upstream client
    pub fn new(config: ProxyConfig, scheduler: Arc<Scheduler>, meter: Arc<UsageMeter>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("reqwest client");
        Self {
            config,
            client,
            scheduler,
            meter,
        }
    }

    /// Forward one inference request to an eligible worker
    ///
    /// The ticket is consumed so its concurrency permit lives exactly as
    /// long as the request, streamed or not. The caller-assigned request ID
    /// keys the usage record and correlates error bodies.
    pub async fn execute(
        &self,
        principal: &Principal,
        path: &str,
        request: InferenceRequest,
        ticket: RequestTicket,
        request_id: Uuid,
    ) -> Result<ProxyOutcome> {
        let started = Instant::now();
        let deadline = Duration::from_secs(self.config.request_timeout);
        let body = serde_json::to_vec(&request)?;
        let streaming = request.is_streaming();

        let mut exclude: Vec<Uuid> = Vec::new();
        let mut ticket = Some(ticket);
        let max_attempts = if self.config.retry_transient { 2 } else { 1 };

        for attempt in 0..max_attempts {
            let runtime = self.scheduler.select(RouteRequest {
                model: &request.model,
                preferred_region: principal.environment.region_preference.as_deref(),
                exclude: &exclude,
            })?;
            let node = runtime.snapshot();
            let endpoint = node.endpoint_url.clone().ok_or_else(|| {
                FleetError::internal(format!("scheduled node {} has no endpoint", node.id))
            })?;
            let guard = InFlightGuard::acquire(runtime.clone());

            let url = format!("{}{}", endpoint.trim_end_matches('/'), path);
            debug!(%request_id, node = %node.id, attempt, url, "dispatching upstream");

            let response = self
                .client
                .post(&url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.clone())
                .timeout(deadline)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) if e.is_timeout() => {
                    return Err(FleetError::UpstreamTimeout(format!(
                        "worker {} did not respond within {}s",
                        node.id,
                        deadline.as_secs()
                    )));
                }
                Err(e) => {
                    warn!(node = %node.id, "upstream connect failure: {}", e);
                    if attempt + 1 < max_attempts {
                        exclude.push(node.id);
                        continue;
                    }
                    return Err(FleetError::UpstreamFailure(format!(
                        "worker {} unreachable: {}",
                        node.id, e
                    )));
                }
            };

            let status = response.status();
            if status.is_server_error() {
                // No body byte has been forwarded yet; one fresh decision.
                warn!(node = %node.id, %status, "upstream 5xx before body");
                if attempt + 1 < max_attempts {
                    exclude.push(node.id);
                    continue;
                }
                return Err(FleetError::UpstreamFailure(format!(
                    "worker {} returned {}",
                    node.id, status
                )));
            }

            let ticket = ticket.take().expect("ticket consumed once");
            if streaming && status.is_success() {
                return Ok(self.relay_stream(
                    principal,
                    request.model.clone(),
                    request_id,
                    started,
                    response,
                    guard,
                    ticket,
                ));
            }
            return self
                .finish_unary(principal, &request, request_id, started, response, guard)
                .await;
        }

        unreachable!("attempt loop always returns")
    }

    /// Buffer, meter, and forward a unary response
    async fn finish_unary(
        &self,
        principal: &Principal,
        request: &InferenceRequest,
        request_id: Uuid,
        started: Instant,
        response: reqwest::Response,
        guard: InFlightGuard,
    ) -> Result<ProxyOutcome> {
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FleetError::UpstreamTimeout("upstream body read timed out".to_string())
            } else {
                FleetError::UpstreamFailure(format!("upstream body read failed: {}", e))
            }
        })?;

        let latency_ms = started.elapsed().as_millis() as u64;
        guard.runtime().observe_latency(latency_ms);

        if (200..300).contains(&status) {
            let usage = UsageEnvelope::extract(&body).unwrap_or_default();
            self.meter.record(UsageEvent {
                request_id,
                tenant_id: principal.tenant.id,
                environment_id: principal.environment.id,
                model_name: request.model.clone(),
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                latency_ms,
                status_code: status,
                timestamp: Utc::now(),
            });
        }

        Ok(ProxyOutcome::Unary { status, body })
    }

    /// Relay an SSE body, preserving bytes and capturing the usage block
    #[allow(clippy::too_many_arguments)]
    fn relay_stream(
        &self,
        principal: &Principal,
        model_name: String,
        request_id: Uuid,
        started: Instant,
        response: reqwest::Response,
        guard: InFlightGuard,
        ticket: RequestTicket,
    ) -> ProxyOutcome {
        let meter = Arc::clone(&self.meter);
        let deadline = Duration::from_secs(self.config.request_timeout);
        let buffer_cap = self.config.stream_buffer_bytes;
        let tenant_id = principal.tenant.id;
        let environment_id = principal.environment.id;

        let relay = async_stream::stream! {
            let mut finalizer = StreamFinalizer::new(
                meter,
                tenant_id,
                environment_id,
                model_name,
                request_id,
                started,
                guard,
                ticket,
            );
            let mut scanner = SseScanner::new(buffer_cap);
            let mut upstream = response.bytes_stream();

            loop {
                let remaining = deadline.saturating_sub(started.elapsed());
                if remaining.is_zero() {
                    yield Ok(timeout_event());
                    finalizer.set_status(504);
                    break;
                }

                match tokio::time::timeout(remaining, upstream.next()).await {
                    Err(_) => {
                        // Per-model hard cap breached mid-stream.
                        yield Ok(timeout_event());
                        finalizer.set_status(504);
                        break;
                    }
                    Ok(None) => {
                        if !scanner.saw_done() {
                            debug!(%request_id, "upstream closed stream without [DONE]");
                        }
                        finalizer.set_status(200);
                        break;
                    }
                    Ok(Some(Ok(chunk))) => {
                        scanner.feed(&chunk);
                        if let Some(usage) = scanner.last_usage() {
                            finalizer.set_usage(usage);
                        }
                        finalizer.mark_forwarded();
                        // Bytes pass through unchanged (ordering preserved).
                        yield Ok(chunk);
                    }
                    Ok(Some(Err(e))) => {
                        warn!(%request_id, "mid-stream upstream failure: {}", e);
                        yield Ok(failure_event(&e));
                        finalizer.set_status(502);
                        break;
                    }
                }
            }
            // finalizer drops here: usage recorded, permit and slot released.
        };

        ProxyOutcome::Stream(Box::pin(relay))
    }
}

fn timeout_event() -> Bytes {
    SseEvent::default()
        .event("error")
        .data(r#"{"error":{"message":"upstream timeout","type":"upstream_error","code":"upstream_timeout"}}"#)
        .to_bytes()
}

fn failure_event(e: &reqwest::Error) -> Bytes {
    let payload = serde_json::json!({
        "error": {
            "message": format!("upstream failure: {}", e),
            "type": "upstream_error",
            "code": "upstream_failure",
        }
    });
    SseEvent::default()
        .event("error")
        .data(&payload.to_string())
        .to_bytes()
}
