//! OpenAI-compatible inference surface

mod chat;
mod completions;
mod embeddings;
mod models;

use crate::core::models::openai::InferenceRequest;
use crate::core::proxy::ProxyOutcome;
use crate::server::state::AppState;
use crate::utils::error::{FleetError, Result};
use actix_web::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use actix_web::{HttpRequest, HttpResponse, web};
use tracing::debug;
use uuid::Uuid;

/// Configure the `/v1` routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/v1")
            .route("/chat/completions", web::post().to(chat::chat_completions))
            .route("/completions", web::post().to(completions::completions))
            .route("/embeddings", web::post().to(embeddings::embeddings))
            .route("/models", web::get().to(models::list_models)),
    );
}

/// Extract the bearer credential from the Authorization header
pub(super) fn extract_bearer(req: &HttpRequest) -> Result<String> {
    let header = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| FleetError::Unauthenticated("missing Authorization header".into()))?;

    match header.strip_prefix("Bearer ").or_else(|| header.strip_prefix("bearer ")) {
        Some(token) if !token.is_empty() => Ok(token.to_string()),
        _ => Err(FleetError::Unauthenticated(
            "Authorization header is not a bearer credential".into(),
        )),
    }
}

/// Shared request path: authenticate, rate-limit, schedule, proxy
///
/// The chat, completion, and embedding endpoints differ only in the path
/// forwarded to the worker. A request ID is assigned up front; it keys the
/// usage record, rides every response as `X-Request-Id`, and is embedded in
/// error bodies so internal failures stay correlatable.
pub(super) async fn handle_inference(
    state: &AppState,
    req: &HttpRequest,
    request: InferenceRequest,
    path: &str,
) -> Result<HttpResponse> {
    let request_id = Uuid::new_v4();
    match run_inference(state, req, request, path, request_id).await {
        Ok(response) => Ok(response),
        Err(e) => Ok(e.to_http_response(Some(request_id))),
    }
}

async fn run_inference(
    state: &AppState,
    req: &HttpRequest,
    request: InferenceRequest,
    path: &str,
    request_id: Uuid,
) -> Result<HttpResponse> {
    let bearer = extract_bearer(req)?;
    let principal = state.auth.resolve(&bearer).await?;

    // A coarse size-based token estimate charges the throughput gate at
    // admission; the meter settles exact counts after completion.
    let estimated_tokens = (serde_json::to_vec(&request)?.len() / 4) as u64;
    let ticket = state.limiter.admit(&principal, estimated_tokens).await?;

    debug!(
        %request_id,
        model = %request.model,
        tenant = %principal.tenant.id,
        streaming = request.is_streaming(),
        "inference request admitted"
    );

    let outcome = state
        .proxy
        .execute(&principal, path, request, ticket, request_id)
        .await?;

    Ok(match outcome {
        ProxyOutcome::Unary { status, body } => {
            let code = actix_web::http::StatusCode::from_u16(status)
                .unwrap_or(actix_web::http::StatusCode::OK);
            HttpResponse::build(code)
                .insert_header((CONTENT_TYPE, "application/json"))
                .insert_header(("X-Request-Id", request_id.to_string()))
                .body(body)
        }
        ProxyOutcome::Stream(stream) => HttpResponse::Ok()
            .insert_header((CONTENT_TYPE, "text/event-stream"))
            .insert_header((CACHE_CONTROL, "no-cache"))
            .insert_header(("X-Request-Id", request_id.to_string()))
            .insert_header(("X-Accel-Buffering", "no"))
            .insert_header(("Connection", "keep-alive"))
            .streaming(stream),
    })
}
