//! Chat completions endpoint

use crate::core::models::openai::InferenceRequest;
use crate::server::state::AppState;
use crate::utils::error::{FleetError, Result};
use actix_web::{HttpRequest, HttpResponse, web};

/// Chat completions endpoint
///
/// OpenAI-compatible chat completions API supporting streaming and
/// non-streaming responses. Bodies are forwarded to the scheduled worker
/// unchanged; only the routing fields are interpreted here.
pub async fn chat_completions(
    state: web::Data<AppState>,
    req: HttpRequest,
    request: web::Json<InferenceRequest>,
) -> Result<HttpResponse> {
    let request = request.into_inner();
    if request.model.is_empty() {
        return Err(FleetError::invalid_request("model must not be empty"));
    }
    if !request
        .extra
        .get("messages")
        .and_then(|m| m.as_array())
        .is_some_and(|a| !a.is_empty())
    {
        return Err(FleetError::invalid_request(
            "messages must be a non-empty array",
        ));
    }

    super::handle_inference(&state, &req, request, "/v1/chat/completions").await
}
