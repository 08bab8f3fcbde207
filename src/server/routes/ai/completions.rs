//! Text completions endpoint (legacy surface)

use crate::core::models::openai::InferenceRequest;
use crate::server::state::AppState;
use crate::utils::error::{FleetError, Result};
use actix_web::{HttpRequest, HttpResponse, web};

/// Text completions endpoint
pub async fn completions(
    state: web::Data<AppState>,
    req: HttpRequest,
    request: web::Json<InferenceRequest>,
) -> Result<HttpResponse> {
    let request = request.into_inner();
    if request.model.is_empty() {
        return Err(FleetError::invalid_request("model must not be empty"));
    }
    if !request.extra.contains_key("prompt") {
        return Err(FleetError::invalid_request("prompt is required"));
    }

    super::handle_inference(&state, &req, request, "/v1/completions").await
}
