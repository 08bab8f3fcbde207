//! Embeddings endpoint

use crate::core::models::openai::InferenceRequest;
use crate::server::state::AppState;
use crate::utils::error::{FleetError, Result};
use actix_web::{HttpRequest, HttpResponse, web};

/// Embeddings endpoint
pub async fn embeddings(
    state: web::Data<AppState>,
    req: HttpRequest,
    request: web::Json<InferenceRequest>,
) -> Result<HttpResponse> {
    let mut request = request.into_inner();
    if request.model.is_empty() {
        return Err(FleetError::invalid_request("model must not be empty"));
    }
    if !request.extra.contains_key("input") {
        return Err(FleetError::invalid_request("input is required"));
    }
    // Embeddings have no streamed form.
    request.stream = None;

    super::handle_inference(&state, &req, request, "/v1/embeddings").await
}
