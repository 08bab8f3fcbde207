//! HTTP response handling for errors

use super::types::FleetError;
use actix_web::{HttpResponse, ResponseError};
use uuid::Uuid;

impl ResponseError for FleetError {
    fn error_response(&self) -> HttpResponse {
        // Fallback path for errors surfacing outside the request handlers,
        // where no request ID is in scope.
        self.to_http_response(None)
    }
}

impl FleetError {
    /// Map the classification to an HTTP response
    ///
    /// The request ID, when known, is embedded in the error body and echoed
    /// in the `X-Request-Id` header so internal failures stay correlatable.
    pub fn to_http_response(&self, request_id: Option<Uuid>) -> HttpResponse {
        let (status_code, error_type, code, message) = match self {
            FleetError::Unauthenticated(_) => (
                actix_web::http::StatusCode::UNAUTHORIZED,
                "authentication_error",
                "unauthenticated".to_string(),
                self.to_string(),
            ),
            FleetError::Forbidden(_) => (
                actix_web::http::StatusCode::FORBIDDEN,
                "authentication_error",
                "forbidden".to_string(),
                self.to_string(),
            ),
            FleetError::RateLimited { layer, .. } => (
                actix_web::http::StatusCode::TOO_MANY_REQUESTS,
                "rate_limit_error",
                format!("rate_limited_{}", layer),
                self.to_string(),
            ),
            FleetError::NoCapacity(_) => (
                actix_web::http::StatusCode::SERVICE_UNAVAILABLE,
                "capacity_error",
                "no_capacity".to_string(),
                self.to_string(),
            ),
            FleetError::UpstreamTimeout(_) => (
                actix_web::http::StatusCode::GATEWAY_TIMEOUT,
                "upstream_error",
                "upstream_timeout".to_string(),
                self.to_string(),
            ),
            FleetError::UpstreamFailure(_) | FleetError::HttpClient(_) => (
                actix_web::http::StatusCode::BAD_GATEWAY,
                "upstream_error",
                "upstream_failure".to_string(),
                self.to_string(),
            ),
            FleetError::InvalidRequest(_) | FleetError::Validation(_) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "invalid_request".to_string(),
                self.to_string(),
            ),
            FleetError::LaunchFailed { category, .. } => (
                if *category == crate::utils::error::LaunchFailureCategory::Credentials {
                    actix_web::http::StatusCode::BAD_REQUEST
                } else {
                    actix_web::http::StatusCode::BAD_GATEWAY
                },
                "launch_error",
                format!("launch_failed_{}", category),
                self.to_string(),
            ),
            FleetError::Conflict(_) => (
                actix_web::http::StatusCode::CONFLICT,
                "conflict_error",
                "conflict".to_string(),
                self.to_string(),
            ),
            FleetError::NotFound(_) => (
                actix_web::http::StatusCode::NOT_FOUND,
                "not_found_error",
                "not_found".to_string(),
                self.to_string(),
            ),
            FleetError::Database(_) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "database_error".to_string(),
                "Database operation failed".to_string(),
            ),
            FleetError::Redis(_) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "cache_error".to_string(),
                "Counter store operation failed".to_string(),
            ),
            _ => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal".to_string(),
                "An internal error occurred".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                message,
                error_type: error_type.to_string(),
                code,
                request_id: request_id.map(|id| id.to_string()),
            },
        };

        let mut builder = HttpResponse::build(status_code);
        if let Some(id) = request_id {
            builder.insert_header(("X-Request-Id", id.to_string()));
        }
        if let FleetError::RateLimited { retry_after, .. } = self {
            builder.insert_header(("Retry-After", retry_after.to_string()));
        }
        builder.json(error_response)
    }
}

/// Standard error response format
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    /// Error payload
    pub error: ErrorDetail,
}

/// Error detail structure
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorDetail {
    /// Human-readable message
    pub message: String,
    /// Error family (OpenAI-style `type` field)
    #[serde(rename = "type")]
    pub error_type: String,
    /// Stable machine-readable code
    pub code: String,
    /// Request ID for internal errors, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}
