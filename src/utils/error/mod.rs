//! Error handling for the control plane
//!
//! This module provides the unified error type, the `Result` alias, and the
//! mapping from error classifications to HTTP responses.

mod response;
mod types;

pub use response::{ErrorDetail, ErrorResponse};
pub use types::{FleetError, LaunchFailureCategory, Result};
