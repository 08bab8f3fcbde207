//! Error types for the control plane

use thiserror::Error;

/// Result type alias for the control plane
pub type Result<T> = std::result::Result<T, FleetError>;

/// Classified cause of a failed worker launch
///
/// Each category carries a distinct remediation hint surfaced to the
/// operator through the launch-job status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchFailureCategory {
    /// Cloud credentials missing or rejected
    Credentials,
    /// The provider had no capacity for the requested accelerator
    NoCapacity,
    /// A provider-side quota was exhausted
    Quota,
    /// A transient provider error, safe to retry
    Transient,
    /// The launch exceeded its deadline
    Timeout,
    /// Anything else
    Internal,
}

impl LaunchFailureCategory {
    /// Human-facing remediation hint for this failure class
    pub fn remediation(&self) -> &'static str {
        match self {
            Self::Credentials => {
                "Cloud credentials are missing or invalid for the selected provider. \
                 Configure them and retry the launch."
            }
            Self::NoCapacity => {
                "The provider reported no capacity for the requested accelerator class. \
                 Retry later, pick another region, or choose a different accelerator."
            }
            Self::Quota => {
                "A provider quota was exhausted. Request a quota increase or launch in \
                 another region."
            }
            Self::Transient => "The provider returned a transient error. Retry the launch.",
            Self::Timeout => "The launch did not finish within its deadline. Retry the launch.",
            Self::Internal => "The launch failed unexpectedly. Inspect the job stages for details.",
        }
    }
}

impl std::fmt::Display for LaunchFailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Credentials => "credentials",
            Self::NoCapacity => "no_capacity",
            Self::Quota => "quota",
            Self::Transient => "transient",
            Self::Timeout => "timeout",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Main error type for the control plane
#[derive(Error, Debug)]
pub enum FleetError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Redis errors
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No credential resolved from the request
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Credential resolved but the tenant or key is suspended
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A rate-limit gate rejected the request; `layer` names the gate
    #[error("Rate limit exceeded at {layer} layer")]
    RateLimited {
        /// The rejecting gate: global, tenant, environment, or key
        layer: String,
        /// Seconds until a retry is worthwhile
        retry_after: u64,
    },

    /// No eligible worker for the requested model
    #[error("No capacity: {0}")]
    NoCapacity(String),

    /// The upstream worker exceeded the request deadline
    #[error("Upstream timeout: {0}")]
    UpstreamTimeout(String),

    /// The upstream worker failed before or during the response
    #[error("Upstream failure: {0}")]
    UpstreamFailure(String),

    /// Malformed body or unknown model
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// A worker launch failed; the category carries the remediation hint
    #[error("Launch failed ({category}): {message}")]
    LaunchFailed {
        /// Failure classification
        category: LaunchFailureCategory,
        /// Details from the launch tool or pre-flight check
        message: String,
    },

    /// Illegal state transition
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl FleetError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid-request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a launch failure with its classification
    pub fn launch_failed(category: LaunchFailureCategory, message: impl Into<String>) -> Self {
        Self::LaunchFailed {
            category,
            message: message.into(),
        }
    }

    /// Whether the error is worth a single proxy retry against a fresh node
    pub fn is_retryable_upstream(&self) -> bool {
        matches!(self, Self::UpstreamFailure(_) | Self::HttpClient(_))
    }
}
