//! Usage accounting models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One row per successful or billable-failure request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    /// Request ID, unique per event (idempotency key)
    pub request_id: Uuid,
    /// Tenant billed
    pub tenant_id: Uuid,
    /// Environment billed
    pub environment_id: Uuid,
    /// Model served
    pub model_name: String,
    /// Prompt tokens consumed
    pub prompt_tokens: u32,
    /// Completion tokens produced
    pub completion_tokens: u32,
    /// End-to-end latency in milliseconds
    pub latency_ms: u64,
    /// HTTP status returned to the client
    pub status_code: u16,
    /// Completion time
    pub timestamp: DateTime<Utc>,
}

/// Hourly aggregate keyed by (tenant, environment, model, hour)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageHourly {
    /// Tenant
    pub tenant_id: Uuid,
    /// Environment
    pub environment_id: Uuid,
    /// Model
    pub model_name: String,
    /// Hour bucket (truncated to the hour, UTC)
    pub hour: DateTime<Utc>,
    /// Requests in the bucket
    pub request_count: u64,
    /// Prompt tokens in the bucket
    pub prompt_tokens: u64,
    /// Completion tokens in the bucket
    pub completion_tokens: u64,
    /// Cost in micro-dollars
    pub cost_micros: u64,
}

/// Live counter snapshot for one (tenant, environment, model) dimension
#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageCounters {
    /// Requests recorded since process start
    pub request_count: u64,
    /// Prompt tokens recorded
    pub prompt_tokens: u64,
    /// Completion tokens recorded
    pub completion_tokens: u64,
}
