//! Tenant and environment models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tenant status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    /// Requests admitted
    Active,
    /// All requests rejected with `Forbidden`
    Suspended,
}

/// Organization identity owning environments and keys
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    /// Stable tenant ID
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Tenant status
    pub status: TenantStatus,
    /// Requests-per-second override, None means the configured default
    pub rps_override: Option<u32>,
    /// Token-throughput-per-minute override
    pub tokens_per_minute_override: Option<u64>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// A bucket within a tenant (dev/staging/prod)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    /// Environment ID
    pub id: Uuid,
    /// Owning tenant
    pub tenant_id: Uuid,
    /// Environment name
    pub name: String,
    /// Pinned region preference for scheduling
    pub region_preference: Option<String>,
    /// Requests-per-second override
    pub rps_override: Option<u32>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}
