//! API key model and fingerprinting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// API key status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStatus {
    /// Key admits requests
    Active,
    /// Revoked; requests rejected with `Forbidden`
    Revoked,
}

/// Bearer credential record
///
/// The secret value is never stored; only its SHA-256 fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    /// Key ID
    pub id: Uuid,
    /// Stable hash of the secret
    pub fingerprint: String,
    /// Owning environment
    pub environment_id: Uuid,
    /// Key status
    pub status: KeyStatus,
    /// Requests-per-second override
    pub rps_override: Option<u32>,
    /// Max in-flight requests override
    pub concurrency_override: Option<u32>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Compute the stable fingerprint of a bearer secret
pub fn fingerprint(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}
