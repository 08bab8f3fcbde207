//! Authentication configuration

use serde::{Deserialize, Serialize};

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared admin token for `/admin` endpoints (`X-Admin-Token` header)
    #[serde(default)]
    pub admin_token: String,
    /// Principal cache TTL in seconds; bounded so revocation propagates
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl: u64,
    /// Maximum cached principals
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_token: String::new(),
            cache_ttl: default_cache_ttl(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl AuthConfig {
    /// Validate authentication configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_ttl > 60 {
            return Err("auth.cache_ttl must be at most 60 seconds".to_string());
        }
        Ok(())
    }
}

fn default_cache_ttl() -> u64 {
    30
}

fn default_cache_capacity() -> u64 {
    10_000
}
