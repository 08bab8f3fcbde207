//! Rate limiting configuration

use serde::{Deserialize, Serialize};

/// Baseline quotas for the layered rate limiter
///
/// Tenant, environment, and key records may carry overrides; these values
/// apply when no override is present. The global ceiling has no override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitsConfig {
    /// Hard ceiling on total inbound requests per second for this process
    #[serde(default = "default_global_rps")]
    pub global_rps: u32,
    /// Default tenant requests per second
    #[serde(default = "default_tenant_rps")]
    pub default_tenant_rps: u32,
    /// Default tenant token throughput per minute
    #[serde(default = "default_tenant_tokens_per_minute")]
    pub default_tenant_tokens_per_minute: u64,
    /// Default environment requests per second
    #[serde(default = "default_env_rps")]
    pub default_env_rps: u32,
    /// Default key requests per second
    #[serde(default = "default_key_rps")]
    pub default_key_rps: u32,
    /// Default maximum in-flight requests per key
    #[serde(default = "default_key_concurrency")]
    pub default_key_concurrency: u32,
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            global_rps: default_global_rps(),
            default_tenant_rps: default_tenant_rps(),
            default_tenant_tokens_per_minute: default_tenant_tokens_per_minute(),
            default_env_rps: default_env_rps(),
            default_key_rps: default_key_rps(),
            default_key_concurrency: default_key_concurrency(),
        }
    }
}

impl RateLimitsConfig {
    /// Validate quota configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.global_rps == 0 {
            return Err("rate_limits.global_rps cannot be 0".to_string());
        }
        if self.default_key_concurrency == 0 {
            return Err("rate_limits.default_key_concurrency cannot be 0".to_string());
        }
        Ok(())
    }
}

fn default_global_rps() -> u32 {
    2000
}

fn default_tenant_rps() -> u32 {
    100
}

fn default_tenant_tokens_per_minute() -> u64 {
    1_000_000
}

fn default_env_rps() -> u32 {
    100
}

fn default_key_rps() -> u32 {
    50
}

fn default_key_concurrency() -> u32 {
    32
}
