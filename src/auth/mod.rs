//! Authentication system
//!
//! Resolves inbound bearer credentials to a principal (tenant, environment,
//! key) through a short-TTL cache backed by the persistent store. The cache
//! TTL is bounded at 60 s so revocation propagates quickly.

use crate::config::AuthConfig;
use crate::core::models::{ApiKey, Environment, KeyStatus, Tenant, TenantStatus, fingerprint};
use crate::storage::StorageLayer;
use crate::utils::constant_time_eq;
use crate::utils::error::{FleetError, Result};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Resolved identity of an authenticated request
#[derive(Debug, Clone)]
pub struct Principal {
    /// Owning tenant
    pub tenant: Tenant,
    /// Environment the key is scoped to
    pub environment: Environment,
    /// The key itself
    pub key: ApiKey,
}

impl Principal {
    /// Effective tenant RPS, override first
    pub fn tenant_rps(&self, default: u32) -> u32 {
        self.tenant.rps_override.unwrap_or(default)
    }

    /// Effective tenant token throughput per minute
    pub fn tenant_tokens_per_minute(&self, default: u64) -> u64 {
        self.tenant.tokens_per_minute_override.unwrap_or(default)
    }

    /// Effective environment RPS
    pub fn environment_rps(&self, default: u32) -> u32 {
        self.environment.rps_override.unwrap_or(default)
    }

    /// Effective key RPS
    pub fn key_rps(&self, default: u32) -> u32 {
        self.key.rps_override.unwrap_or(default)
    }

    /// Effective key concurrency ceiling
    pub fn key_concurrency(&self, default: u32) -> u32 {
        self.key.concurrency_override.unwrap_or(default)
    }
}

/// Authentication system with a short-TTL principal cache
pub struct AuthSystem {
    storage: Arc<StorageLayer>,
    cache: Cache<String, Arc<Principal>>,
}

impl AuthSystem {
    /// Create a new authentication system
    pub fn new(config: &AuthConfig, storage: Arc<StorageLayer>) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.cache_capacity)
            .time_to_live(Duration::from_secs(config.cache_ttl.min(60)))
            .build();
        Self { storage, cache }
    }

    /// Resolve a bearer secret to its principal
    ///
    /// Fails with `Unauthenticated` when no key matches and `Forbidden` when
    /// the tenant is suspended or the key revoked. Suspension is re-checked
    /// on every call even for cached principals.
    pub async fn resolve(&self, bearer: &str) -> Result<Arc<Principal>> {
        if bearer.is_empty() {
            return Err(FleetError::Unauthenticated("missing credentials".into()));
        }

        let fp = fingerprint(bearer);

        let principal = match self.cache.get(&fp).await {
            Some(p) => p,
            None => {
                debug!("principal cache miss");
                let Some((key, environment, tenant)) = self
                    .storage
                    .db()
                    .find_principal_by_fingerprint(&fp)
                    .await?
                else {
                    return Err(FleetError::Unauthenticated("unknown API key".into()));
                };

                // The store lookup went through an index; re-check equality in
                // constant time so collation quirks cannot weaken the match.
                if !constant_time_eq(key.fingerprint.as_bytes(), fp.as_bytes()) {
                    return Err(FleetError::Unauthenticated("unknown API key".into()));
                }

                let p = Arc::new(Principal {
                    tenant,
                    environment,
                    key,
                });
                self.cache.insert(fp, p.clone()).await;
                p
            }
        };

        if principal.tenant.status == TenantStatus::Suspended {
            return Err(FleetError::Forbidden("tenant is suspended".into()));
        }
        if principal.key.status == KeyStatus::Revoked {
            return Err(FleetError::Forbidden("API key is revoked".into()));
        }

        Ok(principal)
    }

    /// Drop one cached principal, used when a key is revoked mid-TTL
    pub async fn invalidate(&self, bearer: &str) {
        self.cache.invalidate(&fingerprint(bearer)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn principal(tenant_status: TenantStatus, key_status: KeyStatus) -> Principal {
        let tenant_id = Uuid::new_v4();
        let env_id = Uuid::new_v4();
        Principal {
            tenant: Tenant {
                id: tenant_id,
                name: "acme".to_string(),
                status: tenant_status,
                rps_override: Some(250),
                tokens_per_minute_override: None,
                created_at: Utc::now(),
            },
            environment: Environment {
                id: env_id,
                tenant_id,
                name: "prod".to_string(),
                region_preference: Some("us-east-1".to_string()),
                rps_override: None,
                created_at: Utc::now(),
            },
            key: ApiKey {
                id: Uuid::new_v4(),
                fingerprint: fingerprint("sk-test"),
                environment_id: env_id,
                status: key_status,
                rps_override: None,
                concurrency_override: Some(8),
                created_at: Utc::now(),
            },
        }
    }

    #[test]
    fn overrides_beat_defaults() {
        let p = principal(TenantStatus::Active, KeyStatus::Active);
        assert_eq!(p.tenant_rps(100), 250);
        assert_eq!(p.environment_rps(100), 100);
        assert_eq!(p.key_rps(50), 50);
        assert_eq!(p.key_concurrency(32), 8);
        assert_eq!(p.tenant_tokens_per_minute(1_000_000), 1_000_000);
    }
}
