//! Layered rate limiter
//!
//! Four gates evaluated in order, each of which must pass: global (process
//! token bucket), tenant (RPS + token throughput), environment (RPS), and
//! key (RPS + concurrency semaphore). Distributed gates use single-round-
//! trip atomic counters in Redis; when Redis is unavailable they fall back
//! to in-process fixed windows.

mod window;

pub use window::WindowTable;

use crate::auth::Principal;
use crate::config::RateLimitsConfig;
use crate::storage::redis::RedisPool;
use crate::utils::error::{FleetError, Result};
use dashmap::DashMap;
use governor::{Quota, RateLimiter as GovernorLimiter, clock::DefaultClock, state::InMemoryState};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;
use uuid::Uuid;

type GlobalGate = GovernorLimiter<governor::state::NotKeyed, InMemoryState, DefaultClock>;

/// Ticket held for the lifetime of an admitted request
///
/// Dropping the ticket releases the per-key concurrency permit on every
/// exit path, including client aborts and panics.
pub struct RequestTicket {
    _permit: OwnedSemaphorePermit,
}

/// Layered rate limiter
pub struct RateLimiter {
    config: RateLimitsConfig,
    redis: Arc<RedisPool>,
    global: GlobalGate,
    fallback: WindowTable,
    semaphores: DashMap<Uuid, Arc<Semaphore>>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(config: RateLimitsConfig, redis: Arc<RedisPool>) -> Self {
        let global_rps = NonZeroU32::new(config.global_rps.max(1)).expect("non-zero global rps");
        Self {
            config,
            redis,
            global: GovernorLimiter::direct(Quota::per_second(global_rps)),
            fallback: WindowTable::new(),
            semaphores: DashMap::new(),
        }
    }

    /// Evaluate every gate for a request and acquire its concurrency ticket
    ///
    /// `estimated_tokens` charges the tenant's token-throughput window at
    /// admission time; the meter settles exact counts after completion.
    pub async fn admit(
        &self,
        principal: &Principal,
        estimated_tokens: u64,
    ) -> Result<RequestTicket> {
        // Gate 1: global process ceiling.
        if self.global.check().is_err() {
            return Err(rejected("global", 1));
        }

        // Gate 2: tenant RPS and token throughput.
        let tenant_rps = principal.tenant_rps(self.config.default_tenant_rps);
        self.check_counter(
            &format!("rl:tenant:{}", principal.tenant.id),
            1,
            tenant_rps as u64,
            1,
            "tenant",
        )
        .await?;

        if estimated_tokens > 0 {
            let tenant_tpm =
                principal.tenant_tokens_per_minute(self.config.default_tenant_tokens_per_minute);
            self.check_counter(
                &format!("rl:tenant_tokens:{}", principal.tenant.id),
                estimated_tokens,
                tenant_tpm,
                60,
                "tenant",
            )
            .await?;
        }

        // Gate 3: environment RPS.
        let env_rps = principal.environment_rps(self.config.default_env_rps);
        self.check_counter(
            &format!("rl:env:{}", principal.environment.id),
            1,
            env_rps as u64,
            1,
            "environment",
        )
        .await?;

        // Gate 4: key RPS, then the concurrency semaphore.
        let key_rps = principal.key_rps(self.config.default_key_rps);
        self.check_counter(
            &format!("rl:key:{}", principal.key.id),
            1,
            key_rps as u64,
            1,
            "key",
        )
        .await?;

        let concurrency = principal
            .key_concurrency(self.config.default_key_concurrency)
            .max(1) as usize;
        let semaphore = self
            .semaphores
            .entry(principal.key.id)
            .or_insert_with(|| Arc::new(Semaphore::new(concurrency)))
            .clone();

        let permit = semaphore.try_acquire_owned().map_err(|_| {
            debug!(key = %principal.key.id, "key concurrency exhausted");
            rejected("key", 1)
        })?;

        Ok(RequestTicket { _permit: permit })
    }

    /// One distributed compare-and-increment, with in-process fallback
    async fn check_counter(
        &self,
        counter: &str,
        amount: u64,
        limit: u64,
        window_secs: u64,
        layer: &str,
    ) -> Result<()> {
        if self.redis.is_noop() {
            let (admitted, retry_after) = self.fallback.check(
                counter,
                amount,
                limit,
                Duration::from_secs(window_secs),
            );
            if !admitted {
                return Err(rejected(layer, retry_after));
            }
            return Ok(());
        }

        let decision = self
            .redis
            .check_quota(counter, amount, limit, window_secs)
            .await?;
        if !decision.admitted {
            return Err(rejected(layer, decision.retry_after.max(1)));
        }
        Ok(())
    }
}

fn rejected(layer: &str, retry_after: u64) -> FleetError {
    FleetError::RateLimited {
        layer: layer.to_string(),
        retry_after,
    }
}
