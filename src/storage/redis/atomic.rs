//! Redis atomic quota and counter operations
//!
//! The quota check is a single Lua round trip so horizontal replicas of the
//! control plane cannot over-admit through check-then-set races.

use super::pool::RedisPool;
use crate::utils::error::{FleetError, Result};
use once_cell::sync::Lazy;
use redis::AsyncCommands;

/// Fixed-window compare-and-increment: admits iff the incremented counter
/// stays within the limit, rolling back on rejection. Returns
/// `{admitted, retry_after_secs}`.
static QUOTA_SCRIPT: Lazy<redis::Script> = Lazy::new(|| {
    redis::Script::new(
        r#"
local added = tonumber(ARGV[1])
local limit = tonumber(ARGV[2])
local window = tonumber(ARGV[3])
local current = redis.call('INCRBY', KEYS[1], added)
if current == added then
  redis.call('EXPIRE', KEYS[1], window)
end
if current > limit then
  redis.call('DECRBY', KEYS[1], added)
  local ttl = redis.call('TTL', KEYS[1])
  if ttl < 0 then ttl = window end
  return {0, ttl}
end
return {1, 0}
"#,
    )
});

/// Outcome of an atomic quota check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaDecision {
    /// Whether the request was admitted
    pub admitted: bool,
    /// Seconds until a retry is worthwhile (0 when admitted)
    pub retry_after: u64,
}

impl RedisPool {
    /// Atomically admit `amount` units against `limit` within a fixed window
    ///
    /// In no-op mode the decision is deferred to the caller's in-process
    /// fallback by admitting unconditionally.
    pub async fn check_quota(
        &self,
        key: &str,
        amount: u64,
        limit: u64,
        window_secs: u64,
    ) -> Result<QuotaDecision> {
        if self.noop_mode {
            return Ok(QuotaDecision {
                admitted: true,
                retry_after: 0,
            });
        }

        let mut conn = self
            .connection()
            .ok_or_else(|| FleetError::internal("Redis pool has no connection"))?;
        let (admitted, retry_after): (i64, i64) = QUOTA_SCRIPT
            .key(key)
            .arg(amount)
            .arg(limit)
            .arg(window_secs)
            .invoke_async(&mut conn)
            .await
            .map_err(FleetError::Redis)?;

        Ok(QuotaDecision {
            admitted: admitted == 1,
            retry_after: retry_after.max(0) as u64,
        })
    }

    /// Increment key value by delta
    pub async fn increment(&self, key: &str, delta: i64) -> Result<i64> {
        if self.noop_mode {
            return Ok(delta);
        }

        let mut conn = self
            .connection()
            .ok_or_else(|| FleetError::internal("Redis pool has no connection"))?;
        let new_value: i64 = conn.incr(key, delta).await.map_err(FleetError::Redis)?;
        Ok(new_value)
    }

    /// Decrement a key by a delta value
    pub async fn decrement(&self, key: &str, delta: i64) -> Result<i64> {
        if self.noop_mode {
            return Ok(-delta);
        }

        let mut conn = self
            .connection()
            .ok_or_else(|| FleetError::internal("Redis pool has no connection"))?;
        let new_value: i64 = conn.decr(key, delta).await.map_err(FleetError::Redis)?;
        Ok(new_value)
    }
}
