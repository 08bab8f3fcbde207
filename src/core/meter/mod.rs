//! Usage meter
//!
//! `record` is synchronous: it bumps tenant-sharded in-memory counters and
//! appends to a durable buffer, so it is callable from drop guards on any
//! request exit path. A background loop drains the buffer to the persistent
//! usage store and recomputes the hourly aggregates; the in-memory counters
//! stay authoritative until a flush succeeds.

use crate::config::MeterConfig;
use crate::core::models::{UsageCounters, UsageEvent};
use crate::core::supervision::LoopHealth;
use crate::storage::database::Database;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Counter dimension: (tenant, environment, model)
type Dimension = (Uuid, Uuid, String);

struct Shard {
    counters: Mutex<HashMap<Dimension, UsageCounters>>,
}

/// Usage meter with sharded counters and a durable flush buffer
pub struct UsageMeter {
    config: MeterConfig,
    db: Arc<Database>,
    shards: Vec<Shard>,
    buffer: Mutex<Vec<UsageEvent>>,
    health: Arc<LoopHealth>,
}

impl UsageMeter {
    /// Create a meter; shard count scales with available parallelism
    pub fn new(config: MeterConfig, db: Arc<Database>) -> Self {
        let shard_count = num_cpus::get().clamp(4, 64);
        let shards = (0..shard_count)
            .map(|_| Shard {
                counters: Mutex::new(HashMap::new()),
            })
            .collect();
        Self {
            config,
            db,
            shards,
            buffer: Mutex::new(Vec::new()),
            health: Arc::new(LoopHealth::new()),
        }
    }

    /// Drain-loop self-health handle for `/ready`
    pub fn health(&self) -> Arc<LoopHealth> {
        Arc::clone(&self.health)
    }

    fn shard_for(&self, tenant_id: Uuid) -> &Shard {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        tenant_id.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % self.shards.len()]
    }

    /// Record one usage event
    ///
    /// Synchronous so guaranteed-release constructs can call it; events are
    /// appended in completion order per tenant shard.
    pub fn record(&self, event: UsageEvent) {
        let shard = self.shard_for(event.tenant_id);
        {
            let mut counters = shard.counters.lock();
            let entry = counters
                .entry((
                    event.tenant_id,
                    event.environment_id,
                    event.model_name.clone(),
                ))
                .or_default();
            entry.request_count += 1;
            entry.prompt_tokens += event.prompt_tokens as u64;
            entry.completion_tokens += event.completion_tokens as u64;
        }
        self.buffer.lock().push(event);
    }

    /// Live counter snapshot for one dimension
    pub fn counters(&self, tenant_id: Uuid, environment_id: Uuid, model: &str) -> UsageCounters {
        let shard = self.shard_for(tenant_id);
        shard
            .counters
            .lock()
            .get(&(tenant_id, environment_id, model.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Number of buffered, not-yet-flushed events
    pub fn buffered(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Flush the buffer to the persistent store
    ///
    /// Duplicate request IDs are rejected by the store's unique index, so a
    /// retried flush after a partial failure cannot double-bill. On failure
    /// the drained events are put back for the next attempt.
    pub async fn drain(&self) -> crate::utils::error::Result<usize> {
        let events: Vec<UsageEvent> = std::mem::take(&mut *self.buffer.lock());
        if events.is_empty() {
            return Ok(0);
        }

        let count = events.len();
        match self.db.insert_usage_events(&events).await {
            Ok(()) => {
                debug!(events = count, "usage buffer flushed");
                Ok(count)
            }
            Err(e) => {
                // Requeue at the front so completion order survives a retry.
                let mut buffer = self.buffer.lock();
                let tail = std::mem::take(&mut *buffer);
                *buffer = events;
                buffer.extend(tail);
                Err(e)
            }
        }
    }

    /// Recompute the hourly aggregates for the rolling window
    pub async fn rollup(&self) -> crate::utils::error::Result<usize> {
        self.db
            .aggregate_usage_hourly(
                self.config.rollup_window_hours,
                self.config.prompt_micros_per_million,
                self.config.completion_micros_per_million,
            )
            .await
    }

    /// Spawn the periodic drain + rollup loop
    pub fn spawn_drain_loop(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let meter = Arc::clone(self);
        let interval_secs = meter.config.drain_interval.clamp(1, 60);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            interval.tick().await;
            let mut ticks: u64 = 0;
            loop {
                interval.tick().await;
                match meter.drain().await {
                    Ok(_) => meter.health.record_ok(),
                    Err(e) => {
                        warn!("usage flush failed, buffer retained: {}", e);
                        meter.health.record_err();
                    }
                }
                // The rollup is much heavier than the flush; run it once a
                // minute regardless of the drain cadence.
                ticks += 1;
                if ticks % (60 / interval_secs).max(1) == 0 {
                    if let Err(e) = meter.rollup().await {
                        warn!("hourly usage rollup failed: {}", e);
                        meter.health.record_err();
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    async fn meter() -> Arc<UsageMeter> {
        let db = Database::new(&crate::config::DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..Default::default()
        })
        .await
        .unwrap();
        db.migrate().await.unwrap();
        Arc::new(UsageMeter::new(MeterConfig::default(), Arc::new(db)))
    }

    fn event(tenant: Uuid, env: Uuid, prompt: u32, completion: u32) -> UsageEvent {
        UsageEvent {
            request_id: Uuid::new_v4(),
            tenant_id: tenant,
            environment_id: env,
            model_name: "llama-3-8b".to_string(),
            prompt_tokens: prompt,
            completion_tokens: completion,
            latency_ms: 42,
            status_code: 200,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn counters_accumulate_per_dimension() {
        let meter = meter().await;
        let tenant = Uuid::new_v4();
        let env = Uuid::new_v4();
        meter.record(event(tenant, env, 8, 12));
        meter.record(event(tenant, env, 2, 3));

        let counters = meter.counters(tenant, env, "llama-3-8b");
        assert_eq!(counters.request_count, 2);
        assert_eq!(counters.prompt_tokens, 10);
        assert_eq!(counters.completion_tokens, 15);
    }

    #[tokio::test]
    async fn drain_persists_exactly_once() {
        let meter = meter().await;
        let tenant = Uuid::new_v4();
        let env = Uuid::new_v4();
        let e = event(tenant, env, 8, 12);
        let request_id = e.request_id;
        meter.record(e.clone());

        assert_eq!(meter.drain().await.unwrap(), 1);
        assert_eq!(meter.buffered(), 0);

        // A duplicate of an already-flushed event must not double-bill.
        meter.record(e);
        meter.drain().await.unwrap();
        let stored = meter.db.list_usage_events(env).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].request_id, request_id);
    }

    #[tokio::test]
    async fn rollup_materialises_hourly_buckets() {
        let meter = meter().await;
        let tenant = Uuid::new_v4();
        let env = Uuid::new_v4();
        meter.record(event(tenant, env, 100, 50));
        meter.record(event(tenant, env, 200, 100));
        meter.drain().await.unwrap();

        let buckets = meter.rollup().await.unwrap();
        assert_eq!(buckets, 1);

        let rows = meter.db.list_usage_hourly(tenant).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].request_count, 2);
        assert_eq!(rows[0].prompt_tokens, 300);
        assert_eq!(rows[0].completion_tokens, 150);
    }
}
