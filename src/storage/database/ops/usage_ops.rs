//! Usage record persistence and hourly aggregation

use crate::core::models::{UsageEvent, UsageHourly};
use crate::storage::database::Database;
use crate::storage::database::entities::{usage_hourly, usage_record};
use crate::utils::error::{FleetError, Result};
use chrono::{DateTime, Duration, Timelike, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter};
use std::collections::HashMap;
use uuid::Uuid;

fn record_from_event(e: &UsageEvent) -> usage_record::Model {
    usage_record::Model {
        request_id: e.request_id,
        tenant_id: e.tenant_id,
        environment_id: e.environment_id,
        model_name: e.model_name.clone(),
        prompt_tokens: e.prompt_tokens as i32,
        completion_tokens: e.completion_tokens as i32,
        latency_ms: e.latency_ms as i64,
        status_code: e.status_code as i16,
        timestamp: e.timestamp.fixed_offset(),
    }
}

impl Database {
    /// Append a batch of usage events
    ///
    /// Duplicate request IDs are silently skipped; the unique index is the
    /// idempotency barrier for retried flushes.
    pub async fn insert_usage_events(&self, events: &[UsageEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        let rows = events
            .iter()
            .map(|e| record_from_event(e).into_active_model());
        usage_record::Entity::insert_many(rows)
            .on_conflict(
                OnConflict::column(usage_record::Column::RequestId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(FleetError::Database)?;
        Ok(())
    }

    /// Recompute hourly aggregates for a rolling window
    ///
    /// Rows are folded in process and upserted per (tenant, environment,
    /// model, hour) bucket so the job stays portable across backends.
    pub async fn aggregate_usage_hourly(
        &self,
        window_hours: u64,
        prompt_micros_per_million: u64,
        completion_micros_per_million: u64,
    ) -> Result<usize> {
        let window_start = Utc::now() - Duration::hours(window_hours as i64);
        let rows = usage_record::Entity::find()
            .filter(usage_record::Column::Timestamp.gte(window_start.fixed_offset()))
            .all(&self.db)
            .await
            .map_err(FleetError::Database)?;

        type BucketKey = (Uuid, Uuid, String, DateTime<Utc>);
        let mut buckets: HashMap<BucketKey, (i64, i64, i64)> = HashMap::new();
        for row in rows {
            let ts = row.timestamp.with_timezone(&Utc);
            let hour = ts
                .with_minute(0)
                .and_then(|t| t.with_second(0))
                .and_then(|t| t.with_nanosecond(0))
                .unwrap_or(ts);
            let entry = buckets
                .entry((row.tenant_id, row.environment_id, row.model_name, hour))
                .or_default();
            entry.0 += 1;
            entry.1 += row.prompt_tokens as i64;
            entry.2 += row.completion_tokens as i64;
        }

        let bucket_count = buckets.len();
        for ((tenant_id, environment_id, model_name, hour), (count, prompt, completion)) in buckets
        {
            let cost_micros = (prompt as u64 * prompt_micros_per_million
                + completion as u64 * completion_micros_per_million)
                / 1_000_000;
            let row = usage_hourly::Model {
                tenant_id,
                environment_id,
                model_name,
                hour: hour.fixed_offset(),
                request_count: count,
                prompt_tokens: prompt,
                completion_tokens: completion,
                cost_micros: cost_micros as i64,
            };
            usage_hourly::Entity::insert(row.into_active_model())
                .on_conflict(
                    OnConflict::columns([
                        usage_hourly::Column::TenantId,
                        usage_hourly::Column::EnvironmentId,
                        usage_hourly::Column::ModelName,
                        usage_hourly::Column::Hour,
                    ])
                    .update_columns([
                        usage_hourly::Column::RequestCount,
                        usage_hourly::Column::PromptTokens,
                        usage_hourly::Column::CompletionTokens,
                        usage_hourly::Column::CostMicros,
                    ])
                    .to_owned(),
                )
                .exec_without_returning(&self.db)
                .await
                .map_err(FleetError::Database)?;
        }

        Ok(bucket_count)
    }

    /// Usage records for one environment, newest first (test and audit aid)
    pub async fn list_usage_events(&self, environment_id: Uuid) -> Result<Vec<UsageEvent>> {
        use sea_orm::QueryOrder;
        let rows = usage_record::Entity::find()
            .filter(usage_record::Column::EnvironmentId.eq(environment_id))
            .order_by_desc(usage_record::Column::Timestamp)
            .all(&self.db)
            .await
            .map_err(FleetError::Database)?;
        Ok(rows
            .into_iter()
            .map(|row| UsageEvent {
                request_id: row.request_id,
                tenant_id: row.tenant_id,
                environment_id: row.environment_id,
                model_name: row.model_name,
                prompt_tokens: row.prompt_tokens.max(0) as u32,
                completion_tokens: row.completion_tokens.max(0) as u32,
                latency_ms: row.latency_ms.max(0) as u64,
                status_code: row.status_code.max(0) as u16,
                timestamp: row.timestamp.with_timezone(&Utc),
            })
            .collect())
    }

    /// Hourly aggregates for one hour bucket (test and audit aid)
    pub async fn list_usage_hourly(&self, tenant_id: Uuid) -> Result<Vec<UsageHourly>> {
        let rows = usage_hourly::Entity::find()
            .filter(usage_hourly::Column::TenantId.eq(tenant_id))
            .all(&self.db)
            .await
            .map_err(FleetError::Database)?;
        Ok(rows
            .into_iter()
            .map(|row| UsageHourly {
                tenant_id: row.tenant_id,
                environment_id: row.environment_id,
                model_name: row.model_name,
                hour: row.hour.with_timezone(&Utc),
                request_count: row.request_count.max(0) as u64,
                prompt_tokens: row.prompt_tokens.max(0) as u64,
                completion_tokens: row.completion_tokens.max(0) as u64,
                cost_micros: row.cost_micros.max(0) as u64,
            })
            .collect())
    }
}
