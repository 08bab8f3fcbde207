use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Usage record database model (append-only)
///
/// The request ID primary key is the idempotency barrier: duplicate flushes
/// of the same event are rejected by the unique index.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "usage_records")]
pub struct Model {
    /// Request ID (UUID)
    #[sea_orm(primary_key, auto_increment = false)]
    pub request_id: Uuid,

    /// Tenant billed
    pub tenant_id: Uuid,

    /// Environment billed
    pub environment_id: Uuid,

    /// Model served
    pub model_name: String,

    /// Prompt tokens
    pub prompt_tokens: i32,

    /// Completion tokens
    pub completion_tokens: i32,

    /// Latency in milliseconds
    pub latency_ms: i64,

    /// HTTP status returned to the client
    pub status_code: i16,

    /// Completion timestamp
    pub timestamp: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
