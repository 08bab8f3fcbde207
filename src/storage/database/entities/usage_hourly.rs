use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Hourly usage aggregate, materialised by the periodic rollup job
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "usage_hourly")]
pub struct Model {
    /// Tenant
    #[sea_orm(primary_key, auto_increment = false)]
    pub tenant_id: Uuid,

    /// Environment
    #[sea_orm(primary_key, auto_increment = false)]
    pub environment_id: Uuid,

    /// Model
    #[sea_orm(primary_key, auto_increment = false)]
    pub model_name: String,

    /// Hour bucket (UTC, truncated to the hour)
    #[sea_orm(primary_key, auto_increment = false)]
    pub hour: DateTimeWithTimeZone,

    /// Requests in the bucket
    pub request_count: i64,

    /// Prompt tokens in the bucket
    pub prompt_tokens: i64,

    /// Completion tokens in the bucket
    pub completion_tokens: i64,

    /// Cost in micro-dollars
    pub cost_micros: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
