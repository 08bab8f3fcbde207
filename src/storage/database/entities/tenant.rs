use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Tenant database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "tenants")]
pub struct Model {
    /// Tenant ID (UUID)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Tenant name (unique)
    #[sea_orm(unique)]
    pub name: String,

    /// Tenant status (`active` / `suspended`)
    pub status: String,

    /// Requests-per-second override
    pub rps_override: Option<i32>,

    /// Token-throughput-per-minute override
    pub tokens_per_minute_override: Option<i64>,

    /// Creation timestamp
    pub created_at: DateTimeWithTimeZone,
}

/// Tenant entity relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Environments owned by this tenant
    #[sea_orm(has_many = "super::environment::Entity")]
    Environments,
}

impl Related<super::environment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Environments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
