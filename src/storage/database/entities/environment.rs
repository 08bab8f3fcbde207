use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Environment database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "environments")]
pub struct Model {
    /// Environment ID (UUID)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning tenant
    pub tenant_id: Uuid,

    /// Environment name (dev/staging/prod)
    pub name: String,

    /// Pinned region preference for scheduling
    pub region_preference: Option<String>,

    /// Requests-per-second override
    pub rps_override: Option<i32>,

    /// Creation timestamp
    pub created_at: DateTimeWithTimeZone,
}

/// Environment entity relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Owning tenant
    #[sea_orm(
        belongs_to = "super::tenant::Entity",
        from = "Column::TenantId",
        to = "super::tenant::Column::Id"
    )]
    Tenant,

    /// API keys scoped to this environment
    #[sea_orm(has_many = "super::api_key::Entity")]
    ApiKeys,
}

impl Related<super::tenant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl Related<super::api_key::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ApiKeys.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
