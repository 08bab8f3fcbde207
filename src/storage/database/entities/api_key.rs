use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// API key database model (fingerprint only; the secret is never stored)
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "api_keys")]
pub struct Model {
    /// Key ID (UUID)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// SHA-256 fingerprint of the secret (unique)
    #[sea_orm(unique)]
    pub fingerprint: String,

    /// Owning environment
    pub environment_id: Uuid,

    /// Key status (`active` / `revoked`)
    pub status: String,

    /// Requests-per-second override
    pub rps_override: Option<i32>,

    /// Max in-flight requests override
    pub concurrency_override: Option<i32>,

    /// Creation timestamp
    pub created_at: DateTimeWithTimeZone,
}

/// API key entity relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Owning environment
    #[sea_orm(
        belongs_to = "super::environment::Entity",
        from = "Column::EnvironmentId",
        to = "super::environment::Column::Id"
    )]
    Environment,
}

impl Related<super::environment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Environment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
