use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Deployment database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "deployments")]
pub struct Model {
    /// Deployment ID (UUID)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Display name (unique)
    #[sea_orm(unique)]
    pub name: String,

    /// Model served by every replica
    pub model_name: String,

    /// Cloud provider
    pub provider: String,

    /// Cloud region
    pub region: String,

    /// Accelerator class
    pub gpu_type: String,

    /// Cloud instance class
    pub instance_type: String,

    /// Whether replicas launch as spot instances
    pub use_spot: bool,

    /// Replica floor
    pub min_replicas: i32,

    /// Replica ceiling
    pub max_replicas: i32,

    /// Last observed replica count
    pub current_replicas: i32,

    /// Scheduling strategy (`least_loaded` / `round_robin` / ...)
    pub strategy: String,

    /// Deployment status (`active` / `paused`)
    pub status: String,

    /// Creation timestamp
    pub created_at: DateTimeWithTimeZone,

    /// Last update timestamp
    pub updated_at: DateTimeWithTimeZone,
}

/// Deployment entity relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Nodes owned by this deployment
    #[sea_orm(has_many = "super::node::Entity")]
    Nodes,
}

impl Related<super::node::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Nodes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
