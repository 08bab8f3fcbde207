use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Worker node database model
///
/// One row per cloud cluster; the row survives termination for audit.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "nodes")]
pub struct Model {
    /// Node ID (UUID), assigned before launch
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// External cloud entity handle (unique, 1:1 with node)
    #[sea_orm(unique)]
    pub cluster_name: String,

    /// Owning deployment
    pub deployment_id: Uuid,

    /// Cloud provider
    pub provider: String,

    /// Cloud region
    pub region: String,

    /// Accelerator class
    pub gpu_type: String,

    /// Cloud instance class
    pub instance_type: String,

    /// Whether this is a preemptible instance
    pub spot_instance: bool,

    /// Model served
    pub model_name: String,

    /// Reachable endpoint, present only after registration
    pub endpoint_url: Option<String>,

    /// Lifecycle status
    pub status: String,

    /// Last push heartbeat
    pub last_heartbeat: Option<DateTimeWithTimeZone>,

    /// Health score in [0, 100]
    pub health_score: i16,

    /// Free-form status line
    pub status_message: Option<String>,

    /// Launch request timestamp
    pub launched_at: DateTimeWithTimeZone,

    /// Last update timestamp
    pub updated_at: DateTimeWithTimeZone,
}

/// Node entity relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Owning deployment
    #[sea_orm(
        belongs_to = "super::deployment::Entity",
        from = "Column::DeploymentId",
        to = "super::deployment::Column::Id"
    )]
    Deployment,
}

impl Related<super::deployment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Deployment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
