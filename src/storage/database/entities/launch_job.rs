use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Launch job database model
///
/// Persisted so a server restart does not lose progress visible to the
/// operator. Stage lines and the classified error are stored as JSON.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "launch_jobs")]
pub struct Model {
    /// Job ID (UUID)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Node the launch brings up
    pub node_id: Uuid,

    /// Current stage
    pub status: String,

    /// Progress percentage in [0, 100]
    pub percent: i16,

    /// Append-only stage lines (JSON array)
    pub stages: Json,

    /// Classified error (JSON), present when failed
    pub error: Option<Json>,

    /// Overall launch deadline
    pub deadline: DateTimeWithTimeZone,

    /// Creation timestamp
    pub created_at: DateTimeWithTimeZone,

    /// Last update timestamp
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
