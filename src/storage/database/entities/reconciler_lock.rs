use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Advisory reconciliation lock, one row per deployment
///
/// Acquisition is non-blocking: a holder inserts its row (or replaces an
/// expired one); contention skips the tick.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "reconciler_locks")]
pub struct Model {
    /// Locked deployment
    #[sea_orm(primary_key, auto_increment = false)]
    pub deployment_id: Uuid,

    /// Lock holder identity (host + pid)
    pub holder: String,

    /// Expiry; a crashed holder's lock is reclaimable after this
    pub expires_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
