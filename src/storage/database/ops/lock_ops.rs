//! Advisory reconciliation locks
//!
//! Non-blocking, store-backed, keyed by deployment ID. A lock row from a
//! crashed holder is reclaimable once its expiry passes.

use crate::storage::database::Database;
use crate::storage::database::entities::reconciler_lock;
use crate::utils::error::{FleetError, Result};
use chrono::{Duration, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter};
use uuid::Uuid;

impl Database {
    /// Try to acquire the advisory lock for a deployment
    ///
    /// Returns false without blocking when another live holder has it.
    pub async fn try_acquire_deployment_lock(
        &self,
        deployment_id: Uuid,
        holder: &str,
        ttl_secs: u64,
    ) -> Result<bool> {
        let now = Utc::now();

        // Reclaim an expired lock before attempting the insert.
        reconciler_lock::Entity::delete_many()
            .filter(reconciler_lock::Column::DeploymentId.eq(deployment_id))
            .filter(reconciler_lock::Column::ExpiresAt.lt(now.fixed_offset()))
            .exec(&self.db)
            .await
            .map_err(FleetError::Database)?;

        let row = reconciler_lock::Model {
            deployment_id,
            holder: holder.to_string(),
            expires_at: (now + Duration::seconds(ttl_secs as i64)).fixed_offset(),
        };

        let inserted = reconciler_lock::Entity::insert(row.into_active_model())
            .on_conflict(
                OnConflict::column(reconciler_lock::Column::DeploymentId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(FleetError::Database)?;

        Ok(inserted > 0)
    }

    /// Release a held lock
    pub async fn release_deployment_lock(&self, deployment_id: Uuid, holder: &str) -> Result<()> {
        reconciler_lock::Entity::delete_many()
            .filter(reconciler_lock::Column::DeploymentId.eq(deployment_id))
            .filter(reconciler_lock::Column::Holder.eq(holder))
            .exec(&self.db)
            .await
            .map_err(FleetError::Database)?;
        Ok(())
    }
}
