//! Launch job persistence operations

use crate::core::models::{LaunchJob, LaunchJobError, LaunchJobStatus, StageLine};
use crate::storage::database::Database;
use crate::storage::database::entities::launch_job;
use crate::utils::error::{FleetError, Result};
use chrono::{Duration, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter};
use uuid::Uuid;

fn status_from_str(s: &str) -> LaunchJobStatus {
    match s {
        "validating" => LaunchJobStatus::Validating,
        "provisioning" => LaunchJobStatus::Provisioning,
        "installing" => LaunchJobStatus::Installing,
        "loading" => LaunchJobStatus::Loading,
        "starting" => LaunchJobStatus::Starting,
        "verifying" => LaunchJobStatus::Verifying,
        "completed" => LaunchJobStatus::Completed,
        "cancelled" => LaunchJobStatus::Cancelled,
        "timeout" => LaunchJobStatus::Timeout,
        _ => LaunchJobStatus::Failed,
    }
}

fn job_from_row(row: launch_job::Model) -> Result<LaunchJob> {
    let stages: Vec<StageLine> =
        serde_json::from_value(row.stages).map_err(FleetError::Serialization)?;
    let error: Option<LaunchJobError> = row
        .error
        .map(serde_json::from_value)
        .transpose()
        .map_err(FleetError::Serialization)?;
    Ok(LaunchJob {
        id: row.id,
        node_id: row.node_id,
        status: status_from_str(&row.status),
        percent: row.percent.clamp(0, 100) as u8,
        stages,
        error,
        deadline: row.deadline.with_timezone(&Utc),
        created_at: row.created_at.with_timezone(&Utc),
        updated_at: row.updated_at.with_timezone(&Utc),
    })
}

impl Database {
    /// Insert or replace a launch job row
    ///
    /// Jobs are persisted on every stage transition so a restart does not
    /// lose progress visible to the operator.
    pub async fn save_launch_job(&self, job: &LaunchJob) -> Result<()> {
        let row = launch_job::Model {
            id: job.id,
            node_id: job.node_id,
            status: job.status.to_string(),
            percent: job.percent as i16,
            stages: serde_json::to_value(&job.stages).map_err(FleetError::Serialization)?,
            error: job
                .error
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .map_err(FleetError::Serialization)?,
            deadline: job.deadline.fixed_offset(),
            created_at: job.created_at.fixed_offset(),
            updated_at: job.updated_at.fixed_offset(),
        };

        launch_job::Entity::insert(row.into_active_model())
            .on_conflict(
                OnConflict::column(launch_job::Column::Id)
                    .update_columns([
                        launch_job::Column::Status,
                        launch_job::Column::Percent,
                        launch_job::Column::Stages,
                        launch_job::Column::Error,
                        launch_job::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await
            .map_err(FleetError::Database)?;
        Ok(())
    }

    /// Fetch a launch job by ID
    pub async fn get_launch_job(&self, id: Uuid) -> Result<Option<LaunchJob>> {
        let row = launch_job::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(FleetError::Database)?;
        row.map(job_from_row).transpose()
    }

    /// Delete terminal jobs older than the retention window
    pub async fn gc_launch_jobs(&self, retention_hours: u64) -> Result<u64> {
        let cutoff = (Utc::now() - Duration::hours(retention_hours as i64)).fixed_offset();
        let res = launch_job::Entity::delete_many()
            .filter(launch_job::Column::Status.is_in([
                "completed",
                "failed",
                "cancelled",
                "timeout",
            ]))
            .filter(launch_job::Column::UpdatedAt.lt(cutoff))
            .exec(&self.db)
            .await
            .map_err(FleetError::Database)?;
        Ok(res.rows_affected)
    }
}
