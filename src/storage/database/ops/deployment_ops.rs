//! Deployment persistence operations

use crate::core::models::{Deployment, DeploymentStatus, PlacementStrategy};
use crate::storage::database::Database;
use crate::storage::database::entities::deployment;
use crate::utils::error::{FleetError, Result};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, Set};
use uuid::Uuid;

fn strategy_from_str(s: &str) -> PlacementStrategy {
    match s {
        "packed" => PlacementStrategy::Packed,
        _ => PlacementStrategy::Spread,
    }
}

pub(crate) fn deployment_from_row(row: deployment::Model) -> Deployment {
    Deployment {
        id: row.id,
        name: row.name,
        model_name: row.model_name,
        provider: row.provider,
        region: row.region,
        gpu_type: row.gpu_type,
        instance_type: row.instance_type,
        use_spot: row.use_spot,
        min_replicas: row.min_replicas.max(0) as u32,
        max_replicas: row.max_replicas.max(0) as u32,
        current_replicas: row.current_replicas.max(0) as u32,
        strategy: strategy_from_str(&row.strategy),
        status: if row.status == "paused" {
            DeploymentStatus::Paused
        } else {
            DeploymentStatus::Active
        },
        created_at: row.created_at.with_timezone(&Utc),
        updated_at: row.updated_at.with_timezone(&Utc),
    }
}

impl Database {
    /// Insert a deployment
    pub async fn insert_deployment(&self, d: &Deployment) -> Result<()> {
        let row = deployment::Model {
            id: d.id,
            name: d.name.clone(),
            model_name: d.model_name.clone(),
            provider: d.provider.clone(),
            region: d.region.clone(),
            gpu_type: d.gpu_type.clone(),
            instance_type: d.instance_type.clone(),
            use_spot: d.use_spot,
            min_replicas: d.min_replicas as i32,
            max_replicas: d.max_replicas as i32,
            current_replicas: d.current_replicas as i32,
            strategy: d.strategy.as_str().to_string(),
            status: match d.status {
                DeploymentStatus::Active => "active".to_string(),
                DeploymentStatus::Paused => "paused".to_string(),
            },
            created_at: d.created_at.fixed_offset(),
            updated_at: d.updated_at.fixed_offset(),
        };
        deployment::Entity::insert(row.into_active_model())
            .exec(&self.db)
            .await
            .map_err(FleetError::Database)?;
        Ok(())
    }

    /// Fetch a deployment by ID
    pub async fn get_deployment(&self, id: Uuid) -> Result<Option<Deployment>> {
        let row = deployment::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(FleetError::Database)?;
        Ok(row.map(deployment_from_row))
    }

    /// All deployments
    pub async fn list_deployments(&self) -> Result<Vec<Deployment>> {
        let rows = deployment::Entity::find()
            .all(&self.db)
            .await
            .map_err(FleetError::Database)?;
        Ok(rows.into_iter().map(deployment_from_row).collect())
    }

    /// Deployments with status `active`, the reconciler's working set
    pub async fn list_active_deployments(&self) -> Result<Vec<Deployment>> {
        let rows = deployment::Entity::find()
            .filter(deployment::Column::Status.eq("active"))
            .all(&self.db)
            .await
            .map_err(FleetError::Database)?;
        Ok(rows.into_iter().map(deployment_from_row).collect())
    }

    /// Update replica bounds
    pub async fn update_deployment_scale(
        &self,
        id: Uuid,
        min_replicas: u32,
        max_replicas: u32,
    ) -> Result<Deployment> {
        let row = deployment::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(FleetError::Database)?
            .ok_or_else(|| FleetError::not_found(format!("deployment {}", id)))?;

        let mut active = row.into_active_model();
        active.min_replicas = Set(min_replicas as i32);
        active.max_replicas = Set(max_replicas as i32);
        active.updated_at = Set(Utc::now().fixed_offset());
        let updated = active.update(&self.db).await.map_err(FleetError::Database)?;
        Ok(deployment_from_row(updated))
    }

    /// Update status (`active` / `paused`)
    pub async fn set_deployment_status(&self, id: Uuid, status: DeploymentStatus) -> Result<()> {
        let row = deployment::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(FleetError::Database)?
            .ok_or_else(|| FleetError::not_found(format!("deployment {}", id)))?;

        let mut active = row.into_active_model();
        active.status = Set(match status {
            DeploymentStatus::Active => "active".to_string(),
            DeploymentStatus::Paused => "paused".to_string(),
        });
        active.updated_at = Set(Utc::now().fixed_offset());
        active.update(&self.db).await.map_err(FleetError::Database)?;
        Ok(())
    }

    /// Record the observed replica count after a reconciliation sweep
    pub async fn set_current_replicas(&self, id: Uuid, current: u32) -> Result<()> {
        let row = deployment::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(FleetError::Database)?
            .ok_or_else(|| FleetError::not_found(format!("deployment {}", id)))?;

        let mut active = row.into_active_model();
        active.current_replicas = Set(current as i32);
        active.updated_at = Set(Utc::now().fixed_offset());
        active.update(&self.db).await.map_err(FleetError::Database)?;
        Ok(())
    }
}
