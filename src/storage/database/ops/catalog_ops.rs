//! Model and region catalog operations

use crate::core::models::{ModelSpec, ModelStatus, Region};
use crate::storage::database::Database;
use crate::storage::database::entities::{model, region};
use crate::utils::error::{FleetError, Result};
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter};

fn model_from_row(row: model::Model) -> ModelSpec {
    ModelSpec {
        name: row.name,
        family: row.family,
        size_class: row.size_class,
        min_gpu_memory_gb: row.min_gpu_memory_gb.max(0) as u32,
        status: if row.status == "retired" {
            ModelStatus::Retired
        } else {
            ModelStatus::Active
        },
    }
}

impl Database {
    /// Insert or update a model catalog entry
    pub async fn upsert_model(&self, m: &ModelSpec) -> Result<()> {
        let row = model::Model {
            name: m.name.clone(),
            family: m.family.clone(),
            size_class: m.size_class.clone(),
            min_gpu_memory_gb: m.min_gpu_memory_gb as i32,
            status: match m.status {
                ModelStatus::Active => "active".to_string(),
                ModelStatus::Retired => "retired".to_string(),
            },
            created_at: Utc::now().fixed_offset(),
        };
        model::Entity::insert(row.into_active_model())
            .on_conflict(
                OnConflict::column(model::Column::Name)
                    .update_columns([
                        model::Column::Family,
                        model::Column::SizeClass,
                        model::Column::MinGpuMemoryGb,
                        model::Column::Status,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(FleetError::Database)?;
        Ok(())
    }

    /// Fetch one model catalog entry
    pub async fn get_model(&self, name: &str) -> Result<Option<ModelSpec>> {
        let row = model::Entity::find_by_id(name.to_string())
            .one(&self.db)
            .await
            .map_err(FleetError::Database)?;
        Ok(row.map(model_from_row))
    }

    /// Active models, served by `GET /v1/models`
    pub async fn list_active_models(&self) -> Result<Vec<ModelSpec>> {
        let rows = model::Entity::find()
            .filter(model::Column::Status.eq("active"))
            .all(&self.db)
            .await
            .map_err(FleetError::Database)?;
        Ok(rows.into_iter().map(model_from_row).collect())
    }

    /// Insert or update a region
    pub async fn upsert_region(&self, r: &Region) -> Result<()> {
        let row = region::Model {
            name: r.name.clone(),
            provider: r.provider.clone(),
        };
        region::Entity::insert(row.into_active_model())
            .on_conflict(
                OnConflict::column(region::Column::Name)
                    .update_columns([region::Column::Provider])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(FleetError::Database)?;
        Ok(())
    }

    /// Fetch one region
    pub async fn get_region(&self, name: &str) -> Result<Option<Region>> {
        let row = region::Entity::find_by_id(name.to_string())
            .one(&self.db)
            .await
            .map_err(FleetError::Database)?;
        Ok(row.map(|r| Region {
            name: r.name,
            provider: r.provider,
        }))
    }
}
