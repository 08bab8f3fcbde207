use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Model catalog database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "models")]
pub struct Model {
    /// Canonical model name
    #[sea_orm(primary_key, auto_increment = false)]
    pub name: String,

    /// Model family
    pub family: String,

    /// Size class (e.g. `8b`)
    pub size_class: String,

    /// Minimum accelerator memory in GB
    pub min_gpu_memory_gb: i32,

    /// Catalog status (`active` / `retired`)
    pub status: String,

    /// Creation timestamp
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
