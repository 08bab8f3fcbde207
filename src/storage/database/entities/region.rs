use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Region catalog database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "regions")]
pub struct Model {
    /// Region identifier
    #[sea_orm(primary_key, auto_increment = false)]
    pub name: String,

    /// Provider tag
    pub provider: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
