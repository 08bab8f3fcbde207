use sea_orm_migration::prelude::*;

mod m20250301_000001_create_identity_tables;
mod m20250301_000002_create_fleet_tables;
mod m20250301_000003_create_usage_tables;
mod m20250315_000001_add_node_health_columns;

/// Database migrator for SeaORM
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_identity_tables::Migration),
            Box::new(m20250301_000002_create_fleet_tables::Migration),
            Box::new(m20250301_000003_create_usage_tables::Migration),
            Box::new(m20250315_000001_add_node_health_columns::Migration),
        ]
    }
}
