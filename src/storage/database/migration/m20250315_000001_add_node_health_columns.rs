use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Idempotently adds the node health columns to schemas created before the
/// layered health pipeline existed. Fresh databases already carry these
/// columns; each ALTER is guarded by a column-presence check.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        if !manager.has_column("nodes", "last_heartbeat").await? {
            manager
                .alter_table(
                    Table::alter()
                        .table(Nodes::Table)
                        .add_column(
                            ColumnDef::new(Nodes::LastHeartbeat)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;
        }

        if !manager.has_column("nodes", "health_score").await? {
            manager
                .alter_table(
                    Table::alter()
                        .table(Nodes::Table)
                        .add_column(
                            ColumnDef::new(Nodes::HealthScore)
                                .small_integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;
        }

        if !manager.has_column("nodes", "status_message").await? {
            manager
                .alter_table(
                    Table::alter()
                        .table(Nodes::Table)
                        .add_column(ColumnDef::new(Nodes::StatusMessage).string().null())
                        .to_owned(),
                )
                .await?;
        }

        if !manager.has_column("nodes", "endpoint_url").await? {
            manager
                .alter_table(
                    Table::alter()
                        .table(Nodes::Table)
                        .add_column(ColumnDef::new(Nodes::EndpointUrl).string().null())
                        .to_owned(),
                )
                .await?;
        }

        if !manager.has_column("nodes", "deployment_id").await? {
            manager
                .alter_table(
                    Table::alter()
                        .table(Nodes::Table)
                        .add_column(
                            ColumnDef::new(Nodes::DeploymentId)
                                .uuid()
                                .not_null()
                                .default("00000000-0000-0000-0000-000000000000"),
                        )
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, _manager: &SchemaManager) -> Result<(), DbErr> {
        // Columns are load-bearing once present; no down path.
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Nodes {
    Table,
    LastHeartbeat,
    HealthScore,
    StatusMessage,
    EndpointUrl,
    DeploymentId,
}
