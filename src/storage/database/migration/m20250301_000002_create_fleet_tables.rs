use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Deployments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Deployments::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Deployments::Name)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Deployments::ModelName).string().not_null())
                    .col(ColumnDef::new(Deployments::Provider).string().not_null())
                    .col(ColumnDef::new(Deployments::Region).string().not_null())
                    .col(ColumnDef::new(Deployments::GpuType).string().not_null())
                    .col(
                        ColumnDef::new(Deployments::InstanceType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Deployments::UseSpot)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Deployments::MinReplicas)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Deployments::MaxReplicas)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Deployments::CurrentReplicas)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Deployments::Strategy)
                            .string()
                            .not_null()
                            .default("spread"),
                    )
                    .col(
                        ColumnDef::new(Deployments::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(
                        ColumnDef::new(Deployments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Deployments::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Nodes::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Nodes::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Nodes::ClusterName)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Nodes::DeploymentId).uuid().not_null())
                    .col(ColumnDef::new(Nodes::Provider).string().not_null())
                    .col(ColumnDef::new(Nodes::Region).string().not_null())
                    .col(ColumnDef::new(Nodes::GpuType).string().not_null())
                    .col(ColumnDef::new(Nodes::InstanceType).string().not_null())
                    .col(
                        ColumnDef::new(Nodes::SpotInstance)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Nodes::ModelName).string().not_null())
                    .col(ColumnDef::new(Nodes::EndpointUrl).string().null())
                    .col(
                        ColumnDef::new(Nodes::Status)
                            .string()
                            .not_null()
                            .default("launching"),
                    )
                    .col(
                        ColumnDef::new(Nodes::LastHeartbeat)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Nodes::HealthScore)
                            .small_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Nodes::StatusMessage).string().null())
                    .col(
                        ColumnDef::new(Nodes::LaunchedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Nodes::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_nodes_deployment_id")
                            .from(Nodes::Table, Nodes::DeploymentId)
                            .to(Deployments::Table, Deployments::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_nodes_model_name")
                    .table(Nodes::Table)
                    .col(Nodes::ModelName)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_nodes_deployment_id")
                    .table(Nodes::Table)
                    .col(Nodes::DeploymentId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LaunchJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LaunchJobs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LaunchJobs::NodeId).uuid().not_null())
                    .col(
                        ColumnDef::new(LaunchJobs::Status)
                            .string()
                            .not_null()
                            .default("validating"),
                    )
                    .col(
                        ColumnDef::new(LaunchJobs::Percent)
                            .small_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(LaunchJobs::Stages).json().not_null())
                    .col(ColumnDef::new(LaunchJobs::Error).json().null())
                    .col(
                        ColumnDef::new(LaunchJobs::Deadline)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LaunchJobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(LaunchJobs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ReconcilerLocks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReconcilerLocks::DeploymentId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ReconcilerLocks::Holder).string().not_null())
                    .col(
                        ColumnDef::new(ReconcilerLocks::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ReconcilerLocks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LaunchJobs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Nodes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Deployments::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Deployments {
    Table,
    Id,
    Name,
    ModelName,
    Provider,
    Region,
    GpuType,
    InstanceType,
    UseSpot,
    MinReplicas,
    MaxReplicas,
    CurrentReplicas,
    Strategy,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Nodes {
    Table,
    Id,
    ClusterName,
    DeploymentId,
    Provider,
    Region,
    GpuType,
    InstanceType,
    SpotInstance,
    ModelName,
    EndpointUrl,
    Status,
    LastHeartbeat,
    HealthScore,
    StatusMessage,
    LaunchedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum LaunchJobs {
    Table,
    Id,
    NodeId,
    Status,
    Percent,
    Stages,
    Error,
    Deadline,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ReconcilerLocks {
    Table,
    DeploymentId,
    Holder,
    ExpiresAt,
}
