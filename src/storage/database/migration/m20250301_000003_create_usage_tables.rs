use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UsageRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UsageRecords::RequestId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UsageRecords::TenantId).uuid().not_null())
                    .col(
                        ColumnDef::new(UsageRecords::EnvironmentId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(UsageRecords::ModelName).string().not_null())
                    .col(
                        ColumnDef::new(UsageRecords::PromptTokens)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UsageRecords::CompletionTokens)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UsageRecords::LatencyMs)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UsageRecords::StatusCode)
                            .small_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UsageRecords::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_usage_records_timestamp")
                    .table(UsageRecords::Table)
                    .col(UsageRecords::Timestamp)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_usage_records_tenant_env")
                    .table(UsageRecords::Table)
                    .col(UsageRecords::TenantId)
                    .col(UsageRecords::EnvironmentId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UsageHourly::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(UsageHourly::TenantId).uuid().not_null())
                    .col(
                        ColumnDef::new(UsageHourly::EnvironmentId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(UsageHourly::ModelName).string().not_null())
                    .col(
                        ColumnDef::new(UsageHourly::Hour)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UsageHourly::RequestCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UsageHourly::PromptTokens)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UsageHourly::CompletionTokens)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UsageHourly::CostMicros)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .primary_key(
                        Index::create()
                            .col(UsageHourly::TenantId)
                            .col(UsageHourly::EnvironmentId)
                            .col(UsageHourly::ModelName)
                            .col(UsageHourly::Hour),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UsageHourly::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UsageRecords::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UsageRecords {
    Table,
    RequestId,
    TenantId,
    EnvironmentId,
    ModelName,
    PromptTokens,
    CompletionTokens,
    LatencyMs,
    StatusCode,
    Timestamp,
}

#[derive(DeriveIden)]
enum UsageHourly {
    Table,
    TenantId,
    EnvironmentId,
    ModelName,
    Hour,
    RequestCount,
    PromptTokens,
    CompletionTokens,
    CostMicros,
}
