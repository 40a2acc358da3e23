use sea_orm::EnumIter;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden, EnumIter)]
pub enum Jobs {
    Table,
    Id,
    CreatedAt,
    UpdatedAt,
    JobType,
    EventId,
    QueryId,
    Status,
    ProgressPercent,
    Stage,
    ErrorText,
    Payload,
    Attempts,
    LockedAt,
    StartedAt,
    CompletedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, m: &SchemaManager) -> Result<(), DbErr> {
        m.create_table(
            Table::create()
                .table(Jobs::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(Jobs::Id)
                        .string_len(22)
                        .primary_key()
                        .default(Expr::cust("short_uuid()")),
                )
                .col(
                    ColumnDef::new(Jobs::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::cust("CURRENT_TIMESTAMP")),
                )
                .col(
                    ColumnDef::new(Jobs::UpdatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::cust("CURRENT_TIMESTAMP")),
                )
                .col(ColumnDef::new(Jobs::JobType).string().not_null())
                .col(ColumnDef::new(Jobs::EventId).string_len(22).null())
                .col(ColumnDef::new(Jobs::QueryId).string_len(22).null())
                .col(
                    ColumnDef::new(Jobs::Status)
                        .string()
                        .not_null()
                        .default("queued"),
                )
                .col(
                    ColumnDef::new(Jobs::ProgressPercent)
                        .integer()
                        .not_null()
                        .default(0),
                )
                .col(ColumnDef::new(Jobs::Stage).string().null())
                .col(ColumnDef::new(Jobs::ErrorText).text().null())
                .col(
                    ColumnDef::new(Jobs::Payload)
                        .json_binary()
                        .not_null()
                        .default(Expr::cust("'{}'::jsonb")),
                )
                .col(
                    ColumnDef::new(Jobs::Attempts)
                        .integer()
                        .not_null()
                        .default(0),
                )
                .col(
                    ColumnDef::new(Jobs::LockedAt)
                        .timestamp_with_time_zone()
                        .null(),
                )
                .col(
                    ColumnDef::new(Jobs::StartedAt)
                        .timestamp_with_time_zone()
                        .null(),
                )
                .col(
                    ColumnDef::new(Jobs::CompletedAt)
                        .timestamp_with_time_zone()
                        .null(),
                )
                .to_owned(),
        )
        .await?;

        m.create_index(
            Index::create()
                .name("idx_jobs_status_created")
                .table(Jobs::Table)
                .col(Jobs::Status)
                .col(Jobs::CreatedAt)
                .to_owned(),
        )
        .await
    }

    async fn down(&self, m: &SchemaManager) -> Result<(), DbErr> {
        m.drop_table(Table::drop().table(Jobs::Table).to_owned())
            .await
    }
}
