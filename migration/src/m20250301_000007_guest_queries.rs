use sea_orm::EnumIter;
use sea_orm_migration::prelude::*;

use super::m20250301_000002_events::Events;
use super::m20250301_000001_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden, EnumIter)]
pub enum GuestQueries {
    Table,
    Id,
    CreatedAt,
    UpdatedAt,
    EventId,
    GuestUserId,
    Status,
    SelfiePath,
    ExpiresAt,
    Confidence,
    ClusterId,
    Message,
    ErrorText,
    CompletedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, m: &SchemaManager) -> Result<(), DbErr> {
        m.create_table(
            Table::create()
                .table(GuestQueries::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(GuestQueries::Id)
                        .string_len(22)
                        .primary_key()
                        .default(Expr::cust("short_uuid()")),
                )
                .col(
                    ColumnDef::new(GuestQueries::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::cust("CURRENT_TIMESTAMP")),
                )
                .col(
                    ColumnDef::new(GuestQueries::UpdatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::cust("CURRENT_TIMESTAMP")),
                )
                .col(
                    ColumnDef::new(GuestQueries::EventId)
                        .string_len(22)
                        .not_null(),
                )
                .col(
                    ColumnDef::new(GuestQueries::GuestUserId)
                        .string_len(22)
                        .null(),
                )
                .col(
                    ColumnDef::new(GuestQueries::Status)
                        .string()
                        .not_null()
                        .default("queued"),
                )
                .col(ColumnDef::new(GuestQueries::SelfiePath).string().null())
                .col(
                    ColumnDef::new(GuestQueries::ExpiresAt)
                        .timestamp_with_time_zone()
                        .not_null(),
                )
                .col(ColumnDef::new(GuestQueries::Confidence).float().null())
                .col(ColumnDef::new(GuestQueries::ClusterId).integer().null())
                .col(ColumnDef::new(GuestQueries::Message).text().null())
                .col(ColumnDef::new(GuestQueries::ErrorText).text().null())
                .col(
                    ColumnDef::new(GuestQueries::CompletedAt)
                        .timestamp_with_time_zone()
                        .null(),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_guest_queries_event")
                        .from(GuestQueries::Table, GuestQueries::EventId)
                        .to(Events::Table, Events::Id)
                        .on_delete(ForeignKeyAction::Cascade),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_guest_queries_guest_user")
                        .from(GuestQueries::Table, GuestQueries::GuestUserId)
                        .to(Users::Table, Users::Id)
                        .on_delete(ForeignKeyAction::SetNull),
                )
                .to_owned(),
        )
        .await
    }

    async fn down(&self, m: &SchemaManager) -> Result<(), DbErr> {
        m.drop_table(Table::drop().table(GuestQueries::Table).to_owned())
            .await
    }
}
