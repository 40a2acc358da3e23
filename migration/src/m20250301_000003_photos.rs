use sea_orm::EnumIter;
use sea_orm_migration::prelude::*;

use super::m20250301_000002_events::Events;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden, EnumIter)]
pub enum Photos {
    Table,
    Id,
    CreatedAt,
    UpdatedAt,
    EventId,
    RemoteFileId,
    FileName,
    Mime,
    RemoteViewUrl,
    RemotePreviewUrl,
    RemoteDownloadUrl,
    ThumbnailRelativePath,
    ContentStamp,
    Status,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, m: &SchemaManager) -> Result<(), DbErr> {
        m.create_table(
            Table::create()
                .table(Photos::Table)
                .if_not_exists()
                .col(pk_auto(Photos::Id))
                .col(
                    ColumnDef::new(Photos::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::cust("CURRENT_TIMESTAMP")),
                )
                .col(
                    ColumnDef::new(Photos::UpdatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::cust("CURRENT_TIMESTAMP")),
                )
                .col(ColumnDef::new(Photos::EventId).string_len(22).not_null())
                .col(ColumnDef::new(Photos::RemoteFileId).string().not_null())
                .col(ColumnDef::new(Photos::FileName).string().not_null())
                .col(ColumnDef::new(Photos::Mime).string().not_null())
                .col(ColumnDef::new(Photos::RemoteViewUrl).string().null())
                .col(ColumnDef::new(Photos::RemotePreviewUrl).string().null())
                .col(ColumnDef::new(Photos::RemoteDownloadUrl).string().null())
                .col(
                    ColumnDef::new(Photos::ThumbnailRelativePath)
                        .string()
                        .null(),
                )
                .col(ColumnDef::new(Photos::ContentStamp).string().not_null())
                .col(
                    ColumnDef::new(Photos::Status)
                        .string()
                        .not_null()
                        .default("synced"),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_photos_event")
                        .from(Photos::Table, Photos::EventId)
                        .to(Events::Table, Events::Id)
                        .on_delete(ForeignKeyAction::Cascade),
                )
                .to_owned(),
        )
        .await?;

        m.create_index(
            Index::create()
                .name("idx_photos_event_remote_unique")
                .table(Photos::Table)
                .col(Photos::EventId)
                .col(Photos::RemoteFileId)
                .unique()
                .to_owned(),
        )
        .await
    }

    async fn down(&self, m: &SchemaManager) -> Result<(), DbErr> {
        m.drop_table(Table::drop().table(Photos::Table).to_owned())
            .await
    }
}
