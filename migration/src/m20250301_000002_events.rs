use sea_orm::EnumIter;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden, EnumIter)]
pub enum Events {
    Table,
    Id,
    CreatedAt,
    UpdatedAt,
    Name,
    Slug,
    SourceFolderLink,
    SourceFolderId,
    OwnerUserId,
    GuestCodeHash,
    AdminTokenHash,
    Status,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, m: &SchemaManager) -> Result<(), DbErr> {
        m.create_table(
            Table::create()
                .table(Events::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(Events::Id)
                        .string_len(22)
                        .primary_key()
                        .default(Expr::cust("short_uuid()")),
                )
                .col(
                    ColumnDef::new(Events::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::cust("CURRENT_TIMESTAMP")),
                )
                .col(
                    ColumnDef::new(Events::UpdatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::cust("CURRENT_TIMESTAMP")),
                )
                .col(ColumnDef::new(Events::Name).string().not_null())
                .col(
                    ColumnDef::new(Events::Slug)
                        .string()
                        .not_null()
                        .unique_key(),
                )
                .col(ColumnDef::new(Events::SourceFolderLink).string().not_null())
                .col(ColumnDef::new(Events::SourceFolderId).string().not_null())
                .col(
                    ColumnDef::new(Events::OwnerUserId)
                        .string_len(22)
                        .not_null(),
                )
                .col(ColumnDef::new(Events::GuestCodeHash).string().not_null())
                .col(ColumnDef::new(Events::AdminTokenHash).string().not_null())
                .col(
                    ColumnDef::new(Events::Status)
                        .string()
                        .not_null()
                        .default("queued"),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_events_owner_user")
                        .from(Events::Table, Events::OwnerUserId)
                        .to(super::m20250301_000001_users::Users::Table, super::m20250301_000001_users::Users::Id)
                        .on_delete(ForeignKeyAction::Cascade),
                )
                .to_owned(),
        )
        .await?;

        m.create_index(
            Index::create()
                .name("idx_events_owner")
                .table(Events::Table)
                .col(Events::OwnerUserId)
                .to_owned(),
        )
        .await
    }

    async fn down(&self, m: &SchemaManager) -> Result<(), DbErr> {
        m.drop_table(Table::drop().table(Events::Table).to_owned())
            .await
    }
}
