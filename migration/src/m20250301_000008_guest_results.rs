use sea_orm::EnumIter;
use sea_orm_migration::prelude::*;

use super::m20250301_000003_photos::Photos;
use super::m20250301_000007_guest_queries::GuestQueries;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden, EnumIter)]
pub enum GuestResults {
    Table,
    Id,
    CreatedAt,
    UpdatedAt,
    QueryId,
    PhotoId,
    Score,
    Rank,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, m: &SchemaManager) -> Result<(), DbErr> {
        m.create_table(
            Table::create()
                .table(GuestResults::Table)
                .if_not_exists()
                .col(pk_auto(GuestResults::Id))
                .col(
                    ColumnDef::new(GuestResults::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::cust("CURRENT_TIMESTAMP")),
                )
                .col(
                    ColumnDef::new(GuestResults::UpdatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::cust("CURRENT_TIMESTAMP")),
                )
                .col(
                    ColumnDef::new(GuestResults::QueryId)
                        .string_len(22)
                        .not_null(),
                )
                .col(ColumnDef::new(GuestResults::PhotoId).integer().not_null())
                .col(ColumnDef::new(GuestResults::Score).float().not_null())
                .col(ColumnDef::new(GuestResults::Rank).integer().not_null())
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_guest_results_query")
                        .from(GuestResults::Table, GuestResults::QueryId)
                        .to(GuestQueries::Table, GuestQueries::Id)
                        .on_delete(ForeignKeyAction::Cascade),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_guest_results_photo")
                        .from(GuestResults::Table, GuestResults::PhotoId)
                        .to(Photos::Table, Photos::Id)
                        .on_delete(ForeignKeyAction::Cascade),
                )
                .to_owned(),
        )
        .await?;

        m.create_index(
            Index::create()
                .name("idx_guest_results_query_photo_unique")
                .table(GuestResults::Table)
                .col(GuestResults::QueryId)
                .col(GuestResults::PhotoId)
                .unique()
                .to_owned(),
        )
        .await
    }

    async fn down(&self, m: &SchemaManager) -> Result<(), DbErr> {
        m.drop_table(Table::drop().table(GuestResults::Table).to_owned())
            .await
    }
}
