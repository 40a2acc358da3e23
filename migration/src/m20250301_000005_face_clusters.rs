use sea_orm::EnumIter;
use sea_orm_migration::prelude::*;

use super::m20250301_000002_events::Events;
use super::m20250301_000003_photos::Photos;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden, EnumIter)]
pub enum FaceClusters {
    Table,
    Id,
    CreatedAt,
    UpdatedAt,
    EventId,
    ClusterLabel,
    Centroid,
    FaceCount,
    CoverPhotoId,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, m: &SchemaManager) -> Result<(), DbErr> {
        m.create_table(
            Table::create()
                .table(FaceClusters::Table)
                .if_not_exists()
                .col(pk_auto(FaceClusters::Id))
                .col(
                    ColumnDef::new(FaceClusters::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::cust("CURRENT_TIMESTAMP")),
                )
                .col(
                    ColumnDef::new(FaceClusters::UpdatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::cust("CURRENT_TIMESTAMP")),
                )
                .col(
                    ColumnDef::new(FaceClusters::EventId)
                        .string_len(22)
                        .not_null(),
                )
                .col(
                    ColumnDef::new(FaceClusters::ClusterLabel)
                        .integer()
                        .not_null(),
                )
                .col(
                    ColumnDef::new(FaceClusters::Centroid)
                        .vector(Some(512))
                        .not_null(),
                )
                .col(
                    ColumnDef::new(FaceClusters::FaceCount)
                        .integer()
                        .not_null(),
                )
                .col(ColumnDef::new(FaceClusters::CoverPhotoId).integer().null())
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_face_clusters_event")
                        .from(FaceClusters::Table, FaceClusters::EventId)
                        .to(Events::Table, Events::Id)
                        .on_delete(ForeignKeyAction::Cascade),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_face_clusters_cover_photo")
                        .from(FaceClusters::Table, FaceClusters::CoverPhotoId)
                        .to(Photos::Table, Photos::Id)
                        .on_delete(ForeignKeyAction::SetNull),
                )
                .to_owned(),
        )
        .await?;

        m.create_index(
            Index::create()
                .name("idx_face_clusters_event_label_unique")
                .table(FaceClusters::Table)
                .col(FaceClusters::EventId)
                .col(FaceClusters::ClusterLabel)
                .unique()
                .to_owned(),
        )
        .await
    }

    async fn down(&self, m: &SchemaManager) -> Result<(), DbErr> {
        m.drop_table(Table::drop().table(FaceClusters::Table).to_owned())
            .await
    }
}
