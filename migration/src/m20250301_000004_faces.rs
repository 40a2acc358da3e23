use sea_orm::EnumIter;
use sea_orm_migration::prelude::*;

use super::m20250301_000002_events::Events;
use super::m20250301_000003_photos::Photos;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden, EnumIter)]
pub enum Faces {
    Table,
    Id,
    CreatedAt,
    UpdatedAt,
    EventId,
    PhotoId,
    FaceIndex,
    Embedding,
    AreaRatio,
    DetConfidence,
    Sharpness,
    BboxX,
    BboxY,
    BboxW,
    BboxH,
    ClusterLabel,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, m: &SchemaManager) -> Result<(), DbErr> {
        m.create_table(
            Table::create()
                .table(Faces::Table)
                .if_not_exists()
                .col(pk_auto(Faces::Id))
                .col(
                    ColumnDef::new(Faces::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::cust("CURRENT_TIMESTAMP")),
                )
                .col(
                    ColumnDef::new(Faces::UpdatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::cust("CURRENT_TIMESTAMP")),
                )
                .col(ColumnDef::new(Faces::EventId).string_len(22).not_null())
                .col(ColumnDef::new(Faces::PhotoId).integer().not_null())
                .col(ColumnDef::new(Faces::FaceIndex).integer().not_null())
                .col(
                    ColumnDef::new(Faces::Embedding)
                        .vector(Some(512))
                        .not_null(),
                )
                .col(ColumnDef::new(Faces::AreaRatio).float().not_null())
                .col(ColumnDef::new(Faces::DetConfidence).float().not_null())
                .col(ColumnDef::new(Faces::Sharpness).float().not_null())
                .col(ColumnDef::new(Faces::BboxX).float().not_null())
                .col(ColumnDef::new(Faces::BboxY).float().not_null())
                .col(ColumnDef::new(Faces::BboxW).float().not_null())
                .col(ColumnDef::new(Faces::BboxH).float().not_null())
                .col(ColumnDef::new(Faces::ClusterLabel).integer().null())
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_faces_event")
                        .from(Faces::Table, Faces::EventId)
                        .to(Events::Table, Events::Id)
                        .on_delete(ForeignKeyAction::Cascade),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_faces_photo")
                        .from(Faces::Table, Faces::PhotoId)
                        .to(Photos::Table, Photos::Id)
                        .on_delete(ForeignKeyAction::Cascade),
                )
                .to_owned(),
        )
        .await?;

        m.create_index(
            Index::create()
                .name("idx_faces_photo_index_unique")
                .table(Faces::Table)
                .col(Faces::PhotoId)
                .col(Faces::FaceIndex)
                .unique()
                .to_owned(),
        )
        .await?;

        m.get_connection()
            .execute_unprepared(
                r"
                CREATE INDEX faces_embedding_idx ON faces
                USING hnsw (embedding vector_cosine_ops)
                WITH (m = 16, ef_construction = 200)
                ",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, m: &SchemaManager) -> Result<(), DbErr> {
        m.drop_table(Table::drop().table(Faces::Table).to_owned())
            .await
    }
}
