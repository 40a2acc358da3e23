//! `SeaORM` Entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub name: String,
    #[sea_orm(unique)]
    pub slug: String,
    pub source_folder_link: String,
    pub source_folder_id: String,
    pub owner_user_id: String,
    pub guest_code_hash: String,
    pub admin_token_hash: String,
    pub status: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::OwnerUserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Users,
    #[sea_orm(has_many = "super::photos::Entity")]
    Photos,
    #[sea_orm(has_many = "super::faces::Entity")]
    Faces,
    #[sea_orm(has_many = "super::face_clusters::Entity")]
    FaceClusters,
    #[sea_orm(has_many = "super::guest_queries::Entity")]
    GuestQueries,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::photos::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Photos.def()
    }
}

impl Related<super::faces::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Faces.def()
    }
}

impl Related<super::face_clusters::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FaceClusters.def()
    }
}

impl Related<super::guest_queries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GuestQueries.def()
    }
}
