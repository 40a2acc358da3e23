//! `SeaORM` Entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "photos")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub event_id: String,
    pub remote_file_id: String,
    pub file_name: String,
    pub mime: String,
    pub remote_view_url: Option<String>,
    pub remote_preview_url: Option<String>,
    pub remote_download_url: Option<String>,
    pub thumbnail_relative_path: Option<String>,
    pub content_stamp: String,
    pub status: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::events::Entity",
        from = "Column::EventId",
        to = "super::events::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Events,
    #[sea_orm(has_many = "super::faces::Entity")]
    Faces,
    #[sea_orm(has_many = "super::guest_results::Entity")]
    GuestResults,
}

impl Related<super::events::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Events.def()
    }
}

impl Related<super::faces::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Faces.def()
    }
}

impl Related<super::guest_results::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GuestResults.def()
    }
}
