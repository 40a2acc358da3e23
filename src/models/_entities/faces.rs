//! `SeaORM` Entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "faces")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub event_id: String,
    pub photo_id: i32,
    pub face_index: i32,
    #[sea_orm(column_type = "custom(\"vector\")", select_as = "float4[]")]
    pub embedding: Vec<f32>,
    #[sea_orm(column_type = "Float")]
    pub area_ratio: f32,
    #[sea_orm(column_type = "Float")]
    pub det_confidence: f32,
    #[sea_orm(column_type = "Float")]
    pub sharpness: f32,
    #[sea_orm(column_type = "Float")]
    pub bbox_x: f32,
    #[sea_orm(column_type = "Float")]
    pub bbox_y: f32,
    #[sea_orm(column_type = "Float")]
    pub bbox_w: f32,
    #[sea_orm(column_type = "Float")]
    pub bbox_h: f32,
    pub cluster_label: Option<i32>,
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
    #[sea_orm(
        belongs_to = "super::photos::Entity",
        from = "Column::PhotoId",
        to = "super::photos::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Photos,
}

impl Related<super::events::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Events.def()
    }
}

impl Related<super::photos::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Photos.def()
    }
}
