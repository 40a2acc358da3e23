//! `SeaORM` Entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub job_type: String,
    pub event_id: Option<String>,
    pub query_id: Option<String>,
    pub status: String,
    pub progress_percent: i32,
    pub stage: Option<String>,
    pub error_text: Option<String>,
    pub payload: serde_json::Value,
    pub attempts: i32,
    pub locked_at: Option<DateTimeWithTimeZone>,
    pub started_at: Option<DateTimeWithTimeZone>,
    pub completed_at: Option<DateTimeWithTimeZone>,
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
        belongs_to = "super::guest_queries::Entity",
        from = "Column::QueryId",
        to = "super::guest_queries::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    GuestQueries,
}

impl Related<super::events::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Events.def()
    }
}

impl Related<super::guest_queries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GuestQueries.def()
    }
}
