//! `SeaORM` Entity for reservations table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "reservations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub guest_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub status: String,
    pub arrival_date: Date,
    pub departure_date: Date,
    pub no_show_date: Option<Date>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::reservation_rooms::Entity")]
    ReservationRooms,
}

impl Related<super::reservation_rooms::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ReservationRooms.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
