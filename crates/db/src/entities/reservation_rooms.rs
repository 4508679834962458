//! `SeaORM` Entity for reservation_rooms table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "reservation_rooms")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub hotel_id: Uuid,
    pub folio_id: Option<Uuid>,
    pub room_type_id: Option<Uuid>,
    pub rate_type_id: Option<Uuid>,
    pub arrival_date: Date,
    pub departure_date: Date,
    pub adults: i32,
    pub children: i32,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub nightly_rate: Decimal,
    pub meal_plan: String,
    pub meal_plan_included: bool,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub meal_plan_amount: Decimal,
    pub status: String,
    pub is_due_out: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::reservations::Entity",
        from = "Column::ReservationId",
        to = "super::reservations::Column::Id"
    )]
    Reservations,
}

impl Related<super::reservations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reservations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
