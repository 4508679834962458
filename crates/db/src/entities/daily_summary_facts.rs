//! `SeaORM` Entity for daily_summary_facts table.
//!
//! One row per `(hotel_id, audit_date)`, rewritten by every audit run of
//! that date.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "daily_summary_facts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub audit_date: Date,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub room_revenue: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub fnb_revenue: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub other_revenue: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub no_show_revenue: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub tax_total: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub discount_total: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub payment_total: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub adjustment_total: Decimal,
    pub room_charges_posted: i32,
    pub rooms_occupied: i32,
    pub no_show_count: i32,
    pub due_out_count: i32,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub guest_ledger_balance: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub city_ledger_balance: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_ledger_balance: Decimal,
    pub audit_mode: String,
    pub generated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::hotels::Entity",
        from = "Column::HotelId",
        to = "super::hotels::Column::Id"
    )]
    Hotels,
}

impl Related<super::hotels::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Hotels.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
