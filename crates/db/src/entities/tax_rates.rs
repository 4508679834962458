//! `SeaORM` Entity for tax_rates table.
//!
//! For `flat_amount` taxes `rate_percentage` holds the fixed amount.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "tax_rates")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub name: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub rate_percentage: Decimal,
    pub posting_type: String,
    pub apply_tax: String,
    pub applies_to_room_rate: bool,
    pub applies_to_fnb: bool,
    pub applies_to_other: bool,
    pub effective_date: Date,
    pub end_date: Option<Date>,
    pub exempt_after: Option<i32>,
    pub priority: i32,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::hotels::Entity",
        from = "Column::HotelId",
        to = "super::hotels::Column::Id"
    )]
    Hotels,
    #[sea_orm(has_many = "super::tax_rate_slabs::Entity")]
    TaxRateSlabs,
}

impl Related<super::hotels::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Hotels.def()
    }
}

impl Related<super::tax_rate_slabs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TaxRateSlabs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
