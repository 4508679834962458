//! `SeaORM` Entity for hotels table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "hotels")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub timezone: String,
    pub currency: String,
    pub current_working_date: Date,
    pub night_audit_start_time: Time,
    pub night_audit_end_time: Time,
    pub last_night_audit_date: Option<Date>,
    pub no_show_fee_policy: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::folios::Entity")]
    Folios,
    #[sea_orm(has_many = "super::tax_rates::Entity")]
    TaxRates,
}

impl Related<super::folios::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Folios.def()
    }
}

impl Related<super::tax_rates::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TaxRates.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
