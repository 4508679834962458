//! `SeaORM` Entity for folio_transactions table.
//!
//! Rows are append-only; only `status`, `voided_*` and `updated_at` change
//! after insert.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "folio_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub folio_id: Uuid,
    pub transaction_number: i64,
    pub reservation_room_id: Option<Uuid>,
    pub guest_id: Option<Uuid>,
    pub category: String,
    pub transaction_type: String,
    pub description: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((9, 4)))", nullable)]
    pub discount_rate: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub discount_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((9, 4)))")]
    pub tax_rate: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub tax_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub net_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((9, 4)))", nullable)]
    pub service_charge_rate: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub service_charge_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub gross_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub balance_after: Decimal,
    pub status: String,
    pub is_balancing_entry: bool,
    pub reverses_transaction_id: Option<Uuid>,
    pub current_working_date: Date,
    pub created_by: Option<Uuid>,
    pub voided_at: Option<DateTimeWithTimeZone>,
    pub voided_by: Option<Uuid>,
    pub void_reason: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::folios::Entity",
        from = "Column::FolioId",
        to = "super::folios::Column::Id"
    )]
    Folios,
    #[sea_orm(has_many = "super::folio_transaction_taxes::Entity")]
    FolioTransactionTaxes,
}

impl Related<super::folios::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Folios.def()
    }
}

impl Related<super::folio_transaction_taxes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FolioTransactionTaxes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
