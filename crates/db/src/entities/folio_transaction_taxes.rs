//! `SeaORM` Entity for folio_transaction_taxes table.
//!
//! Amounts are captured at posting time and never recomputed.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "folio_transaction_taxes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub folio_transaction_id: Uuid,
    pub tax_rate_id: Uuid,
    pub line_order: i32,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub tax_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub tax_rate_percentage: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub taxable_amount: Decimal,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::folio_transactions::Entity",
        from = "Column::FolioTransactionId",
        to = "super::folio_transactions::Column::Id"
    )]
    FolioTransactions,
    #[sea_orm(
        belongs_to = "super::tax_rates::Entity",
        from = "Column::TaxRateId",
        to = "super::tax_rates::Column::Id"
    )]
    TaxRates,
}

impl Related<super::folio_transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FolioTransactions.def()
    }
}

impl Related<super::tax_rates::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TaxRates.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
