//! `SeaORM` Entity for tax_rate_dependencies table.
//!
//! An edge `tax_rate_id → depends_on_tax_rate_id` means the dependent tax
//! is computed on a base that includes the dependency's amount.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "tax_rate_dependencies")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub tax_rate_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub depends_on_tax_rate_id: Uuid,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tax_rates::Entity",
        from = "Column::TaxRateId",
        to = "super::tax_rates::Column::Id"
    )]
    TaxRates,
}

impl Related<super::tax_rates::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TaxRates.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
