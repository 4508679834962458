//! Daily summary repository: ledger inputs and the upserted facts row.

use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use innkeep_core::folio::FolioStatus;
use innkeep_core::night_audit::{
    DailySummary, FolioBalanceLine, NightAuditError, SummaryEntry,
};
use innkeep_shared::types::HotelId;

use crate::entities::{daily_summary_facts, folio_transactions, folios};

/// Daily summary repository.
#[derive(Debug, Clone)]
pub struct DailySummaryRepository {
    db: DatabaseConnection,
}

impl DailySummaryRepository {
    /// Creates a new daily summary repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Transactions stamped with `date` as their working date.
    pub async fn summary_entries(
        &self,
        hotel_id: HotelId,
        date: NaiveDate,
    ) -> Result<Vec<SummaryEntry>, NightAuditError> {
        folio_transactions::Entity::find()
            .filter(folio_transactions::Column::HotelId.eq(hotel_id.into_inner()))
            .filter(folio_transactions::Column::CurrentWorkingDate.eq(date))
            .order_by_asc(folio_transactions::Column::TransactionNumber)
            .all(&self.db)
            .await
            .map_err(database_error)?
            .into_iter()
            .map(|t| {
                Ok(SummaryEntry {
                    category: t.category.parse()?,
                    status: t.status.parse()?,
                    is_balancing_entry: t.is_balancing_entry,
                    net_amount: t.net_amount,
                    discount_amount: t.discount_amount,
                    tax_amount: t.tax_amount,
                    service_charge_amount: t.service_charge_amount,
                    gross_amount: t.gross_amount,
                })
            })
            .collect()
    }

    /// Current balances of every folio that is not voided. Folios billed to a
    /// company count toward the city ledger.
    pub async fn ledger_balances(
        &self,
        hotel_id: HotelId,
    ) -> Result<Vec<FolioBalanceLine>, NightAuditError> {
        Ok(folios::Entity::find()
            .filter(folios::Column::HotelId.eq(hotel_id.into_inner()))
            .filter(folios::Column::Status.ne(FolioStatus::Voided.as_str()))
            .all(&self.db)
            .await
            .map_err(database_error)?
            .into_iter()
            .map(|f| FolioBalanceLine {
                balance: f.balance,
                is_company: f.company_id.is_some(),
            })
            .collect())
    }

    /// Writes the summary, replacing any row for the same hotel and date.
    #[instrument(skip(self, summary), fields(hotel_id = %summary.hotel_id, audit_date = %summary.audit_date))]
    pub async fn upsert(
        &self,
        summary: &DailySummary,
    ) -> Result<daily_summary_facts::Model, NightAuditError> {
        let row = daily_summary_facts::ActiveModel {
            id: Set(Uuid::now_v7()),
            hotel_id: Set(summary.hotel_id.into_inner()),
            audit_date: Set(summary.audit_date),
            room_revenue: Set(summary.room_revenue),
            fnb_revenue: Set(summary.fnb_revenue),
            other_revenue: Set(summary.other_revenue),
            no_show_revenue: Set(summary.no_show_revenue),
            tax_total: Set(summary.tax_total),
            discount_total: Set(summary.discount_total),
            payment_total: Set(summary.payment_total),
            adjustment_total: Set(summary.adjustment_total),
            room_charges_posted: Set(summary.room_charges_posted),
            rooms_occupied: Set(summary.rooms_occupied),
            no_show_count: Set(summary.no_show_count),
            due_out_count: Set(summary.due_out_count),
            guest_ledger_balance: Set(summary.guest_ledger_balance),
            city_ledger_balance: Set(summary.city_ledger_balance),
            total_ledger_balance: Set(summary.total_ledger_balance),
            audit_mode: Set(summary.audit_mode.as_str().to_string()),
            generated_at: Set(Utc::now().into()),
        };

        use daily_summary_facts::Column;
        daily_summary_facts::Entity::insert(row)
            .on_conflict(
                OnConflict::columns([Column::HotelId, Column::AuditDate])
                    .update_columns([
                        Column::RoomRevenue,
                        Column::FnbRevenue,
                        Column::OtherRevenue,
                        Column::NoShowRevenue,
                        Column::TaxTotal,
                        Column::DiscountTotal,
                        Column::PaymentTotal,
                        Column::AdjustmentTotal,
                        Column::RoomChargesPosted,
                        Column::RoomsOccupied,
                        Column::NoShowCount,
                        Column::DueOutCount,
                        Column::GuestLedgerBalance,
                        Column::CityLedgerBalance,
                        Column::TotalLedgerBalance,
                        Column::AuditMode,
                        Column::GeneratedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await
            .map_err(database_error)?;

        let stored = self
            .find(summary.hotel_id, summary.audit_date)
            .await?
            .ok_or_else(|| NightAuditError::Database("daily summary missing after upsert".into()))?;
        debug!(total_revenue = %summary.total_revenue(), "Daily summary written");
        Ok(stored)
    }

    /// Finds the summary row for a hotel and date.
    pub async fn find(
        &self,
        hotel_id: HotelId,
        audit_date: NaiveDate,
    ) -> Result<Option<daily_summary_facts::Model>, NightAuditError> {
        daily_summary_facts::Entity::find()
            .filter(daily_summary_facts::Column::HotelId.eq(hotel_id.into_inner()))
            .filter(daily_summary_facts::Column::AuditDate.eq(audit_date))
            .one(&self.db)
            .await
            .map_err(database_error)
    }
}

/// Converts a stored row back into the domain summary.
///
/// # Errors
///
/// Returns `UnknownValue` if `audit_mode` is not recognized.
pub fn to_summary(row: &daily_summary_facts::Model) -> Result<DailySummary, NightAuditError> {
    Ok(DailySummary {
        hotel_id: HotelId::from_uuid(row.hotel_id),
        audit_date: row.audit_date,
        room_revenue: row.room_revenue,
        fnb_revenue: row.fnb_revenue,
        other_revenue: row.other_revenue,
        no_show_revenue: row.no_show_revenue,
        tax_total: row.tax_total,
        discount_total: row.discount_total,
        payment_total: row.payment_total,
        adjustment_total: row.adjustment_total,
        room_charges_posted: row.room_charges_posted,
        rooms_occupied: row.rooms_occupied,
        no_show_count: row.no_show_count,
        due_out_count: row.due_out_count,
        guest_ledger_balance: row.guest_ledger_balance,
        city_ledger_balance: row.city_ledger_balance,
        total_ledger_balance: row.total_ledger_balance,
        audit_mode: row.audit_mode.parse()?,
    })
}

fn database_error(err: DbErr) -> NightAuditError {
    NightAuditError::Database(err.to_string())
}
