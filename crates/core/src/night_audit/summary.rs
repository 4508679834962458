//! Daily summary facts.

use chrono::NaiveDate;
use innkeep_shared::types::HotelId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::AuditMode;
use crate::folio::{TransactionCategory, TransactionStatus};

/// One transaction stamped with the audited working date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryEntry {
    /// Category.
    pub category: TransactionCategory,
    /// Status.
    pub status: TransactionStatus,
    /// Whether the entry is the balancing half of a void.
    pub is_balancing_entry: bool,
    /// Net amount.
    pub net_amount: Decimal,
    /// Discount amount.
    pub discount_amount: Decimal,
    /// Total tax of the entry.
    pub tax_amount: Decimal,
    /// Service charge amount.
    pub service_charge_amount: Decimal,
    /// Signed effect on the balance.
    pub gross_amount: Decimal,
}

/// A folio's closing balance, split by ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FolioBalanceLine {
    /// Balance.
    pub balance: Decimal,
    /// Company (city ledger) folio.
    pub is_company: bool,
}

/// The `daily_summary_facts` row for one hotel and date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySummary {
    /// Hotel.
    pub hotel_id: HotelId,
    /// Audited date.
    pub audit_date: NaiveDate,
    /// Net room revenue.
    pub room_revenue: Decimal,
    /// Net food and beverage revenue.
    pub fnb_revenue: Decimal,
    /// Other net revenue and service charges.
    pub other_revenue: Decimal,
    /// No-show fees.
    pub no_show_revenue: Decimal,
    /// Tax posted.
    pub tax_total: Decimal,
    /// Discounts granted.
    pub discount_total: Decimal,
    /// Payments received, net of refunds.
    pub payment_total: Decimal,
    /// Adjustments and transfers.
    pub adjustment_total: Decimal,
    /// Room charges on the date.
    pub room_charges_posted: i32,
    /// Rooms whose stay covers the date.
    pub rooms_occupied: i32,
    /// Reservations marked no-show.
    pub no_show_count: i32,
    /// Rooms flagged due-out.
    pub due_out_count: i32,
    /// Guest ledger closing balance.
    pub guest_ledger_balance: Decimal,
    /// City ledger closing balance.
    pub city_ledger_balance: Decimal,
    /// Both ledgers.
    pub total_ledger_balance: Decimal,
    /// Mode of the run that produced the row.
    pub audit_mode: AuditMode,
}

impl DailySummary {
    /// Total net revenue.
    #[must_use]
    pub fn total_revenue(&self) -> Decimal {
        self.room_revenue + self.fnb_revenue + self.other_revenue + self.no_show_revenue
    }
}

/// Accumulates a [`DailySummary`].
///
/// Voided originals and their balancing entries are skipped, so a charge
/// voided on a later day drops out of a re-run's revenue.
#[derive(Debug, Clone)]
pub struct DailySummaryBuilder {
    summary: DailySummary,
}

impl DailySummaryBuilder {
    /// Starts an empty summary.
    #[must_use]
    pub fn new(hotel_id: HotelId, audit_date: NaiveDate, audit_mode: AuditMode) -> Self {
        Self {
            summary: DailySummary {
                hotel_id,
                audit_date,
                room_revenue: Decimal::ZERO,
                fnb_revenue: Decimal::ZERO,
                other_revenue: Decimal::ZERO,
                no_show_revenue: Decimal::ZERO,
                tax_total: Decimal::ZERO,
                discount_total: Decimal::ZERO,
                payment_total: Decimal::ZERO,
                adjustment_total: Decimal::ZERO,
                room_charges_posted: 0,
                rooms_occupied: 0,
                no_show_count: 0,
                due_out_count: 0,
                guest_ledger_balance: Decimal::ZERO,
                city_ledger_balance: Decimal::ZERO,
                total_ledger_balance: Decimal::ZERO,
                audit_mode,
            },
        }
    }

    /// Adds transactions.
    #[must_use]
    pub fn with_entries<'a>(mut self, entries: impl IntoIterator<Item = &'a SummaryEntry>) -> Self {
        for entry in entries {
            self.add_entry(entry);
        }
        self
    }

    /// Adds folio closing balances.
    #[must_use]
    pub fn with_balances(mut self, balances: impl IntoIterator<Item = FolioBalanceLine>) -> Self {
        for line in balances {
            if line.is_company {
                self.summary.city_ledger_balance += line.balance;
            } else {
                self.summary.guest_ledger_balance += line.balance;
            }
        }
        self.summary.total_ledger_balance =
            self.summary.guest_ledger_balance + self.summary.city_ledger_balance;
        self
    }

    /// Sets the counts that come from the audit run rather than the ledger.
    #[must_use]
    pub const fn with_counts(mut self, rooms_occupied: i32, no_shows: i32, due_outs: i32) -> Self {
        self.summary.rooms_occupied = rooms_occupied;
        self.summary.no_show_count = no_shows;
        self.summary.due_out_count = due_outs;
        self
    }

    /// Finishes the summary.
    #[must_use]
    pub fn build(self) -> DailySummary {
        self.summary
    }

    fn add_entry(&mut self, entry: &SummaryEntry) {
        if !entry.status.affects_balance() || entry.is_balancing_entry {
            return;
        }
        let s = &mut self.summary;
        s.tax_total += entry.tax_amount;
        s.discount_total += entry.discount_amount;
        s.other_revenue += entry.service_charge_amount;

        match entry.category {
            TransactionCategory::Room => {
                s.room_revenue += entry.net_amount;
                s.room_charges_posted += 1;
            }
            TransactionCategory::FoodAndBeverage => s.fnb_revenue += entry.net_amount,
            TransactionCategory::Miscellaneous | TransactionCategory::ServiceCharge => {
                s.other_revenue += entry.net_amount;
            }
            TransactionCategory::NoShowFee => s.no_show_revenue += entry.net_amount,
            TransactionCategory::Tax => s.tax_total += entry.net_amount,
            TransactionCategory::Payment | TransactionCategory::Refund => {
                s.payment_total -= entry.gross_amount;
            }
            TransactionCategory::Discount => s.discount_total -= entry.gross_amount,
            TransactionCategory::Adjustment
            | TransactionCategory::Transfer
            | TransactionCategory::Void => s.adjustment_total += entry.gross_amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(category: TransactionCategory, net: Decimal, tax: Decimal) -> SummaryEntry {
        SummaryEntry {
            category,
            status: TransactionStatus::Posted,
            is_balancing_entry: false,
            net_amount: net,
            discount_amount: Decimal::ZERO,
            tax_amount: tax,
            service_charge_amount: Decimal::ZERO,
            gross_amount: net + tax,
        }
    }

    #[test]
    fn test_revenue_breakdown() {
        let mut voided = entry(TransactionCategory::Room, dec!(80), dec!(8));
        voided.status = TransactionStatus::Voided;
        let mut balancing = entry(TransactionCategory::Void, dec!(-88), dec!(0));
        balancing.is_balancing_entry = true;

        let entries = vec![
            entry(TransactionCategory::Room, dec!(100), dec!(10)),
            entry(TransactionCategory::FoodAndBeverage, dec!(35), dec!(3.50)),
            entry(TransactionCategory::Payment, dec!(-110), dec!(0)),
            entry(TransactionCategory::NoShowFee, dec!(90), dec!(0)),
            voided,
            balancing,
        ];

        let summary = DailySummaryBuilder::new(
            HotelId::new(),
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            AuditMode::Live,
        )
        .with_entries(&entries)
        .with_balances([
            FolioBalanceLine {
                balance: dec!(38.50),
                is_company: false,
            },
            FolioBalanceLine {
                balance: dec!(500),
                is_company: true,
            },
        ])
        .with_counts(1, 1, 0)
        .build();

        assert_eq!(summary.room_revenue, dec!(100));
        assert_eq!(summary.room_charges_posted, 1);
        assert_eq!(summary.fnb_revenue, dec!(35));
        assert_eq!(summary.no_show_revenue, dec!(90));
        assert_eq!(summary.tax_total, dec!(13.50));
        assert_eq!(summary.payment_total, dec!(110));
        assert_eq!(summary.adjustment_total, dec!(0));
        assert_eq!(summary.total_revenue(), dec!(225));
        assert_eq!(summary.guest_ledger_balance, dec!(38.50));
        assert_eq!(summary.city_ledger_balance, dec!(500));
        assert_eq!(summary.total_ledger_balance, dec!(538.50));
        assert_eq!(summary.no_show_count, 1);
    }
}
