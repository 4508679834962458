//! Posting math for folio transactions.

use std::collections::HashMap;

use chrono::NaiveDate;
use innkeep_shared::types::TaxRateId;
use rust_decimal::Decimal;

use super::error::LedgerError;
use super::hook::{StatusChange, TransactionStatusHook};
use super::types::{
    Direction, FolioSnapshot, FolioStatus, PostingInput, PostingModifier, TransactionCategory,
    TransactionType,
};
use crate::money::{percent_of, round_money};
use crate::tax::{TaxComputation, TaxContext, TaxEngine, TaxGraph};

/// A validated posting, ready to be written in one storage transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingPlan {
    /// Category.
    pub category: TransactionCategory,
    /// Debit or credit.
    pub transaction_type: TransactionType,
    /// Signed amount before discount.
    pub amount: Decimal,
    /// Discount percentage, when given as a rate.
    pub discount_rate: Option<Decimal>,
    /// Discount amount.
    pub discount_amount: Decimal,
    /// `amount - discount_amount`.
    pub net_amount: Decimal,
    /// Tax lines, in dependency order.
    pub taxes: TaxComputation,
    /// Service charge percentage, when given as a rate.
    pub service_charge_rate: Option<Decimal>,
    /// Service charge amount.
    pub service_charge_amount: Decimal,
    /// `net + tax + service charge`; the signed effect on the balance.
    pub gross_amount: Decimal,
    /// Balance read under lock.
    pub previous_balance: Decimal,
    /// Running balance snapshot after this posting.
    pub balance_after: Decimal,
    /// Status transition decided by the hook.
    pub status_change: Option<StatusChange>,
    /// Business date stamped on the row.
    pub working_date: NaiveDate,
}

impl PostingPlan {
    /// Folio status after the posting.
    #[must_use]
    pub fn resulting_status(&self, current: FolioStatus) -> FolioStatus {
        self.status_change.map_or(current, |c| c.to)
    }
}

/// Folio ledger service.
///
/// This service contains pure business logic with no database dependencies.
/// Repositories lock the folio, call into it, and persist the returned plan.
pub struct FolioService;

impl FolioService {
    /// Validate and price a posting against a locked folio.
    ///
    /// 1. Rejects non-postable folios and zero amounts
    /// 2. Normalises the sign from the category direction
    /// 3. Computes the discount (rate wins, capped at the amount)
    /// 4. Computes taxes through the tax engine
    /// 5. Adds the service charge on the net amount
    /// 6. Derives the new balance and runs the status hook
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` if validation fails.
    pub fn prepare_posting(
        folio: &FolioSnapshot,
        input: &PostingInput,
        working_date: NaiveDate,
        taxes: &TaxGraph,
        prior_tax_occurrences: &HashMap<TaxRateId, u32>,
    ) -> Result<PostingPlan, LedgerError> {
        if !folio.status.is_postable() {
            return Err(LedgerError::FolioNotPostable {
                folio_id: folio.id,
                status: folio.status,
            });
        }

        let amount = Self::signed_amount(input)?;
        let category = input.category;

        if !category.accepts_modifiers()
            && !(input.discount.is_none() && input.service_charge.is_none())
        {
            return Err(LedgerError::ModifierNotAllowed(category));
        }

        let (discount_rate, discount_amount) =
            Self::resolve_modifier(&input.discount, amount, "discount")?;
        let discount_amount = discount_amount.min(amount.abs());
        let net_amount = amount - discount_amount;

        let tax_result = if category.direction() == Direction::Charge {
            TaxEngine::compute(
                taxes,
                &TaxContext {
                    date: working_date,
                    category: category.taxable_category(),
                    amount,
                    discount: discount_amount,
                    prior_occurrences: prior_tax_occurrences.clone(),
                },
            )
        } else {
            TaxComputation::default()
        };

        let (service_charge_rate, service_charge_amount) =
            Self::resolve_modifier(&input.service_charge, net_amount, "service charge")?;

        let gross_amount = net_amount + tax_result.total + service_charge_amount;
        let balance_after = folio.balance + gross_amount;

        Ok(PostingPlan {
            category,
            transaction_type: input.transaction_type,
            amount,
            discount_rate,
            discount_amount,
            net_amount,
            taxes: tax_result,
            service_charge_rate,
            service_charge_amount,
            gross_amount,
            previous_balance: folio.balance,
            balance_after,
            status_change: TransactionStatusHook::evaluate(folio.status, balance_after),
            working_date,
        })
    }

    /// Checks that a folio may be voided.
    ///
    /// # Errors
    ///
    /// Returns `FolioNotPostable` if the folio is not open or closed, and
    /// `FolioHasBalance` if the balance is not zero.
    pub fn validate_folio_void(folio: &FolioSnapshot) -> Result<(), LedgerError> {
        if !folio.status.is_postable() {
            return Err(LedgerError::FolioNotPostable {
                folio_id: folio.id,
                status: folio.status,
            });
        }
        if !folio.balance.is_zero() {
            return Err(LedgerError::FolioHasBalance {
                folio_id: folio.id,
                balance: folio.balance,
            });
        }
        Ok(())
    }

    /// Rounds the amount and applies the category direction.
    fn signed_amount(input: &PostingInput) -> Result<Decimal, LedgerError> {
        let raw = round_money(input.amount);
        if raw.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }

        let amount = match input.category.direction() {
            Direction::Charge => {
                if raw < Decimal::ZERO {
                    return Err(LedgerError::NegativeCharge(input.category));
                }
                raw
            }
            Direction::Credit => -raw.abs(),
            Direction::Signed => raw,
        };

        if TransactionType::for_amount(amount) != input.transaction_type {
            return Err(LedgerError::TransactionTypeMismatch {
                category: input.category,
                transaction_type: input.transaction_type,
            });
        }
        Ok(amount)
    }

    /// Returns `(rate, amount)`; the rate wins when both are given.
    fn resolve_modifier(
        modifier: &PostingModifier,
        base: Decimal,
        what: &'static str,
    ) -> Result<(Option<Decimal>, Decimal), LedgerError> {
        if let Some(rate) = modifier.rate {
            if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
                return Err(LedgerError::InvalidModifier(what));
            }
            return Ok((Some(rate), percent_of(base, rate)));
        }
        match modifier.amount {
            Some(amount) if amount < Decimal::ZERO => Err(LedgerError::InvalidModifier(what)),
            Some(amount) => Ok((None, round_money(amount))),
            None => Ok((None, Decimal::ZERO)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tax::{ApplyTax, PostingType, TaxRate};
    use innkeep_shared::types::{FolioId, HotelId};
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn folio(balance: Decimal, status: FolioStatus) -> FolioSnapshot {
        FolioSnapshot {
            id: FolioId::new(),
            hotel_id: HotelId::new(),
            status,
            balance,
        }
    }

    fn vat_graph(hotel_id: HotelId, rate: Decimal) -> TaxGraph {
        TaxGraph::build(
            hotel_id,
            vec![TaxRate {
                id: TaxRateId::new(),
                hotel_id,
                name: "VAT".to_string(),
                rate_percentage: rate,
                posting_type: PostingType::FlatPercentage,
                apply_tax: ApplyTax::AfterDiscount,
                applies_to_room_rate: true,
                applies_to_fnb: true,
                applies_to_other: false,
                effective_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                end_date: None,
                exempt_after: None,
                tax_apply_after: Vec::new(),
                priority: 0,
                is_active: true,
                slabs: Vec::new(),
            }],
        )
        .unwrap()
    }

    fn post(
        folio: &FolioSnapshot,
        input: &PostingInput,
        graph: &TaxGraph,
    ) -> Result<PostingPlan, LedgerError> {
        FolioService::prepare_posting(folio, input, date(), graph, &HashMap::new())
    }

    #[test]
    fn test_scenario_room_charge_then_payment_closes_folio() {
        let mut f = folio(dec!(0), FolioStatus::Open);
        let graph = vat_graph(f.hotel_id, dec!(10));

        let room = PostingInput::new(
            f.id,
            TransactionCategory::Room,
            TransactionType::Debit,
            dec!(100),
        );
        let plan = post(&f, &room, &graph).unwrap();
        assert_eq!(plan.amount, dec!(100));
        assert_eq!(plan.taxes.total, dec!(10));
        assert_eq!(plan.gross_amount, dec!(110));
        assert_eq!(plan.balance_after, dec!(110));
        assert_eq!(plan.status_change, None);

        f.balance = plan.balance_after;
        f.status = plan.resulting_status(f.status);

        let payment = PostingInput::new(
            f.id,
            TransactionCategory::Payment,
            TransactionType::Credit,
            dec!(-110),
        );
        let plan = post(&f, &payment, &graph).unwrap();
        assert_eq!(plan.gross_amount, dec!(-110));
        assert!(plan.taxes.is_empty());
        assert_eq!(plan.balance_after, dec!(0));
        assert_eq!(
            plan.status_change,
            Some(StatusChange {
                from: FolioStatus::Open,
                to: FolioStatus::Closed
            })
        );
    }

    #[test]
    fn test_positive_payment_normalised_to_credit() {
        let f = folio(dec!(50), FolioStatus::Open);
        let graph = TaxGraph::empty(f.hotel_id);
        let input = PostingInput::new(
            f.id,
            TransactionCategory::Payment,
            TransactionType::Credit,
            dec!(20),
        );
        let plan = post(&f, &input, &graph).unwrap();
        assert_eq!(plan.amount, dec!(-20));
        assert_eq!(plan.balance_after, dec!(30));
    }

    #[test]
    fn test_discount_rate_wins_and_tax_after_discount() {
        let f = folio(dec!(0), FolioStatus::Open);
        let graph = vat_graph(f.hotel_id, dec!(10));
        let input = PostingInput::new(
            f.id,
            TransactionCategory::Room,
            TransactionType::Debit,
            dec!(200),
        )
        .with_discount(PostingModifier {
            rate: Some(dec!(25)),
            amount: Some(dec!(5)),
        })
        .with_service_charge(PostingModifier::rate(dec!(10)));

        let plan = post(&f, &input, &graph).unwrap();
        assert_eq!(plan.discount_rate, Some(dec!(25)));
        assert_eq!(plan.discount_amount, dec!(50));
        assert_eq!(plan.net_amount, dec!(150));
        assert_eq!(plan.taxes.total, dec!(15));
        assert_eq!(plan.service_charge_amount, dec!(15));
        assert_eq!(plan.gross_amount, dec!(180));
    }

    #[test]
    fn test_discount_capped_at_amount() {
        let f = folio(dec!(0), FolioStatus::Open);
        let graph = TaxGraph::empty(f.hotel_id);
        let input = PostingInput::new(
            f.id,
            TransactionCategory::FoodAndBeverage,
            TransactionType::Debit,
            dec!(30),
        )
        .with_discount(PostingModifier::amount(dec!(45)));
        let plan = post(&f, &input, &graph).unwrap();
        assert_eq!(plan.discount_amount, dec!(30));
        assert_eq!(plan.net_amount, dec!(0));
    }

    #[test]
    fn test_closed_folio_reopens_on_charge() {
        let f = folio(dec!(0), FolioStatus::Closed);
        let graph = TaxGraph::empty(f.hotel_id);
        let input = PostingInput::new(
            f.id,
            TransactionCategory::Miscellaneous,
            TransactionType::Debit,
            dec!(12.50),
        );
        let plan = post(&f, &input, &graph).unwrap();
        assert_eq!(plan.resulting_status(f.status), FolioStatus::Open);
    }

    #[test]
    fn test_rejections() {
        let graph = TaxGraph::empty(HotelId::new());
        let voided = folio(dec!(0), FolioStatus::Voided);
        let charge = |f: &FolioSnapshot, amount| {
            PostingInput::new(f.id, TransactionCategory::Room, TransactionType::Debit, amount)
        };

        assert!(matches!(
            post(&voided, &charge(&voided, dec!(10)), &graph),
            Err(LedgerError::FolioNotPostable { .. })
        ));

        let open = folio(dec!(0), FolioStatus::Open);
        assert!(matches!(
            post(&open, &charge(&open, dec!(0.001)), &graph),
            Err(LedgerError::ZeroAmount)
        ));
        assert!(matches!(
            post(&open, &charge(&open, dec!(-10)), &graph),
            Err(LedgerError::NegativeCharge(TransactionCategory::Room))
        ));

        let wrong_type = PostingInput::new(
            open.id,
            TransactionCategory::Room,
            TransactionType::Credit,
            dec!(10),
        );
        assert!(matches!(
            post(&open, &wrong_type, &graph),
            Err(LedgerError::TransactionTypeMismatch { .. })
        ));

        let discounted_payment = PostingInput::new(
            open.id,
            TransactionCategory::Payment,
            TransactionType::Credit,
            dec!(10),
        )
        .with_discount(PostingModifier::rate(dec!(5)));
        assert!(matches!(
            post(&open, &discounted_payment, &graph),
            Err(LedgerError::ModifierNotAllowed(TransactionCategory::Payment))
        ));
    }

    #[test]
    fn test_signed_adjustment_keeps_sign() {
        let f = folio(dec!(40), FolioStatus::Open);
        let graph = TaxGraph::empty(f.hotel_id);
        let input = PostingInput::new(
            f.id,
            TransactionCategory::Adjustment,
            TransactionType::Credit,
            dec!(-40),
        );
        let plan = post(&f, &input, &graph).unwrap();
        assert_eq!(plan.gross_amount, dec!(-40));
        assert_eq!(plan.resulting_status(f.status), FolioStatus::Closed);
    }

    #[test]
    fn test_folio_void_requires_zero_balance() {
        let owing = folio(dec!(5), FolioStatus::Open);
        assert!(matches!(
            FolioService::validate_folio_void(&owing),
            Err(LedgerError::FolioHasBalance { .. })
        ));
        assert!(FolioService::validate_folio_void(&folio(dec!(0), FolioStatus::Closed)).is_ok());
    }
}
