//! Property-based tests for folio balance invariants.
//!
//! An in-memory book applies posting and void plans the way the folio
//! repository does, then compares the running balance with a full replay.

use std::collections::HashMap;

use chrono::NaiveDate;
use innkeep_shared::types::{FolioId, FolioTransactionId, HotelId, TaxRateId};
use proptest::prelude::*;
use rust_decimal::Decimal;

use crate::folio::posting::FolioService;
use crate::folio::replay::LedgerEntry;
use crate::folio::types::{
    Direction, FolioSnapshot, FolioStatus, PostingInput, PostingModifier, TransactionCategory,
    TransactionStatus, TransactionType,
};
use crate::folio::void::VoidTarget;
use crate::tax::{ApplyTax, PostingType, TaxGraph, TaxRate};

/// One step in a random ledger history.
#[derive(Debug, Clone)]
enum Op {
    Post {
        category: TransactionCategory,
        cents: i64,
        discount_pct: Option<i64>,
    },
    /// Voids the n-th entry modulo the ledger size.
    Void(usize),
}

fn arb_category() -> impl Strategy<Value = TransactionCategory> {
    prop_oneof![
        Just(TransactionCategory::Room),
        Just(TransactionCategory::FoodAndBeverage),
        Just(TransactionCategory::Miscellaneous),
        Just(TransactionCategory::Payment),
        Just(TransactionCategory::Adjustment),
    ]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (arb_category(), 1i64..5_000_000i64, prop::option::of(0i64..=50i64), any::<bool>())
            .prop_map(|(category, cents, discount_pct, negative)| {
                let cents = if category == TransactionCategory::Adjustment && negative {
                    -cents
                } else {
                    cents
                };
                Op::Post {
                    category,
                    cents,
                    discount_pct: discount_pct
                        .filter(|_| category.accepts_modifiers()),
                }
            }),
        1 => any::<usize>().prop_map(Op::Void),
    ]
}

struct Book {
    folio: FolioSnapshot,
    entries: Vec<(FolioTransactionId, LedgerEntry)>,
    graph: TaxGraph,
}

impl Book {
    fn new() -> Self {
        let hotel_id = HotelId::new();
        let vat = TaxRate {
            id: TaxRateId::new(),
            hotel_id,
            name: "VAT".to_string(),
            rate_percentage: Decimal::new(1125, 2),
            posting_type: PostingType::FlatPercentage,
            apply_tax: ApplyTax::AfterDiscount,
            applies_to_room_rate: true,
            applies_to_fnb: true,
            applies_to_other: true,
            effective_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            end_date: None,
            exempt_after: None,
            tax_apply_after: Vec::new(),
            priority: 0,
            is_active: true,
            slabs: Vec::new(),
        };
        Self {
            folio: FolioSnapshot {
                id: FolioId::new(),
                hotel_id,
                status: FolioStatus::Open,
                balance: Decimal::ZERO,
            },
            entries: Vec::new(),
            graph: TaxGraph::build(hotel_id, vec![vat]).unwrap(),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn next_number(&self) -> i64 {
        i64::try_from(self.entries.len()).unwrap() + 1
    }

    fn apply(&mut self, op: &Op) {
        match op {
            Op::Post {
                category,
                cents,
                discount_pct,
            } => {
                let amount = Decimal::new(*cents, 2);
                let transaction_type = if category.direction() == Direction::Credit {
                    TransactionType::Credit
                } else {
                    TransactionType::for_amount(amount)
                };
                let mut input =
                    PostingInput::new(self.folio.id, *category, transaction_type, amount);
                if let Some(pct) = discount_pct {
                    input = input.with_discount(PostingModifier::rate(Decimal::from(*pct)));
                }
                let Ok(plan) = FolioService::prepare_posting(
                    &self.folio,
                    &input,
                    Self::date(),
                    &self.graph,
                    &HashMap::new(),
                ) else {
                    return;
                };
                self.folio.balance = plan.balance_after;
                self.folio.status = plan.resulting_status(self.folio.status);
                let number = self.next_number();
                self.entries.push((
                    FolioTransactionId::new(),
                    LedgerEntry {
                        transaction_number: number,
                        status: TransactionStatus::Posted,
                        is_balancing_entry: false,
                        gross_amount: plan.gross_amount,
                    },
                ));
            }
            Op::Void(n) => {
                if self.entries.is_empty() {
                    return;
                }
                let idx = n % self.entries.len();
                let (id, entry) = &self.entries[idx];
                let target = VoidTarget {
                    id: *id,
                    folio_id: self.folio.id,
                    transaction_number: entry.transaction_number,
                    status: entry.status,
                    is_balancing_entry: entry.is_balancing_entry,
                    gross_amount: entry.gross_amount,
                };
                let Ok(plan) =
                    FolioService::prepare_void(&self.folio, &target, "test", Self::date())
                else {
                    return;
                };
                self.entries[idx].1.status = TransactionStatus::Voided;
                self.folio.balance = plan.balance_after;
                self.folio.status = plan.resulting_status(self.folio.status);
                let number = self.next_number();
                self.entries.push((
                    FolioTransactionId::new(),
                    LedgerEntry {
                        transaction_number: number,
                        status: TransactionStatus::Posted,
                        is_balancing_entry: true,
                        gross_amount: plan.balancing_amount,
                    },
                ));
            }
        }
    }

    fn ledger(&self) -> Vec<LedgerEntry> {
        self.entries.iter().map(|(_, e)| e.clone()).collect()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// The running balance always equals a full replay, both ways of counting voids.
    #[test]
    fn prop_balance_equals_replay(ops in prop::collection::vec(arb_op(), 1..40)) {
        let mut book = Book::new();
        for op in &ops {
            book.apply(op);
            let ledger = book.ledger();
            prop_assert_eq!(book.folio.balance, FolioService::replay_balance(&ledger));
            prop_assert_eq!(book.folio.balance, FolioService::audit_trail_balance(&ledger));
        }
    }

    /// Status is always what the hook would decide for the balance reached.
    #[test]
    fn prop_zero_balance_is_never_open(ops in prop::collection::vec(arb_op(), 1..40)) {
        let mut book = Book::new();
        for op in &ops {
            book.apply(op);
            if book.folio.balance.is_zero() && !book.entries.is_empty() {
                prop_assert_eq!(book.folio.status, FolioStatus::Closed);
            }
            if book.folio.balance > Decimal::ZERO {
                prop_assert_eq!(book.folio.status, FolioStatus::Open);
            }
        }
    }

    /// Voiding an entry leaves the balance as if that entry had been zero.
    #[test]
    fn prop_void_equals_zeroed_amount(
        ops in prop::collection::vec(arb_op(), 1..20),
        pick in any::<usize>(),
    ) {
        let mut book = Book::new();
        for op in &ops {
            book.apply(op);
        }
        let live: Vec<usize> = book
            .entries
            .iter()
            .enumerate()
            .filter(|(_, (_, e))| e.status == TransactionStatus::Posted && !e.is_balancing_entry)
            .map(|(i, _)| i)
            .collect();
        prop_assume!(!live.is_empty());
        let idx = live[pick % live.len()];
        let voided_gross = book.entries[idx].1.gross_amount;
        let before = book.folio.balance;
        let entries_before = book.entries.len();

        book.apply(&Op::Void(idx));

        prop_assert_eq!(book.folio.balance, before - voided_gross);
        prop_assert_eq!(book.entries.len(), entries_before + 1);
        prop_assert_eq!(book.entries[idx].1.gross_amount, voided_gross);
    }
}
