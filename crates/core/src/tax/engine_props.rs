//! Property-based tests for the tax graph and engine.

use std::collections::HashMap;

use chrono::NaiveDate;
use innkeep_shared::types::{HotelId, TaxRateId};
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::tax::engine::TaxEngine;
use crate::tax::error::TaxError;
use crate::tax::graph::TaxGraph;
use crate::tax::types::{ApplyTax, PostingType, TaxContext, TaxRate, TaxableCategory};

/// Amounts between 0.01 and 100,000.00.
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Percentages between 0.00 and 30.00.
fn arb_rate() -> impl Strategy<Value = Decimal> {
    (0i64..=3000i64).prop_map(|bp| Decimal::new(bp, 2))
}

fn arb_tax_id() -> impl Strategy<Value = TaxRateId> {
    any::<u128>().prop_map(|n| TaxRateId::from_uuid(Uuid::from_u128(n)))
}

fn tax(hotel_id: HotelId, id: TaxRateId, rate: Decimal, deps: Vec<TaxRateId>) -> TaxRate {
    TaxRate {
        id,
        hotel_id,
        name: "tax".to_string(),
        rate_percentage: rate,
        posting_type: PostingType::FlatPercentage,
        apply_tax: ApplyTax::BeforeDiscount,
        applies_to_room_rate: true,
        applies_to_fnb: true,
        applies_to_other: true,
        effective_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        end_date: None,
        exempt_after: None,
        tax_apply_after: deps,
        priority: 0,
        is_active: true,
        slabs: Vec::new(),
    }
}

fn ctx(amount: Decimal) -> TaxContext {
    TaxContext {
        date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        category: Some(TaxableCategory::RoomRate),
        amount,
        discount: Decimal::ZERO,
        prior_occurrences: HashMap::new(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Total equals the sum of the lines, and every line is at money precision.
    #[test]
    fn prop_total_is_sum_of_rounded_lines(
        amount in arb_amount(),
        rates in prop::collection::vec(arb_rate(), 1..6),
    ) {
        let hotel = HotelId::new();
        let taxes: Vec<_> = rates
            .into_iter()
            .map(|r| tax(hotel, TaxRateId::new(), r, Vec::new()))
            .collect();
        let graph = TaxGraph::build(hotel, taxes).unwrap();
        let result = TaxEngine::compute(&graph, &ctx(amount));

        let sum: Decimal = result.lines.iter().map(|l| l.tax_amount).sum();
        prop_assert_eq!(result.total, sum);
        for line in &result.lines {
            prop_assert!(line.tax_amount.scale() <= 2);
            prop_assert!(!line.tax_amount.is_zero());
        }
    }

    /// A depends on B: A's base is the amount plus B's applied tax.
    #[test]
    fn prop_dependent_base_includes_dependency(
        amount in arb_amount(),
        rate_a in arb_rate(),
        rate_b in 1i64..=3000i64,
    ) {
        let hotel = HotelId::new();
        let b = tax(hotel, TaxRateId::new(), Decimal::new(rate_b, 2), Vec::new());
        let a = tax(hotel, TaxRateId::new(), rate_a, vec![b.id]);
        let (a_id, b_id) = (a.id, b.id);

        let graph = TaxGraph::build(hotel, vec![a, b]).unwrap();
        let result = TaxEngine::compute(&graph, &ctx(amount));

        let b_amount = result
            .lines
            .iter()
            .find(|l| l.tax_rate_id == b_id)
            .map_or(Decimal::ZERO, |l| l.tax_amount);
        if let Some(a_line) = result.lines.iter().find(|l| l.tax_rate_id == a_id) {
            prop_assert_eq!(a_line.taxable_amount, amount + b_amount);
            let b_pos = result.lines.iter().position(|l| l.tax_rate_id == b_id);
            let a_pos = result.lines.iter().position(|l| l.tax_rate_id == a_id);
            if let (Some(b_pos), Some(a_pos)) = (b_pos, a_pos) {
                prop_assert!(b_pos < a_pos);
            }
        }
    }

    /// Closing any dependency chain into a loop is rejected at build time.
    #[test]
    fn prop_chain_closed_into_cycle_rejected(
        ids in prop::collection::hash_set(arb_tax_id(), 2..8),
    ) {
        let hotel = HotelId::new();
        let ids: Vec<_> = ids.into_iter().collect();
        let n = ids.len();
        let taxes: Vec<_> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| tax(hotel, *id, Decimal::TEN, vec![ids[(i + 1) % n]]))
            .collect();

        match TaxGraph::build(hotel, taxes) {
            Err(TaxError::CircularDependency { cycle }) => prop_assert_eq!(cycle.len(), n),
            other => prop_assert!(false, "expected cycle, got {:?}", other),
        }
    }

    /// An acyclic chain always builds, dependencies first.
    #[test]
    fn prop_chain_orders_dependencies_first(
        ids in prop::collection::hash_set(arb_tax_id(), 1..8),
    ) {
        let hotel = HotelId::new();
        let ids: Vec<_> = ids.into_iter().collect();
        let taxes: Vec<_> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let deps = if i == 0 { Vec::new() } else { vec![ids[i - 1]] };
                tax(hotel, *id, Decimal::TEN, deps)
            })
            .collect();

        let graph = TaxGraph::build(hotel, taxes).unwrap();
        let order: Vec<_> = graph.ordered().iter().map(|t| t.id).collect();
        prop_assert_eq!(order, ids);
    }
}
