//! Tax engine: ordered tax lines for one posting.

use std::collections::HashMap;

use innkeep_shared::types::TaxRateId;
use rust_decimal::Decimal;

use super::graph::TaxGraph;
use super::types::{ApplyTax, PostingType, TaxComputation, TaxContext, TaxLine, TaxRate};
use crate::money::{percent_of, round_money};

/// Tax engine.
///
/// Pure computation over an already validated [`TaxGraph`]; configuration
/// errors cannot occur here.
pub struct TaxEngine;

impl TaxEngine {
    /// Computes the tax lines for one posting.
    ///
    /// Rates are evaluated in graph order. For each rate that is effective on
    /// `ctx.date`, covers the posting's category and is not exhausted by
    /// `exempt_after`:
    /// 1. The base is the amount before or after discount per `apply_tax`
    /// 2. The applied amounts of its dependencies are added (compound tax)
    /// 3. The amount is the fixed value, `base * rate / 100`, or the slab rate
    /// 4. The amount is rounded to 2 dp; zero lines are dropped
    #[must_use]
    pub fn compute(graph: &TaxGraph, ctx: &TaxContext) -> TaxComputation {
        let Some(category) = ctx.category else {
            return TaxComputation::default();
        };

        let mut applied: HashMap<TaxRateId, Decimal> = HashMap::new();
        let mut result = TaxComputation::default();

        for rate in graph.ordered() {
            if !rate.is_effective_on(ctx.date) || !rate.applies_to(category) {
                continue;
            }
            let prior = ctx.prior_occurrences.get(&rate.id).copied().unwrap_or(0);
            if rate.is_exempt(prior) {
                continue;
            }

            let base = Self::taxable_base(rate, ctx, &applied);
            let Some((tax_amount, rate_percentage)) = Self::amount_for(rate, base) else {
                continue;
            };
            if tax_amount.is_zero() {
                continue;
            }

            applied.insert(rate.id, tax_amount);
            result.total += tax_amount;
            result.aggregate_rate += rate_percentage;
            result.lines.push(TaxLine {
                tax_rate_id: rate.id,
                name: rate.name.clone(),
                tax_amount,
                taxable_amount: base,
                rate_percentage,
                posting_type: rate.posting_type,
            });
        }

        result
    }

    fn taxable_base(
        rate: &TaxRate,
        ctx: &TaxContext,
        applied: &HashMap<TaxRateId, Decimal>,
    ) -> Decimal {
        let own = match rate.apply_tax {
            ApplyTax::BeforeDiscount => ctx.amount,
            ApplyTax::AfterDiscount => ctx.amount - ctx.discount,
        };
        let compounded: Decimal = rate
            .tax_apply_after
            .iter()
            .filter_map(|dep| applied.get(dep))
            .sum();
        round_money(own + compounded)
    }

    /// Returns `(amount, percentage)` or `None` when no slab matches.
    fn amount_for(rate: &TaxRate, base: Decimal) -> Option<(Decimal, Decimal)> {
        match rate.posting_type {
            PostingType::FlatAmount => Some((round_money(rate.rate_percentage), Decimal::ZERO)),
            PostingType::FlatPercentage => Some((
                percent_of(base, rate.rate_percentage),
                rate.rate_percentage,
            )),
            PostingType::Slab => rate
                .slabs
                .iter()
                .find(|slab| slab.contains(base))
                .map(|slab| (percent_of(base, slab.rate_percentage), slab.rate_percentage)),
        }
    }
}
