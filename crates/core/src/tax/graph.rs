//! Validated `tax_apply_after` dependency graph.
//!
//! A hotel's tax rates are ordered once, at configuration time, with Kahn's
//! algorithm. Dependencies come first; ties are broken by `(priority, id)`
//! so the order is deterministic. Any graph problem is a `TaxError`.

use std::collections::{BTreeSet, HashMap, HashSet};

use innkeep_shared::types::{HotelId, TaxRateId};

use super::error::TaxError;
use super::types::TaxRate;

/// A hotel's tax rates in dependency order.
#[derive(Debug, Clone)]
pub struct TaxGraph {
    hotel_id: HotelId,
    ordered: Vec<TaxRate>,
}

impl TaxGraph {
    /// Validates `rates` and orders them topologically.
    ///
    /// # Errors
    ///
    /// Returns `TaxError` if any rate is invalid on its own, belongs to another
    /// hotel, depends on itself or an unknown rate, or takes part in a cycle.
    pub fn build(hotel_id: HotelId, rates: Vec<TaxRate>) -> Result<Self, TaxError> {
        let known: HashSet<TaxRateId> = rates.iter().map(|r| r.id).collect();

        for rate in &rates {
            if rate.hotel_id != hotel_id {
                return Err(TaxError::CrossHotel {
                    tax_rate_id: rate.id,
                    expected: hotel_id,
                    actual: rate.hotel_id,
                });
            }
            rate.validate()?;
            for dep in &rate.tax_apply_after {
                if *dep == rate.id {
                    return Err(TaxError::SelfDependency(rate.id));
                }
                if !known.contains(dep) {
                    return Err(TaxError::UnknownDependency {
                        tax_rate_id: rate.id,
                        depends_on: *dep,
                    });
                }
            }
        }

        let ordered = topological_order(rates)?;
        Ok(Self { hotel_id, ordered })
    }

    /// Returns an empty graph for a hotel with no taxes configured.
    #[must_use]
    pub const fn empty(hotel_id: HotelId) -> Self {
        Self {
            hotel_id,
            ordered: Vec::new(),
        }
    }

    /// The hotel this graph belongs to.
    #[must_use]
    pub const fn hotel_id(&self) -> HotelId {
        self.hotel_id
    }

    /// Rates in evaluation order.
    #[must_use]
    pub fn ordered(&self) -> &[TaxRate] {
        &self.ordered
    }

    /// Number of configured rates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    /// Returns true if the hotel has no taxes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

fn topological_order(rates: Vec<TaxRate>) -> Result<Vec<TaxRate>, TaxError> {
    let mut in_degree: HashMap<TaxRateId, usize> = HashMap::with_capacity(rates.len());
    let mut dependents: HashMap<TaxRateId, Vec<TaxRateId>> = HashMap::with_capacity(rates.len());
    let mut by_id: HashMap<TaxRateId, TaxRate> = HashMap::with_capacity(rates.len());

    for rate in &rates {
        let deps: HashSet<TaxRateId> = rate.tax_apply_after.iter().copied().collect();
        in_degree.insert(rate.id, deps.len());
        for dep in deps {
            dependents.entry(dep).or_default().push(rate.id);
        }
    }

    let mut ready: BTreeSet<(i32, TaxRateId)> = rates
        .iter()
        .filter(|r| in_degree.get(&r.id) == Some(&0))
        .map(|r| (r.priority, r.id))
        .collect();
    let priorities: HashMap<TaxRateId, i32> = rates.iter().map(|r| (r.id, r.priority)).collect();
    for rate in rates {
        by_id.insert(rate.id, rate);
    }

    let mut ordered = Vec::with_capacity(by_id.len());
    while let Some(next) = ready.pop_first() {
        let id = next.1;
        for dependent in dependents.get(&id).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert((
                        priorities.get(dependent).copied().unwrap_or_default(),
                        *dependent,
                    ));
                }
            }
        }
        in_degree.remove(&id);
        if let Some(rate) = by_id.remove(&id) {
            ordered.push(rate);
        }
    }

    if by_id.is_empty() {
        Ok(ordered)
    } else {
        Err(TaxError::CircularDependency {
            cycle: find_cycle(&by_id),
        })
    }
}

/// Walks dependencies among the unresolved rates until one repeats.
///
/// Every unresolved rate still has an unresolved dependency, so the walk
/// always ends on a cycle.
fn find_cycle(unresolved: &HashMap<TaxRateId, TaxRate>) -> Vec<TaxRateId> {
    let Some(start) = unresolved.keys().min().copied() else {
        return Vec::new();
    };

    let mut path: Vec<TaxRateId> = Vec::new();
    let mut position: HashMap<TaxRateId, usize> = HashMap::new();
    let mut current = start;
    loop {
        if let Some(&at) = position.get(&current) {
            let mut cycle = path.split_off(at);
            cycle.reverse();
            return cycle;
        }
        position.insert(current, path.len());
        path.push(current);

        let next = unresolved.get(&current).and_then(|rate| {
            rate.tax_apply_after
                .iter()
                .filter(|dep| unresolved.contains_key(dep))
                .min()
                .copied()
        });
        match next {
            Some(dep) => current = dep,
            None => return path,
        }
    }
}
