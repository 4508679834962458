//! Tax rate repository: hotel tax configuration and its validated graph.
//!
//! Graphs are built and validated once per hotel and cached. Saving a rate
//! rebuilds the graph with the candidate included and refuses to write an
//! invalid configuration, so a cycle never reaches the posting path.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::{info, instrument};

use innkeep_core::tax::{ApplyTax, PostingType, TaxError, TaxGraph, TaxRate, TaxSlab};
use innkeep_shared::types::{HotelId, TaxRateId};

use crate::entities::{tax_rate_dependencies, tax_rate_slabs, tax_rates};

/// Default cache capacity (number of hotels).
const DEFAULT_CACHE_CAPACITY: u64 = 1_000;

/// Default time-to-live for cached graphs (5 minutes).
pub const DEFAULT_TAX_CACHE_TTL_SECS: u64 = 300;

/// Error types for tax configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum TaxRateError {
    /// The configuration would be invalid.
    #[error(transparent)]
    Configuration(#[from] TaxError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Tax rate repository with a per-hotel graph cache.
#[derive(Debug, Clone)]
pub struct TaxRateRepository {
    db: DatabaseConnection,
    cache: Cache<HotelId, Arc<TaxGraph>>,
}

impl TaxRateRepository {
    /// Creates a new tax rate repository with the default cache TTL.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self::with_cache_ttl(db, DEFAULT_TAX_CACHE_TTL_SECS)
    }

    /// Creates a new tax rate repository with a custom cache TTL.
    #[must_use]
    pub fn with_cache_ttl(db: DatabaseConnection, ttl_secs: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(DEFAULT_CACHE_CAPACITY)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();
        Self { db, cache }
    }

    /// Returns the hotel's validated tax graph, from cache when available.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the stored rates do not form a valid graph,
    /// or `Database` if loading fails.
    pub async fn load_graph(&self, hotel_id: HotelId) -> Result<Arc<TaxGraph>, TaxRateError> {
        if let Some(graph) = self.cache.get(&hotel_id).await {
            return Ok(graph);
        }

        let rates = self.list_tax_rates(hotel_id).await?;
        let graph = Arc::new(TaxGraph::build(hotel_id, rates)?);
        self.cache.insert(hotel_id, Arc::clone(&graph)).await;
        Ok(graph)
    }

    /// Lists the hotel's tax rates with their slabs and dependencies.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails or a stored value is unknown.
    pub async fn list_tax_rates(&self, hotel_id: HotelId) -> Result<Vec<TaxRate>, TaxRateError> {
        let rows = tax_rates::Entity::find()
            .filter(tax_rates::Column::HotelId.eq(hotel_id.into_inner()))
            .order_by_asc(tax_rates::Column::Priority)
            .order_by_asc(tax_rates::Column::Id)
            .all(&self.db)
            .await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<uuid::Uuid> = rows.iter().map(|r| r.id).collect();

        let mut slabs: HashMap<uuid::Uuid, Vec<TaxSlab>> = HashMap::new();
        for slab in tax_rate_slabs::Entity::find()
            .filter(tax_rate_slabs::Column::TaxRateId.is_in(ids.clone()))
            .order_by_asc(tax_rate_slabs::Column::MinAmount)
            .all(&self.db)
            .await?
        {
            slabs.entry(slab.tax_rate_id).or_default().push(TaxSlab {
                min_amount: slab.min_amount,
                max_amount: slab.max_amount,
                rate_percentage: slab.rate_percentage,
            });
        }

        let mut deps: HashMap<uuid::Uuid, Vec<TaxRateId>> = HashMap::new();
        for edge in tax_rate_dependencies::Entity::find()
            .filter(tax_rate_dependencies::Column::TaxRateId.is_in(ids))
            .all(&self.db)
            .await?
        {
            deps.entry(edge.tax_rate_id)
                .or_default()
                .push(TaxRateId::from_uuid(edge.depends_on_tax_rate_id));
        }

        rows.into_iter()
            .map(|row| {
                let slabs = slabs.remove(&row.id).unwrap_or_default();
                let deps = deps.remove(&row.id).unwrap_or_default();
                model_to_tax_rate(row, slabs, deps)
            })
            .collect()
    }

    /// Creates or replaces a tax rate after validating the resulting graph.
    ///
    /// Nothing is written if the hotel's configuration with the candidate
    /// included has a cycle, a cross-hotel or unknown dependency, or an
    /// invalid rate.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` on validation failure, `Database` otherwise.
    #[instrument(skip(self, rate), fields(hotel_id = %rate.hotel_id, tax_rate_id = %rate.id))]
    pub async fn save_tax_rate(&self, rate: TaxRate) -> Result<TaxRate, TaxRateError> {
        let hotel_id = rate.hotel_id;
        let mut rates: Vec<TaxRate> = self
            .list_tax_rates(hotel_id)
            .await?
            .into_iter()
            .filter(|r| r.id != rate.id)
            .collect();

        self.check_foreign_dependencies(&rate, &rates).await?;

        rates.push(rate.clone());
        TaxGraph::build(hotel_id, rates)?;

        let txn = self.db.begin().await?;
        let now = chrono::Utc::now().into();

        let existing = tax_rates::Entity::find_by_id(rate.id.into_inner())
            .one(&txn)
            .await?;

        let exempt_after = rate
            .exempt_after
            .map(|n| i32::try_from(n).unwrap_or(i32::MAX));
        let model = tax_rates::ActiveModel {
            id: Set(rate.id.into_inner()),
            hotel_id: Set(hotel_id.into_inner()),
            name: Set(rate.name.clone()),
            rate_percentage: Set(rate.rate_percentage),
            posting_type: Set(rate.posting_type.as_str().to_string()),
            apply_tax: Set(rate.apply_tax.as_str().to_string()),
            applies_to_room_rate: Set(rate.applies_to_room_rate),
            applies_to_fnb: Set(rate.applies_to_fnb),
            applies_to_other: Set(rate.applies_to_other),
            effective_date: Set(rate.effective_date),
            end_date: Set(rate.end_date),
            exempt_after: Set(exempt_after),
            priority: Set(rate.priority),
            is_active: Set(rate.is_active),
            created_at: Set(existing.as_ref().map_or(now, |e| e.created_at)),
            updated_at: Set(now),
        };
        if existing.is_some() {
            model.update(&txn).await?;
        } else {
            model.insert(&txn).await?;
        }

        tax_rate_slabs::Entity::delete_many()
            .filter(tax_rate_slabs::Column::TaxRateId.eq(rate.id.into_inner()))
            .exec(&txn)
            .await?;
        for slab in &rate.slabs {
            tax_rate_slabs::ActiveModel {
                id: Set(uuid::Uuid::now_v7()),
                tax_rate_id: Set(rate.id.into_inner()),
                min_amount: Set(slab.min_amount),
                max_amount: Set(slab.max_amount),
                rate_percentage: Set(slab.rate_percentage),
            }
            .insert(&txn)
            .await?;
        }

        tax_rate_dependencies::Entity::delete_many()
            .filter(tax_rate_dependencies::Column::TaxRateId.eq(rate.id.into_inner()))
            .exec(&txn)
            .await?;
        for dep in &rate.tax_apply_after {
            tax_rate_dependencies::ActiveModel {
                tax_rate_id: Set(rate.id.into_inner()),
                depends_on_tax_rate_id: Set(dep.into_inner()),
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;
        self.invalidate(hotel_id).await;

        info!(name = %rate.name, posting_type = %rate.posting_type, "Tax rate saved");
        Ok(rate)
    }

    /// Drops the cached graph of a hotel.
    pub async fn invalidate(&self, hotel_id: HotelId) {
        self.cache.invalidate(&hotel_id).await;
    }

    /// Rejects dependencies on rates owned by another hotel.
    async fn check_foreign_dependencies(
        &self,
        rate: &TaxRate,
        same_hotel: &[TaxRate],
    ) -> Result<(), TaxRateError> {
        let foreign: Vec<uuid::Uuid> = rate
            .tax_apply_after
            .iter()
            .filter(|dep| !same_hotel.iter().any(|r| r.id == **dep) && **dep != rate.id)
            .map(|dep| dep.into_inner())
            .collect();
        if foreign.is_empty() {
            return Ok(());
        }

        if let Some(other) = tax_rates::Entity::find()
            .filter(tax_rates::Column::Id.is_in(foreign))
            .one(&self.db)
            .await?
        {
            return Err(TaxError::CrossHotel {
                tax_rate_id: rate.id,
                expected: rate.hotel_id,
                actual: HotelId::from_uuid(other.hotel_id),
            }
            .into());
        }
        Ok(())
    }
}

fn model_to_tax_rate(
    row: tax_rates::Model,
    slabs: Vec<TaxSlab>,
    tax_apply_after: Vec<TaxRateId>,
) -> Result<TaxRate, TaxRateError> {
    Ok(TaxRate {
        id: TaxRateId::from_uuid(row.id),
        hotel_id: HotelId::from_uuid(row.hotel_id),
        name: row.name,
        rate_percentage: row.rate_percentage,
        posting_type: row.posting_type.parse::<PostingType>()?,
        apply_tax: row.apply_tax.parse::<ApplyTax>()?,
        applies_to_room_rate: row.applies_to_room_rate,
        applies_to_fnb: row.applies_to_fnb,
        applies_to_other: row.applies_to_other,
        effective_date: row.effective_date,
        end_date: row.end_date,
        exempt_after: row.exempt_after.map(|n| u32::try_from(n).unwrap_or(0)),
        tax_apply_after,
        priority: row.priority,
        is_active: row.is_active,
        slabs,
    })
}
