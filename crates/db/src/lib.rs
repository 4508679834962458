//! Database layer with `SeaORM` entities and repositories.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - Repository abstractions owning the ledger's atomic storage units
//! - The night audit engine and the stay pricing contract
//! - Database migrations

pub mod entities;
pub mod migration;
pub mod night_audit;
pub mod pricing;
pub mod repositories;

pub use night_audit::{BackfillDay, NightAuditEngine};
pub use pricing::{BookedRatePricing, PricingError, StayPricing};
pub use repositories::{
    DailySummaryRepository, FolioRepository, HotelRepository, JobRepository,
    ReservationRepository, TaxRateRepository,
};

use std::time::Duration;

use innkeep_shared::config::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Establishes a pooled connection sized from configuration.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect_with(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    Database::connect(options).await
}
