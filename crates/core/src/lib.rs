//! Core business logic for Innkeep.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! All domain types, validation rules, and calculations live here; the `db`
//! crate wraps them in atomic storage units.
//!
//! # Modules
//!
//! - `tax` - Tax-rate configuration, dependency graph, and per-posting tax lines
//! - `folio` - Folio posting math, voids, replay, and the status hook
//! - `night_audit` - Audit date validation, stay rules, and daily summary facts
//! - `jobs` - Durable job state machine and fixed-delay retry policy
//! - `pricing` - The stay pricing contract consumed by the night audit

#[macro_use]
mod macros;

pub mod error;
pub mod folio;
pub mod jobs;
pub mod money;
pub mod night_audit;
pub mod pricing;
pub mod tax;

pub use error::ErrorKind;
