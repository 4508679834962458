//! Hotel-scoped tax configuration and per-posting tax computation.
//!
//! This module provides:
//! - Tax rate configuration types (posting types, slabs, category flags)
//! - A validated dependency graph over `tax_apply_after` (Kahn's algorithm)
//! - The tax engine producing ordered tax lines for one posting
//! - Error types for configuration problems

pub mod engine;
pub mod error;
pub mod graph;
pub mod types;

#[cfg(test)]
mod engine_props;

pub use engine::TaxEngine;
pub use error::TaxError;
pub use graph::TaxGraph;
pub use types::{
    ApplyTax, PostingType, TaxComputation, TaxContext, TaxLine, TaxRate, TaxSlab,
    TaxableCategory,
};
