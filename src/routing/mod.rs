//! Request routing module.
//!
//! Decides which adapter, if any, handles a request:
//! - Catalog-order adapter matching on endpoint URL and predicate
//! - Indicator-value search for requests no adapter handles

pub mod decision;
pub mod indicators;

pub use decision::*;
pub use indicators::*;
