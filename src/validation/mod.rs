//! Adapter catalog validation module.
//!
//! Loads adapter definitions from JSON documents:
//! - Compiles paths, patterns and steps up front
//! - Rejects duplicate adapter ids and tracker mismatches
//! - Holds the process-wide catalog used by the bindings

pub mod catalog;

pub use catalog::*;
