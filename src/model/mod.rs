//! Data model.
//!
//! Records consumed and produced by the decoding core:
//! - `request` - one captured HTTP transaction
//! - `adapter` - trackers, adapters, data paths and their predicates
//! - `property` - normalized data-category names
//! - `step` - decoding step instructions

pub mod adapter;
pub mod property;
pub mod request;
pub mod step;

pub use adapter::*;
pub use property::*;
pub use request::*;
pub use step::*;
