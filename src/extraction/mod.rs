//! Path-query languages and data extraction.
//!
//! - `json_path` - read queries (`res.body.events[*].id`)
//! - `output_path` - restricted write paths for step outputs
//! - `matches` - data path extraction into annotated matches

pub mod json_path;
pub mod matches;
pub mod output_path;

pub use json_path::*;
pub use matches::*;
pub use output_path::*;
