//! Pipeline orchestration module.
//!
//! Request decoding pipeline that coordinates:
//! - Step functions (parse, decode, project)
//! - Evaluation state construction
//! - The step loop (single and mapped inputs)
//! - Per-request and batch orchestration

pub mod engine;
pub mod ingestion;
pub mod state;
pub mod steps;

pub use engine::*;
pub use ingestion::*;
pub use state::*;
pub use steps::*;
