// cartograph/src/conditions/mod.rs

//! Per-pass condition aggregation.

pub mod manager;
pub mod reasons;

pub use manager::ConditionManager;
pub use reasons::{condition_for_error, decisive_error};
