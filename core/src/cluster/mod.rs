// cartograph/src/cluster/mod.rs

//! The cluster API as seen by the engine: store and watch capabilities, a
//! typed repository over them, and an in-memory implementation.

pub mod memory;
pub mod repository;
pub mod store;

pub use memory::InMemoryStore;
pub use repository::Repository;
pub use store::{ClusterStore, EventHandler, ListSelector, WatchRegistrar};
