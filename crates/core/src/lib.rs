//! Domain core for calculation threads.
//!
//! Holds everything that has real semantics and no transport or database
//! dependency: value computation, input validation, flat-to-tree assembly,
//! the [`store::NodeStore`] persistence seam and the [`engine::CalculationEngine`]
//! that drives it.

pub mod calculation;
pub mod engine;
pub mod error;
pub mod memory_store;
pub mod node;
pub mod roles;
pub mod store;
pub mod tree;
pub mod types;
pub mod users;
