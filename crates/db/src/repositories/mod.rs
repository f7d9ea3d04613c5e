//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod calculation_node_repo;
pub mod user_repo;

pub use calculation_node_repo::CalculationNodeRepo;
pub use user_repo::UserRepo;
