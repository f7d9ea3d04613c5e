use std::sync::Arc;

use calctree_core::engine::CalculationEngine;
use calctree_db::store::PgNodeStore;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything heavy sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: calctree_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Calculation engine backed by the same pool.
    pub engine: Arc<CalculationEngine>,
}

impl AppState {
    pub fn new(pool: calctree_db::DbPool, config: ServerConfig) -> Self {
        let store = Arc::new(PgNodeStore::new(pool.clone()));
        Self {
            pool,
            config: Arc::new(config),
            engine: Arc::new(CalculationEngine::new(store)),
        }
    }
}
