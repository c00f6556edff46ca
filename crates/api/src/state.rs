use std::sync::Arc;

use crate::catalog::FieldCatalog;
use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: the pool is reference-counted and everything else sits
/// behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub pool: crm_db::DbPool,
    pub config: Arc<ServerConfig>,
    pub catalog: Arc<FieldCatalog>,
}
