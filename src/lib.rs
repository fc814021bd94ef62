// src/lib.rs

// Re-export or define the top-level modules you need
pub mod services;
pub mod models;
pub mod handlers;
pub mod routes;

use std::sync::Arc;

use services::db::DbStore;
use services::refresh::RefreshService;
use services::resolver::PriceResolver;
use services::snapshots::SnapshotService;

// Add this to src/lib.rs or a common module
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Everything the handlers need, wired once in main and shared via Arc.
pub struct AppContext {
    pub db: Arc<DbStore>,
    pub resolver: Arc<PriceResolver>,
    pub snapshots: SnapshotService,
    pub refresh: Arc<RefreshService>,
}
