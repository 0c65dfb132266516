//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use stargaze_chat::QueryRouter;
use stargaze_core::StargazeConfig;

/// Shared application state, passed to handlers via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration (read-only after startup).
    pub config: Arc<StargazeConfig>,
    /// Query pipeline and conversation store.
    pub router: Arc<QueryRouter>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: StargazeConfig, router: QueryRouter) -> Self {
        Self {
            config: Arc::new(config),
            router: Arc::new(router),
            start_time: Instant::now(),
        }
    }
}
