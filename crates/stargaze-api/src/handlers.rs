//! HTTP route handlers.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use stargaze_chat::QueryResponse;

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Query
// =============================================================================

/// Request body for POST /query.
#[derive(Debug, Serialize, Deserialize)]
pub struct QueryRequest {
    pub user_query: String,
}

/// POST /query - classify and answer one astronomy question.
///
/// Every request is attributed to the configured default user.
pub async fn query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let user_id = &state.config.server.default_user;
    let response = state.router.handle(user_id, &req.user_query).await?;
    Ok(Json(response))
}

// =============================================================================
// Health
// =============================================================================

/// Response for GET /health.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_conversations: usize,
}

/// GET /health - liveness plus conversation store size.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_conversations: state.router.store().len(),
    })
}
