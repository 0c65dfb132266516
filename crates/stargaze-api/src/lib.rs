//! Stargaze API crate - axum HTTP server and route handlers.
//!
//! Exposes the query router over `POST /query` plus a `GET /health` probe.

pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
