//! API route definitions

use axum::{
    routing::{delete, get, post},
    Router,
};

use super::handlers;
use super::websocket::ws_handler;
use super::AppState;

/// Create all API routes
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health_check))

        // Board
        .route("/api/tokens", get(handlers::list_tokens))
        .route("/api/tokens/:id", get(handlers::get_token))
        .route("/api/tokens/:id", delete(handlers::remove_token))
        .route("/api/pulse", get(handlers::get_pulse))

        // Feed control
        .route("/api/status", get(handlers::get_status))
        .route("/api/refetch", post(handlers::refetch))

        .route("/ws", get(ws_handler))
        .with_state(state)
}
