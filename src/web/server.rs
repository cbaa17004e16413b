//! Axum web server setup and configuration

use std::future::Future;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::routes::create_routes;
use super::AppState;

/// Bind and serve until `shutdown` resolves.
pub async fn start_server<F>(state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let host = state.config.api_host.clone().unwrap_or_else(|| "0.0.0.0".to_string());
    let port = state.config.api_port.unwrap_or(3000);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("Invalid API_HOST or API_PORT")?;

    let app = create_app(state);

    info!("Starting API server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")?;

    Ok(())
}

/// Create the Axum router without starting the server (useful for testing)
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    create_routes(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
