use anyhow::{Context, Result};
use dotenv::dotenv;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod api;
mod config;
mod error;
mod models;
mod pulse;
mod web;

use crate::api::{DexScreenerClient, MockTokenSource, TokenSource};
use crate::config::{Config, TokenSourceKind};
use crate::pulse::{FetchPoller, SimulatedUpdateDriver, TokenStore};
use crate::web::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging; RUST_LOG overrides the default level
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Arc::new(Config::load()?);
    info!("Configuration loaded successfully");

    let store = TokenStore::with_capacity(config.max_tracked_tokens);

    let source: Arc<dyn TokenSource> = match config.token_source {
        TokenSourceKind::Mock => {
            let mut source = MockTokenSource::new(Duration::from_millis(config.mock_latency_ms));
            if let Some(seed) = config.sim_seed {
                source = source.with_seed(seed);
            }
            Arc::new(source)
        }
        TokenSourceKind::DexScreener => Arc::new(
            DexScreenerClient::new(&config.dexscreener_base_url, config.dexscreener_max_pairs)
                .context("Failed to build DexScreener client")?,
        ),
    };
    info!("Token source: {}", source.name());

    let poller = Arc::new(FetchPoller::new(source, store.clone(), config.fetcher()));
    poller.start().await?;

    let simulator = Arc::new(SimulatedUpdateDriver::new(store.clone(), config.simulator()));
    simulator.start().await?;

    let state = AppState::new(store, poller.clone(), simulator.clone(), config.clone());

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutdown signal received");
    };

    let served = web::server::start_server(state, shutdown).await;

    simulator.stop().await;
    poller.stop().await;
    info!("Pulse board stopped");

    served
}
