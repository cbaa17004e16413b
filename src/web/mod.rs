//! Web API module for the pulse board
//!
//! REST endpoints over the derived board views plus a WebSocket that streams
//! store changes to connected dashboards.

pub mod handlers;
pub mod models;
pub mod routes;
pub mod server;
pub mod websocket;

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::config::Config;
use crate::pulse::store::StoreEvent;
use crate::pulse::{FetchPoller, SimulatedUpdateDriver, TokenStore};

/// Shared application state for all API handlers
#[derive(Clone)]
pub struct AppState {
    pub store: TokenStore,
    /// Fetch poller feeding the store
    pub poller: Arc<FetchPoller>,
    pub simulator: Arc<SimulatedUpdateDriver>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        store: TokenStore,
        poller: Arc<FetchPoller>,
        simulator: Arc<SimulatedUpdateDriver>,
        config: Arc<Config>,
    ) -> Self {
        Self { store, poller, simulator, config }
    }

    /// Get a new receiver for store change events
    pub fn subscribe_ws(&self) -> broadcast::Receiver<StoreEvent> {
        self.store.subscribe()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::api::MockTokenSource;
    use crate::pulse::{FetchPollerConfig, SimulatorConfig};
    use std::time::Duration;

    /// State over an empty store with an instant mock source. Nothing is started.
    pub fn state() -> AppState {
        let store = TokenStore::new();
        let source = Arc::new(MockTokenSource::new(Duration::ZERO).with_seed(7));
        let poller = Arc::new(FetchPoller::new(source, store.clone(), FetchPollerConfig::default()));
        let simulator = Arc::new(SimulatedUpdateDriver::new(store.clone(), SimulatorConfig::default()));
        AppState::new(store, poller, simulator, Arc::new(Config::default()))
    }
}
