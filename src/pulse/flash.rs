//! Deferred flash-state clears.
//!
//! Every price tick lights up a token for a short moment. The clear that
//! follows is a per-token timer held in a registry keyed by token id: a newer
//! flash for the same token aborts the pending timer, and the timer itself only
//! clears the version it was scheduled for.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use super::store::TokenStore;

struct PendingClear {
    version: u64,
    handle: JoinHandle<()>,
}

#[derive(Clone)]
pub struct FlashScheduler {
    store: TokenStore,
    delay: Duration,
    pending: Arc<Mutex<HashMap<String, PendingClear>>>,
}

impl FlashScheduler {
    pub fn new(store: TokenStore, delay: Duration) -> Self {
        Self {
            store,
            delay,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Schedules a clear of `id`'s flash `version` after the configured delay,
    /// replacing any clear still pending for that token.
    pub fn schedule_clear(&self, id: &str, version: u64) {
        let store = self.store.clone();
        let pending = self.pending.clone();
        let delay = self.delay;
        let token_id = id.to_string();

        // Held across the spawn so the timer cannot deregister before it is registered
        let mut registry = self.pending.lock().unwrap_or_else(|e| e.into_inner());

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            store.clear_flash_state_if_current(&token_id, version).await;

            let mut pending = pending.lock().unwrap_or_else(|e| e.into_inner());
            if pending.get(&token_id).map(|p| p.version) == Some(version) {
                pending.remove(&token_id);
            }
        });

        if let Some(previous) = registry.insert(id.to_string(), PendingClear { version, handle }) {
            debug!("Replacing pending flash clear for {} (v{} -> v{})", id, previous.version, version);
            previous.handle.abort();
        }
    }

    /// Number of clears not yet fired.
    pub fn pending(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Aborts every pending clear. Used on teardown.
    pub fn cancel_all(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        let count = pending.len();
        for (_, clear) in pending.drain() {
            clear.handle.abort();
        }
        if count > 0 {
            debug!("Cancelled {} pending flash clears", count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::token::fixtures::token;
    use crate::models::{FlashState, TokenStage};
    use crate::pulse::store::PriceUpdate;

    async fn flash(store: &TokenStore, scheduler: &FlashScheduler, id: &str, state: FlashState) {
        let version = store
            .update_token_price(PriceUpdate {
                id: id.to_string(),
                market_cap: 1000.0,
                flash_state: state,
                sparkline: None,
            })
            .await
            .unwrap();
        scheduler.schedule_clear(id, version);
    }

    async fn flash_state(store: &TokenStore, id: &str) -> FlashState {
        store.get(id).await.unwrap().flash_state
    }

    #[tokio::test(start_paused = true)]
    async fn test_flash_clears_after_delay() {
        let store = TokenStore::new();
        store.upsert_tokens(vec![token("t", TokenStage::NewPairs, 1000.0)]).await;
        let scheduler = FlashScheduler::new(store.clone(), Duration::from_millis(600));

        flash(&store, &scheduler, "t", FlashState::Up).await;
        tokio::time::sleep(Duration::from_millis(599)).await;
        assert_eq!(flash_state(&store, "t").await, FlashState::Up);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(flash_state(&store, "t").await, FlashState::None);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_earlier_clear_does_not_clobber_later_flash() {
        let store = TokenStore::new();
        store.upsert_tokens(vec![token("t", TokenStage::NewPairs, 1000.0)]).await;
        let scheduler = FlashScheduler::new(store.clone(), Duration::from_millis(600));

        // t = 0
        flash(&store, &scheduler, "t", FlashState::Up).await;

        // t = 50ms
        tokio::time::sleep(Duration::from_millis(50)).await;
        flash(&store, &scheduler, "t", FlashState::Down).await;

        // t = 610ms: the first clear's slot has passed
        tokio::time::sleep(Duration::from_millis(560)).await;
        assert_eq!(flash_state(&store, "t").await, FlashState::Down);

        // t = 660ms: the second clear has fired
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(flash_state(&store, "t").await, FlashState::None);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_version_guard_without_cancellation() {
        // Even if an old timer slips through, it must not clear a newer write
        let store = TokenStore::new();
        store.upsert_tokens(vec![token("t", TokenStage::NewPairs, 1000.0)]).await;
        let scheduler = FlashScheduler::new(store.clone(), Duration::from_millis(600));
        let other = FlashScheduler::new(store.clone(), Duration::from_millis(600));

        flash(&store, &other, "t", FlashState::Up).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        flash(&store, &scheduler, "t", FlashState::Down).await;

        tokio::time::sleep(Duration::from_millis(560)).await;
        assert_eq!(flash_state(&store, "t").await, FlashState::Down);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(flash_state(&store, "t").await, FlashState::None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upsert_during_flash_still_clears() {
        let store = TokenStore::new();
        store.upsert_tokens(vec![token("t", TokenStage::NewPairs, 1000.0)]).await;
        let scheduler = FlashScheduler::new(store.clone(), Duration::from_millis(600));

        flash(&store, &scheduler, "t", FlashState::Up).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        let snapshot = store.get("t").await.unwrap();
        store.upsert_tokens(vec![snapshot]).await;
        assert_eq!(flash_state(&store, "t").await, FlashState::Up);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(flash_state(&store, "t").await, FlashState::None);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_stops_pending_clears() {
        let store = TokenStore::new();
        store
            .upsert_tokens(vec![
                token("a", TokenStage::NewPairs, 1.0),
                token("b", TokenStage::FinalStretch, 2.0),
            ])
            .await;
        let scheduler = FlashScheduler::new(store.clone(), Duration::from_millis(600));

        flash(&store, &scheduler, "a", FlashState::Up).await;
        flash(&store, &scheduler, "b", FlashState::Down).await;
        assert_eq!(scheduler.pending(), 2);

        scheduler.cancel_all();
        assert_eq!(scheduler.pending(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(flash_state(&store, "a").await, FlashState::Up);
        assert_eq!(flash_state(&store, "b").await, FlashState::Down);
    }
}
