//! Token Store
//!
//! The single owner of the live token collection. Everything else reads
//! snapshots or sends intents (upsert / partial update) through this handle.
//! Operations on an unknown id are silent no-ops: a late update for a token
//! that was evicted, or an early one for a token not yet fetched, is normal
//! churn on a live board.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

use crate::models::{FlashState, Token};

/// Default upper bound on tracked tokens
pub const DEFAULT_MAX_TOKENS: usize = 500;

/// Capacity of the change-event channel
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Partial market update for one token.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceUpdate {
    pub id: String,
    pub market_cap: f64,
    pub flash_state: FlashState,
    /// Replaces the sparkline wholesale when present. Windowing is the caller's job.
    pub sparkline: Option<Vec<f64>>,
}

/// Partial bonding-curve update for one token. Values are trusted as given.
#[derive(Debug, Clone, PartialEq)]
pub struct BondingUpdate {
    pub id: String,
    pub progress_percent: f64,
    pub sol_reserves: f64,
}

/// Change notifications fanned out to subscribers (the WebSocket layer).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreEvent {
    Upserted {
        ids: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    PriceUpdated {
        id: String,
        market_cap: f64,
        flash_state: FlashState,
        sparkline: Option<Vec<f64>>,
    },
    #[serde(rename_all = "camelCase")]
    BondingUpdated {
        id: String,
        progress_percent: f64,
        sol_reserves: f64,
    },
    FlashCleared {
        id: String,
    },
    Removed {
        id: String,
    },
}

#[derive(Debug, Default)]
struct StoreInner {
    entities: HashMap<String, Token>,
    /// Insertion order; an id enters once, on first upsert
    ids: Vec<String>,
    /// Stamp of the latest flash write per token
    flash_versions: HashMap<String, u64>,
    /// Stamps are drawn from one counter so a re-inserted id never reuses one
    next_flash_version: u64,
}

impl StoreInner {
    fn bump_flash_version(&mut self, id: &str) -> u64 {
        self.next_flash_version += 1;
        self.flash_versions.insert(id.to_string(), self.next_flash_version);
        self.next_flash_version
    }

    fn remove(&mut self, id: &str) -> Option<Token> {
        let removed = self.entities.remove(id);
        if removed.is_some() {
            self.ids.retain(|existing| existing != id);
            self.flash_versions.remove(id);
        }
        removed
    }
}

/// Cheaply cloneable handle to the shared token collection.
#[derive(Clone)]
pub struct TokenStore {
    inner: Arc<RwLock<StoreInner>>,
    events: broadcast::Sender<StoreEvent>,
    max_tokens: usize,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_TOKENS)
    }

    /// Store that evicts the oldest-inserted tokens beyond `max_tokens`.
    pub fn with_capacity(max_tokens: usize) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(RwLock::new(StoreInner::default())),
            events,
            max_tokens: max_tokens.max(1),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Insert-or-replace by id. Full-record replace, not a deep merge.
    pub async fn upsert_tokens(&self, tokens: Vec<Token>) {
        if tokens.is_empty() {
            return;
        }

        let mut inner = self.inner.write().await;
        let mut upserted = Vec::with_capacity(tokens.len());
        let mut inserted = 0usize;

        for token in tokens {
            let id = token.id.clone();
            let flashing = token.flash_state != FlashState::None;
            match inner.entities.insert(id.clone(), token) {
                Some(_) => {
                    // A flashing record keeps its stamp so the pending clear still lands
                    if !flashing {
                        inner.bump_flash_version(&id);
                    }
                }
                None => {
                    inner.ids.push(id.clone());
                    inserted += 1;
                }
            }
            upserted.push(id);
        }

        let mut evicted = Vec::new();
        while inner.ids.len() > self.max_tokens {
            let oldest = inner.ids[0].clone();
            inner.remove(&oldest);
            evicted.push(oldest);
        }
        let total = inner.ids.len();
        drop(inner);

        info!(
            "📥 Upserted {} tokens ({} new, {} evicted, {} tracked)",
            upserted.len(),
            inserted,
            evicted.len(),
            total
        );

        upserted.retain(|id| !evicted.contains(id));
        self.emit(StoreEvent::Upserted { ids: upserted });
        for id in evicted {
            self.emit(StoreEvent::Removed { id });
        }
    }

    /// Applies a price tick. Returns the flash version the write was stamped
    /// with, or `None` if the token is not tracked.
    pub async fn update_token_price(&self, update: PriceUpdate) -> Option<u64> {
        let mut inner = self.inner.write().await;
        let token = match inner.entities.get_mut(&update.id) {
            Some(token) => token,
            None => {
                debug!("Price update for untracked token {}, ignoring", update.id);
                return None;
            }
        };

        token.market_data.market_cap = update.market_cap;
        token.flash_state = update.flash_state;
        if let Some(sparkline) = &update.sparkline {
            token.market_data.sparkline = sparkline.clone();
        }
        let version = inner.bump_flash_version(&update.id);
        drop(inner);

        self.emit(StoreEvent::PriceUpdated {
            id: update.id,
            market_cap: update.market_cap,
            flash_state: update.flash_state,
            sparkline: update.sparkline,
        });
        Some(version)
    }

    pub async fn update_bonding_progress(&self, update: BondingUpdate) {
        let mut inner = self.inner.write().await;
        let Some(token) = inner.entities.get_mut(&update.id) else {
            debug!("Bonding update for untracked token {}, ignoring", update.id);
            return;
        };

        let curve = &mut token.lifecycle.bonding_curve;
        curve.progress_percent = update.progress_percent;
        curve.sol_reserves = update.sol_reserves;
        drop(inner);

        self.emit(StoreEvent::BondingUpdated {
            id: update.id,
            progress_percent: update.progress_percent,
            sol_reserves: update.sol_reserves,
        });
    }

    /// Unconditionally resets the flash state.
    pub async fn clear_flash_state(&self, id: &str) {
        let mut inner = self.inner.write().await;
        let cleared = match inner.entities.get_mut(id) {
            Some(token) => {
                token.flash_state = FlashState::None;
                true
            }
            None => false,
        };
        if cleared {
            inner.bump_flash_version(id);
        }
        drop(inner);

        if cleared {
            self.emit(StoreEvent::FlashCleared { id: id.to_string() });
        }
    }

    /// Resets the flash state only if nothing has written it since `version`
    /// was handed out. Returns whether the clear applied.
    pub async fn clear_flash_state_if_current(&self, id: &str, version: u64) -> bool {
        let mut inner = self.inner.write().await;
        if inner.flash_versions.get(id).copied() != Some(version) {
            debug!("Skipping stale flash clear for {} (version {})", id, version);
            return false;
        }
        let Some(token) = inner.entities.get_mut(id) else {
            return false;
        };
        token.flash_state = FlashState::None;
        drop(inner);

        self.emit(StoreEvent::FlashCleared { id: id.to_string() });
        true
    }

    pub async fn remove_token(&self, id: &str) -> Option<Token> {
        let removed = self.inner.write().await.remove(id);
        if removed.is_some() {
            self.emit(StoreEvent::Removed { id: id.to_string() });
        }
        removed
    }

    pub async fn get(&self, id: &str) -> Option<Token> {
        self.inner.read().await.entities.get(id).cloned()
    }

    /// Cloned tokens in insertion order.
    pub async fn snapshot(&self) -> Vec<Token> {
        let inner = self.inner.read().await;
        inner
            .ids
            .iter()
            .filter_map(|id| inner.entities.get(id).cloned())
            .collect()
    }

    pub async fn ids(&self) -> Vec<String> {
        self.inner.read().await.ids.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.ids.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}
