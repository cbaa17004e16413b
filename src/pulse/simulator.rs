// src/pulse/simulator.rs
//
// Simulated market feed. Stands in for a live streaming source: every tick a
// random subset of tracked tokens gets a small price move, a sliding
// sparkline sample, a bit of bonding-curve fill, and a short-lived flash.

use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use super::flash::FlashScheduler;
use super::store::{BondingUpdate, PriceUpdate, TokenStore};
use crate::models::{FlashState, Token};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub tick_interval: Duration,
    /// Share of tracked tokens touched per tick
    pub trigger_probability: f64,
    /// Chance a touched token moves up
    pub up_probability: f64,
    /// Largest single-tick relative move
    pub max_magnitude: f64,
    pub flash_clear_delay: Duration,
    /// Upper bound of the per-tick bonding progress increment
    pub bonding_increment_max: f64,
    /// SOL capacity for tokens without their own migration threshold
    pub default_bonding_capacity: f64,
    /// Fixed seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(1000),
            trigger_probability: 0.3,
            up_probability: 0.55,
            max_magnitude: 0.03,
            flash_clear_delay: Duration::from_millis(600),
            bonding_increment_max: 0.002,
            default_bonding_capacity: 85.0,
            seed: None,
        }
    }
}

// ============================================================================
// PLANNING
// ============================================================================

/// Everything one tick will do to one token.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedUpdate {
    pub price: PriceUpdate,
    pub bonding: Option<BondingUpdate>,
}

/// Draws this tick's move for `token`, or `None` if it sits the tick out.
pub fn plan_update<R: Rng>(
    token: &Token,
    config: &SimulatorConfig,
    rng: &mut R,
) -> Option<PlannedUpdate> {
    let trigger: f64 = rng.gen();
    if trigger <= 1.0 - config.trigger_probability {
        return None;
    }

    let is_up = rng.gen::<f64>() > 1.0 - config.up_probability;
    let magnitude = rng.gen::<f64>() * config.max_magnitude;
    let factor = if is_up { 1.0 + magnitude } else { 1.0 - magnitude };

    let market = &token.market_data;
    let sparkline = slide_window(&market.sparkline, market.price_usd * factor);

    let price = PriceUpdate {
        id: token.id.clone(),
        market_cap: market.market_cap * factor,
        flash_state: if is_up { FlashState::Up } else { FlashState::Down },
        sparkline,
    };

    let bonding = if token.is_bonding() {
        let curve = &token.lifecycle.bonding_curve;
        let increment = rng.gen::<f64>() * config.bonding_increment_max;
        let progress = (curve.progress_percent + increment).clamp(0.0, 1.0);
        Some(BondingUpdate {
            id: token.id.clone(),
            progress_percent: progress,
            sol_reserves: progress * curve.capacity(config.default_bonding_capacity),
        })
    } else {
        None
    };

    Some(PlannedUpdate { price, bonding })
}

/// Drops the oldest sample and appends `sample`. An empty window has no width
/// to preserve, so it yields no replacement.
fn slide_window(window: &[f64], sample: f64) -> Option<Vec<f64>> {
    if window.is_empty() {
        return None;
    }
    let mut next = Vec::with_capacity(window.len());
    next.extend_from_slice(&window[1..]);
    next.push(sample);
    Some(next)
}

// ============================================================================
// DRIVER
// ============================================================================

/// Periodically perturbs the store. Owns its tick task and every pending
/// flash clear; both are torn down by `stop()` or on drop.
pub struct SimulatedUpdateDriver {
    store: TokenStore,
    config: SimulatorConfig,
    flash: FlashScheduler,
    rng: Arc<Mutex<StdRng>>,
    running: Arc<RwLock<bool>>,
    shutdown_tx: broadcast::Sender<()>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SimulatedUpdateDriver {
    pub fn new(store: TokenStore, config: SimulatorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            flash: FlashScheduler::new(store.clone(), config.flash_clear_delay),
            store,
            config,
            rng: Arc::new(Mutex::new(rng)),
            running: Arc::new(RwLock::new(false)),
            shutdown_tx,
            task: Mutex::new(None),
        }
    }

    pub fn flash_scheduler(&self) -> &FlashScheduler {
        &self.flash
    }

    /// Start ticking.
    pub async fn start(&self) -> Result<()> {
        let mut running = self.running.write().await;
        if *running {
            return Err(anyhow!("Simulated update driver is already running"));
        }
        *running = true;
        drop(running);

        info!(
            "📈 Starting simulated feed: tick {:?}, trigger {:.0}%, max move {:.1}%",
            self.config.tick_interval,
            self.config.trigger_probability * 100.0,
            self.config.max_magnitude * 100.0
        );

        let store = self.store.clone();
        let config = self.config.clone();
        let flash = self.flash.clone();
        let rng = self.rng.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(config.tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a tokio interval completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Simulated feed received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        Self::run_tick(&store, &config, &flash, &rng).await;
                    }
                }
            }
        });

        *self.task.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        Ok(())
    }

    /// Stop ticking and cancel every pending flash clear.
    pub async fn stop(&self) {
        info!("Stopping simulated feed...");
        *self.running.write().await = false;
        let _ = self.shutdown_tx.send(());
        let handle = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            handle.abort();
            // Wait out a tick that may be mid-flight before dropping its clears
            let _ = handle.await;
        }
        self.flash.cancel_all();
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Run one tick by hand. Returns how many tokens were touched.
    pub async fn tick(&self) -> usize {
        Self::run_tick(&self.store, &self.config, &self.flash, &self.rng).await
    }

    async fn run_tick(
        store: &TokenStore,
        config: &SimulatorConfig,
        flash: &FlashScheduler,
        rng: &Mutex<StdRng>,
    ) -> usize {
        let tokens = store.snapshot().await;
        if tokens.is_empty() {
            return 0;
        }

        let plans: Vec<PlannedUpdate> = {
            let mut rng = rng.lock().unwrap_or_else(|e| e.into_inner());
            tokens
                .iter()
                .filter_map(|token| plan_update(token, config, &mut *rng))
                .collect()
        };

        let touched = plans.len();
        for plan in plans {
            let id = plan.price.id.clone();
            if let Some(version) = store.update_token_price(plan.price).await {
                flash.schedule_clear(&id, version);
            }
            if let Some(bonding) = plan.bonding {
                store.update_bonding_progress(bonding).await;
            }
        }

        debug!("Simulated tick touched {}/{} tokens", touched, tokens.len());
        touched
    }
}

impl Drop for SimulatedUpdateDriver {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().unwrap_or_else(|e| e.into_inner()).take() {
            handle.abort();
        }
        self.flash.cancel_all();
    }
}

// ============================================================================
// TESTS
// ============================================================================
