//! Fetch poller
//!
//! Pulls batches from a [`TokenSource`] into the store: once at start, then on
//! every refetch tick or manual request. Each fetch retries with capped
//! exponential backoff before the failure is surfaced through [`FetchStatus`].

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_retry::Retry;
use tracing::{error, info, warn};

use super::store::TokenStore;
use crate::api::TokenSource;
use crate::error::PulseError;

#[derive(Debug, Clone, PartialEq)]
pub struct FetchPollerConfig {
    /// How long a successful batch counts as fresh
    pub stale_time: Duration,
    pub refetch_interval: Duration,
    /// Retries after the first failed attempt
    pub retry_attempts: usize,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl Default for FetchPollerConfig {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_secs(30),
            refetch_interval: Duration::from_secs(60),
            retry_attempts: 3,
            backoff_base: Duration::from_millis(1000),
            backoff_cap: Duration::from_millis(30_000),
        }
    }
}

/// Delay before retry number `attempt` (zero based): `base * 2^attempt`, capped.
pub fn retry_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base.checked_mul(factor).map_or(cap, |d| d.min(cap))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FetchStatus {
    Idle,
    Loading,
    #[serde(rename_all = "camelCase")]
    Ready {
        fetched_at: DateTime<Utc>,
        count: usize,
    },
    #[serde(rename_all = "camelCase")]
    Failed {
        error: String,
        failed_at: DateTime<Utc>,
        attempts: usize,
    },
}

pub struct FetchPoller {
    source: Arc<dyn TokenSource>,
    store: TokenStore,
    config: FetchPollerConfig,
    status: Arc<RwLock<FetchStatus>>,
    last_success: Arc<RwLock<Option<Instant>>>,
    refetch_requested: Arc<Notify>,
    running: Arc<RwLock<bool>>,
    shutdown_tx: broadcast::Sender<()>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl FetchPoller {
    pub fn new(source: Arc<dyn TokenSource>, store: TokenStore, config: FetchPollerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            source,
            store,
            config,
            status: Arc::new(RwLock::new(FetchStatus::Idle)),
            last_success: Arc::new(RwLock::new(None)),
            refetch_requested: Arc::new(Notify::new()),
            running: Arc::new(RwLock::new(false)),
            shutdown_tx,
            task: Mutex::new(None),
        }
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// One fetch with retries. The batch is upserted on success.
    pub async fn fetch_once(&self) -> Result<usize, PulseError> {
        Self::run_fetch(
            &self.source,
            &self.store,
            &self.config,
            &self.status,
            &self.last_success,
        )
        .await
    }

    async fn run_fetch(
        source: &Arc<dyn TokenSource>,
        store: &TokenStore,
        config: &FetchPollerConfig,
        status: &RwLock<FetchStatus>,
        last_success: &RwLock<Option<Instant>>,
    ) -> Result<usize, PulseError> {
        *status.write().await = FetchStatus::Loading;

        let strategy = (0..config.retry_attempts as u32)
            .map(|attempt| retry_delay(attempt, config.backoff_base, config.backoff_cap));
        let attempts = AtomicUsize::new(0);
        let counter = &attempts;

        let result = Retry::spawn(strategy, || async move {
            let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
            source.fetch_tokens().await.map_err(|e| {
                warn!("Fetch from {} failed (attempt {}): {}", source.name(), attempt, e);
                e
            })
        })
        .await;

        match result {
            Ok(tokens) => {
                let count = tokens.len();
                store.upsert_tokens(tokens).await;
                *last_success.write().await = Some(Instant::now());
                *status.write().await = FetchStatus::Ready { fetched_at: Utc::now(), count };
                info!("Fetched {} tokens from {}", count, source.name());
                Ok(count)
            }
            Err(e) => {
                let attempts = attempts.load(Ordering::SeqCst);
                error!("Fetch from {} gave up after {} attempts: {}", source.name(), attempts, e);
                *status.write().await = FetchStatus::Failed {
                    error: e.to_string(),
                    failed_at: Utc::now(),
                    attempts,
                };
                Err(PulseError::FetchExhausted { attempts, last_error: e.to_string() })
            }
        }
    }

    /// Fetch now, then on every refetch tick or `refetch()` request.
    pub async fn start(&self) -> Result<()> {
        let mut running = self.running.write().await;
        if *running {
            return Err(anyhow!("Fetch poller is already running"));
        }
        *running = true;
        drop(running);

        info!(
            "🔄 Starting fetch poller: source {}, refetch every {:?}",
            self.source.name(),
            self.config.refetch_interval
        );

        let source = self.source.clone();
        let store = self.store.clone();
        let config = self.config.clone();
        let status = self.status.clone();
        let last_success = self.last_success.clone();
        let refetch = self.refetch_requested.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(config.refetch_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Fetch poller received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {}
                    _ = refetch.notified() => {
                        ticker.reset();
                    }
                }
                // Failures are recorded in status; the next tick tries again
                let _ = Self::run_fetch(&source, &store, &config, &status, &last_success).await;
            }
        });

        *self.task.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        Ok(())
    }

    pub async fn stop(&self) {
        info!("Stopping fetch poller...");
        *self.running.write().await = false;
        let _ = self.shutdown_tx.send(());
        let handle = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Ask the polling loop for an immediate fetch. The refetch timer restarts
    /// from that point.
    pub fn refetch(&self) {
        self.refetch_requested.notify_one();
    }

    /// True until the first success, and once the last success is older than
    /// the stale time.
    pub async fn is_stale(&self) -> bool {
        match *self.last_success.read().await {
            Some(at) => at.elapsed() >= self.config.stale_time,
            None => true,
        }
    }

    pub async fn status(&self) -> FetchStatus {
        self.status.read().await.clone()
    }
}

impl Drop for FetchPoller {
    fn drop(&mut self) {
        if let Some(handle) = self.task.lock().unwrap_or_else(|e| e.into_inner()).take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::token::fixtures::token;
    use crate::models::{Token, TokenStage};
    use async_trait::async_trait;

    /// Fails the first `failures` calls, then returns one token per call.
    struct FlakySource {
        failures: usize,
        calls: AtomicUsize,
    }

    impl FlakySource {
        fn new(failures: usize) -> Arc<Self> {
            Arc::new(Self { failures, calls: AtomicUsize::new(0) })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenSource for FlakySource {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn fetch_tokens(&self) -> Result<Vec<Token>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(anyhow!("upstream unavailable"))
            } else {
                Ok(vec![token("t1", TokenStage::NewPairs, 1_000.0)])
            }
        }
    }

    fn config() -> FetchPollerConfig {
        FetchPollerConfig::default()
    }

    #[test]
    fn test_retry_delay_curve() {
        let base = Duration::from_millis(1000);
        let cap = Duration::from_millis(30_000);
        assert_eq!(retry_delay(0, base, cap), Duration::from_millis(1000));
        assert_eq!(retry_delay(1, base, cap), Duration::from_millis(2000));
        assert_eq!(retry_delay(2, base, cap), Duration::from_millis(4000));
        assert_eq!(retry_delay(5, base, cap), cap);
        assert_eq!(retry_delay(40, base, cap), cap);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let source = FlakySource::new(2);
        let store = TokenStore::new();
        let poller = FetchPoller::new(source.clone(), store.clone(), config());

        let started = Instant::now();
        let count = poller.fetch_once().await.unwrap();

        assert_eq!(count, 1);
        assert_eq!(source.calls(), 3);
        // 1s + 2s of backoff
        assert!(started.elapsed() >= Duration::from_millis(3000));
        assert!(store.get("t1").await.is_some());
        assert!(matches!(poller.status().await, FetchStatus::Ready { count: 1, .. }));
        assert!(!poller.is_stale().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_is_reported() {
        let source = FlakySource::new(usize::MAX);
        let store = TokenStore::new();
        let poller = FetchPoller::new(source.clone(), store.clone(), config());

        let err = poller.fetch_once().await.unwrap_err();
        match err {
            PulseError::FetchExhausted { attempts, .. } => assert_eq!(attempts, 4),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(source.calls(), 4);
        assert!(store.is_empty().await);
        assert!(matches!(poller.status().await, FetchStatus::Failed { attempts: 4, .. }));
        assert!(poller.is_stale().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_goes_stale_after_stale_time() {
        let poller = FetchPoller::new(FlakySource::new(0), TokenStore::new(), config());
        assert!(poller.is_stale().await);
        assert_eq!(poller.status().await, FetchStatus::Idle);

        poller.fetch_once().await.unwrap();
        assert!(!poller.is_stale().await);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(poller.is_stale().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_on_interval_and_on_request() {
        let source = FlakySource::new(0);
        let poller = FetchPoller::new(source.clone(), TokenStore::new(), config());

        poller.start().await.unwrap();
        assert!(poller.start().await.is_err());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.calls(), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls(), 2);

        poller.refetch();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.calls(), 3);

        poller.stop().await;
        assert!(!poller.is_running().await);
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(source.calls(), 3);
    }
}
