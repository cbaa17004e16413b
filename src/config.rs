use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::api::dexscreener::DEXSCREENER_BASE_URL;
use crate::error::PulseError;
use crate::pulse::fetcher::FetchPollerConfig;
use crate::pulse::simulator::SimulatorConfig;

/// Where the initial and periodic token batches come from.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenSourceKind {
    Mock,
    DexScreener,
}

impl FromStr for TokenSourceKind {
    type Err = PulseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "dexscreener" => Ok(Self::DexScreener),
            other => Err(PulseError::ConfigError(format!(
                "TOKEN_SOURCE must be 'mock' or 'dexscreener', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    pub api_host: Option<String>,
    pub api_port: Option<u16>,

    pub token_source: TokenSourceKind,
    pub dexscreener_base_url: String,
    pub dexscreener_max_pairs: usize,
    pub mock_latency_ms: u64,
    pub max_tracked_tokens: usize,

    // Simulated feed
    pub tick_interval_ms: u64,
    pub trigger_probability: f64,
    pub up_probability: f64,
    pub max_magnitude: f64,
    pub flash_clear_delay_ms: u64,
    pub bonding_increment_max: f64,
    pub bonding_capacity: f64, // Fallback when a token carries no threshold
    pub sim_seed: Option<u64>,

    // Fetch poller
    pub fetch_stale_time_secs: u64,
    pub fetch_refetch_interval_secs: u64,
    pub fetch_retry_attempts: usize,
    pub fetch_backoff_base_ms: u64,
    pub fetch_backoff_cap_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_host: None,
            api_port: None,
            token_source: TokenSourceKind::Mock,
            dexscreener_base_url: DEXSCREENER_BASE_URL.to_string(),
            dexscreener_max_pairs: 20,
            mock_latency_ms: 1500,
            max_tracked_tokens: 500,
            tick_interval_ms: 1000,
            trigger_probability: 0.3,
            up_probability: 0.55,
            max_magnitude: 0.03,
            flash_clear_delay_ms: 600,
            bonding_increment_max: 0.002,
            bonding_capacity: 85.0,
            sim_seed: None,
            fetch_stale_time_secs: 30,
            fetch_refetch_interval_secs: 60,
            fetch_retry_attempts: 3,
            fetch_backoff_base_ms: 1000,
            fetch_backoff_cap_ms: 30_000,
        }
    }
}

/// Reads `key`, falling back to `default` when unset.
fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Failed to parse {}", key)),
        Err(_) => Ok(default),
    }
}

fn env_opt<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Failed to parse {}", key)),
        _ => Ok(None),
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let defaults = Self::default();

        let token_source = match env::var("TOKEN_SOURCE") {
            Ok(raw) => raw.parse::<TokenSourceKind>()?,
            Err(_) => defaults.token_source,
        };

        let config = Self {
            api_host: env::var("API_HOST").ok(),
            api_port: env_opt("API_PORT")?,

            token_source,
            dexscreener_base_url: env::var("DEXSCREENER_BASE_URL")
                .unwrap_or(defaults.dexscreener_base_url),
            dexscreener_max_pairs: env_or("DEXSCREENER_MAX_PAIRS", defaults.dexscreener_max_pairs)?,
            mock_latency_ms: env_or("MOCK_LATENCY_MS", defaults.mock_latency_ms)?,
            max_tracked_tokens: env_or("MAX_TRACKED_TOKENS", defaults.max_tracked_tokens)?,

            tick_interval_ms: env_or("PULSE_TICK_INTERVAL_MS", defaults.tick_interval_ms)?,
            trigger_probability: env_or("PULSE_TRIGGER_PROBABILITY", defaults.trigger_probability)?,
            up_probability: env_or("PULSE_UP_PROBABILITY", defaults.up_probability)?,
            max_magnitude: env_or("PULSE_MAX_MAGNITUDE", defaults.max_magnitude)?,
            flash_clear_delay_ms: env_or("PULSE_FLASH_CLEAR_DELAY_MS", defaults.flash_clear_delay_ms)?,
            bonding_increment_max: env_or("PULSE_BONDING_INCREMENT_MAX", defaults.bonding_increment_max)?,
            bonding_capacity: env_or("PULSE_BONDING_CAPACITY", defaults.bonding_capacity)?,
            sim_seed: env_opt("PULSE_SIM_SEED")?,

            fetch_stale_time_secs: env_or("FETCH_STALE_TIME_SECS", defaults.fetch_stale_time_secs)?,
            fetch_refetch_interval_secs: env_or(
                "FETCH_REFETCH_INTERVAL_SECS",
                defaults.fetch_refetch_interval_secs,
            )?,
            fetch_retry_attempts: env_or("FETCH_RETRY_ATTEMPTS", defaults.fetch_retry_attempts)?,
            fetch_backoff_base_ms: env_or("FETCH_BACKOFF_BASE_MS", defaults.fetch_backoff_base_ms)?,
            fetch_backoff_cap_ms: env_or("FETCH_BACKOFF_CAP_MS", defaults.fetch_backoff_cap_ms)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), PulseError> {
        for (name, p) in [
            ("PULSE_TRIGGER_PROBABILITY", self.trigger_probability),
            ("PULSE_UP_PROBABILITY", self.up_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(PulseError::ConfigError(format!("{} must be within [0, 1], got {}", name, p)));
            }
        }
        if !(0.0..1.0).contains(&self.max_magnitude) {
            return Err(PulseError::ConfigError(format!(
                "PULSE_MAX_MAGNITUDE must be within [0, 1), got {}",
                self.max_magnitude
            )));
        }
        if !(0.0..=1.0).contains(&self.bonding_increment_max) {
            return Err(PulseError::ConfigError(format!(
                "PULSE_BONDING_INCREMENT_MAX must be within [0, 1], got {}",
                self.bonding_increment_max
            )));
        }
        if !(self.bonding_capacity > 0.0 && self.bonding_capacity.is_finite()) {
            return Err(PulseError::ConfigError("PULSE_BONDING_CAPACITY must be positive and finite".to_string()));
        }
        if self.tick_interval_ms == 0 || self.fetch_refetch_interval_secs == 0 {
            return Err(PulseError::ConfigError("Tick and refetch intervals must be non-zero".to_string()));
        }
        if self.fetch_backoff_cap_ms < self.fetch_backoff_base_ms {
            return Err(PulseError::ConfigError(
                "FETCH_BACKOFF_CAP_MS must not be below FETCH_BACKOFF_BASE_MS".to_string(),
            ));
        }
        if self.max_tracked_tokens == 0 {
            return Err(PulseError::ConfigError("MAX_TRACKED_TOKENS must be positive".to_string()));
        }
        Ok(())
    }

    pub fn simulator(&self) -> SimulatorConfig {
        SimulatorConfig {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            trigger_probability: self.trigger_probability,
            up_probability: self.up_probability,
            max_magnitude: self.max_magnitude,
            flash_clear_delay: Duration::from_millis(self.flash_clear_delay_ms),
            bonding_increment_max: self.bonding_increment_max,
            default_bonding_capacity: self.bonding_capacity,
            seed: self.sim_seed,
        }
    }

    pub fn fetcher(&self) -> FetchPollerConfig {
        FetchPollerConfig {
            stale_time: Duration::from_secs(self.fetch_stale_time_secs),
            refetch_interval: Duration::from_secs(self.fetch_refetch_interval_secs),
            retry_attempts: self.fetch_retry_attempts,
            backoff_base: Duration::from_millis(self.fetch_backoff_base_ms),
            backoff_cap: Duration::from_millis(self.fetch_backoff_cap_ms),
        }
    }
}
