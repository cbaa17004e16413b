//! Mock token feed
//!
//! Generates plausible board tokens for each lifecycle column so the board
//! can run without any upstream API. Ids are stable for the lifetime of a
//! source, so every refetch replaces the same records instead of piling up
//! new ones. A token is minted once; later fetches re-emit its identity,
//! lifecycle and forensics and only redraw its market data.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use super::TokenSource;
use crate::models::token::*;
use crate::pulse::format::{age_human_readable, format_age};

const TOKEN_NAMES: [(&str, &str); 20] = [
    ("PEPE", "Pepe on Solana"),
    ("DOGE", "Dogecoin Sol"),
    ("SHIB", "Shiba Sol"),
    ("BONK", "Bonk Inu"),
    ("WIF", "Dogwifhat"),
    ("MYRO", "Myro"),
    ("POPCAT", "Pop Cat"),
    ("MOG", "Mog Coin"),
    ("BRETT", "Brett"),
    ("TURBO", "Turbo"),
    ("FLOKI", "Floki Inu"),
    ("WOJAK", "Wojak"),
    ("MEME", "Memecoin"),
    ("BOME", "Book of Meme"),
    ("SLERF", "Slerf"),
    ("MEW", "Cat in Dogs World"),
    ("NEIRO", "Neiro"),
    ("GIGA", "Gigachad"),
    ("APU", "Apu Apustaja"),
    ("SPX", "SPX6900"),
];

const BASE58_ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

pub const SPARKLINE_POINTS: usize = 12;

/// SOL a pump.fun curve holds when it completes
const MIGRATION_THRESHOLD_SOL: f64 = 85.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trend {
    Up,
    Down,
    Neutral,
}

/// How many tokens to generate per column.
#[derive(Debug, Clone, Copy)]
pub struct MockCounts {
    pub new_pairs: usize,
    pub final_stretch: usize,
    pub migrated: usize,
}

impl Default for MockCounts {
    fn default() -> Self {
        Self { new_pairs: 8, final_stretch: 6, migrated: 5 }
    }
}

pub struct MockTokenSource {
    latency: Duration,
    counts: MockCounts,
    /// Fixed per source so ids survive refetches
    session: i64,
    rng: Mutex<StdRng>,
    issued: Mutex<HashMap<String, Token>>,
}

impl MockTokenSource {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            counts: MockCounts::default(),
            session: Utc::now().timestamp_millis(),
            rng: Mutex::new(StdRng::from_entropy()),
            issued: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_counts(mut self, counts: MockCounts) -> Self {
        self.counts = counts;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Generates one full batch across the three columns.
    pub fn generate_batch(&self, now_ms: i64) -> Vec<Token> {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let mut issued = self.issued.lock().unwrap_or_else(|e| e.into_inner());
        let mut tokens = Vec::with_capacity(
            self.counts.new_pairs + self.counts.final_stretch + self.counts.migrated,
        );
        for (stage, count) in [
            (TokenStage::NewPairs, self.counts.new_pairs),
            (TokenStage::FinalStretch, self.counts.final_stretch),
            (TokenStage::Migrated, self.counts.migrated),
        ] {
            for index in 0..count {
                let id = format!("{}-{}-{}", stage, index, self.session);
                let token = match issued.get(&id) {
                    Some(known) => {
                        let mut token = known.clone();
                        token.market_data = generate_market_data(&mut *rng, stage);
                        token.lifecycle.age_human_readable =
                            age_human_readable(token.lifecycle.created_at_ts, now_ms);
                        token
                    }
                    None => generate_token(&mut *rng, id.clone(), index, stage, now_ms),
                };
                issued.insert(id, token.clone());
                tokens.push(token);
            }
        }
        tokens
    }
}

#[async_trait]
impl TokenSource for MockTokenSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_tokens(&self) -> Result<Vec<Token>> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let tokens = self.generate_batch(Utc::now().timestamp_millis());
        debug!("Mock feed generated {} tokens", tokens.len());
        Ok(tokens)
    }
}

fn random_address<R: Rng>(rng: &mut R) -> String {
    (0..8)
        .map(|_| BASE58_ALPHABET[rng.gen_range(0..BASE58_ALPHABET.len())] as char)
        .collect()
}

fn generate_sparkline<R: Rng>(rng: &mut R, trend: Trend) -> Vec<f64> {
    let mut value = rng.gen::<f64>() * 0.0001;
    (0..SPARKLINE_POINTS)
        .map(|_| {
            let change = match trend {
                Trend::Up => rng.gen::<f64>() * 0.00002,
                Trend::Down => -rng.gen::<f64>() * 0.00002,
                Trend::Neutral => (rng.gen::<f64>() - 0.5) * 0.00002,
            };
            value = (value + change).max(0.00001);
            value
        })
        .collect()
}

/// Market snapshot with ranges that fit the column. Redrawn on every fetch.
fn generate_market_data<R: Rng>(rng: &mut R, stage: TokenStage) -> MarketData {
    let market_cap = match stage {
        TokenStage::Migrated => rng.gen_range(100_000.0..1_000_000.0),
        TokenStage::FinalStretch => rng.gen_range(50_000.0..150_000.0),
        TokenStage::NewPairs => rng.gen_range(5_000.0..55_000.0),
    };

    let trend = if rng.gen_bool(0.5) {
        Trend::Up
    } else if rng.gen_bool(0.5) {
        Trend::Down
    } else {
        Trend::Neutral
    };

    let buys: u64 = rng.gen_range(20..220);
    let sells: u64 = rng.gen_range(5..55);

    MarketData {
        price_usd: 0.00001 + rng.gen::<f64>() * 0.001,
        price_sol: 0.0000001 + rng.gen::<f64>() * 0.00001,
        market_cap,
        liquidity_usd: market_cap * rng.gen_range(0.1..0.4),
        volume: Volume {
            v5m: rng.gen_range(1_000.0..101_000.0),
            v1h: rng.gen_range(5_000.0..505_000.0),
            direction: match trend {
                Trend::Up => VolumeDirection::BuyHeavy,
                Trend::Down => VolumeDirection::SellHeavy,
                Trend::Neutral => VolumeDirection::Neutral,
            },
        },
        transactions: Transactions::new(buys, sells),
        sparkline: generate_sparkline(rng, trend),
    }
}

/// Builds one token with ranges that fit its column.
pub fn generate_token<R: Rng>(rng: &mut R, id: String, index: usize, stage: TokenStage, now_ms: i64) -> Token {
    let (symbol, name) = TOKEN_NAMES[index % TOKEN_NAMES.len()];
    let migrated = stage == TokenStage::Migrated;

    let progress_percent = match stage {
        TokenStage::Migrated => 1.0,
        TokenStage::FinalStretch => rng.gen_range(0.8..0.99),
        TokenStage::NewPairs => rng.gen_range(0.0..0.4),
    };

    let age_minutes: i64 = match stage {
        TokenStage::Migrated => rng.gen_range(180..480),
        TokenStage::FinalStretch => rng.gen_range(30..90),
        TokenStage::NewPairs => rng.gen_range(0..30),
    };

    let lower = symbol.to_lowercase();
    let market_data = generate_market_data(rng, stage);

    Token {
        id,
        timestamp: now_ms,
        sequence_id: index as u64,
        flash_state: FlashState::None,
        token_identity: TokenIdentity {
            symbol: if index > TOKEN_NAMES.len() {
                format!("{}{}", symbol, index)
            } else {
                symbol.to_string()
            },
            name: name.to_string(),
            icon_url: format!("https://api.dicebear.com/7.x/identicon/svg?seed={}{}", symbol, index),
            icon_shape: if migrated { IconShape::Circle } else { IconShape::Square },
            platform_badge: if migrated { PlatformBadge::Raydium } else { PlatformBadge::PumpFun },
            socials: Socials {
                twitter: Some(format!("https://x.com/{}", lower)),
                website: Some(format!("https://{}.sol", lower)),
                telegram: Some(format!("https://t.me/{}", lower)),
            },
        },
        lifecycle: Lifecycle {
            stage,
            created_at_ts: now_ms - age_minutes * 60_000,
            age_human_readable: format_age(age_minutes),
            bonding_curve: BondingCurve {
                is_active: !migrated,
                progress_percent,
                sol_reserves: progress_percent * MIGRATION_THRESHOLD_SOL,
                migration_threshold: MIGRATION_THRESHOLD_SOL,
                time_to_fill_est: ((1.0 - progress_percent) * 300.0).floor() as u64,
            },
        },
        market_data,
        security_forensics: SecurityForensics {
            score: rng.gen_range(60..100),
            is_honeypot: false,
            mint_auth_disabled: rng.gen_bool(0.8),
            freeze_auth_disabled: rng.gen_bool(0.8),
            deployer: Deployer {
                address: random_address(rng),
                holding_pct: rng.gen::<f64>() * 0.1,
                is_selling: rng.gen_bool(0.2),
                tags: if rng.gen_bool(0.3) { vec!["serial_deployer".to_string()] } else { vec![] },
            },
            snipers: Snipers {
                count: rng.gen_range(0..5),
                total_supply_sniped: rng.gen::<f64>() * 0.05,
                status: if rng.gen_bool(0.3) { SniperRisk::MediumRisk } else { SniperRisk::LowRisk },
            },
            insiders: Insiders {
                count: rng.gen_range(0..3),
                holding_pct: rng.gen::<f64>() * 0.1,
            },
            bundles: Bundles {
                is_bundled: rng.gen_bool(0.2),
                bundle_supply_pct: rng.gen::<f64>() * 0.05,
            },
        },
        distribution: Distribution {
            buckets: HolderBuckets {
                whales_over1pct: rng.gen_range(0..10),
                fish_under01pct: rng.gen_range(100..600),
            },
        },
        social_signals: SocialSignals {
            smart_money_count: if rng.gen_bool(0.4) { rng.gen_range(0..5) } else { 0 },
            whale_count: rng.gen_range(0..3),
            fresh_wallet_count: rng.gen_range(0..20),
            tweet_sentiment: TweetSentiment {
                mention_count: rng.gen_range(0..50),
                influencer_mentions: if rng.gen_bool(0.3) {
                    vec!["@Ansem".to_string(), "@blknoiz06".to_string()]
                } else {
                    vec![]
                },
            },
        },
        user_execution: UserExecution {
            quick_buy_defaults: vec![0.5, 1.0, 5.0],
            user_holding: UserHolding {
                is_held: rng.gen_bool(0.2),
                balance: rng.gen_range(0..1_000_000) as f64,
                pnl_usd: (rng.gen::<f64>() - 0.3) * 500.0,
            },
        },
    }
}
