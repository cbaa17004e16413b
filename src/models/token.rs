//! Token entity model
//!
//! The canonical shape of a tracked token as it lives in the store and as it
//! goes out over the wire. Field names serialize in camelCase so the JSON
//! matches what the dashboard front-end already consumes.

use serde::{Deserialize, Serialize};

// ============================================================================
// ENUMS
// ============================================================================

/// Lifecycle column a token currently sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenStage {
    NewPairs,
    FinalStretch,
    Migrated,
}

impl TokenStage {
    pub const ALL: [TokenStage; 3] = [Self::NewPairs, Self::FinalStretch, Self::Migrated];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewPairs => "NEW_PAIRS",
            Self::FinalStretch => "FINAL_STRETCH",
            Self::Migrated => "MIGRATED",
        }
    }
}

impl std::fmt::Display for TokenStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TokenStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NEW_PAIRS" => Ok(Self::NewPairs),
            "FINAL_STRETCH" => Ok(Self::FinalStretch),
            "MIGRATED" => Ok(Self::Migrated),
            other => Err(format!("unknown token stage: {}", other)),
        }
    }
}

/// Transient price-move indicator. Set by a price update, cleared shortly after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashState {
    Up,
    Down,
    #[default]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformBadge {
    PumpFun,
    Raydium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IconShape {
    Square,
    Circle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolumeDirection {
    BuyHeavy,
    SellHeavy,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SniperRisk {
    LowRisk,
    MediumRisk,
    HighRisk,
}

// ============================================================================
// ROOT ENTITY
// ============================================================================

/// A tracked token. Keyed by `id` (usually the trading pair address).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub id: String,
    /// Creation instant, milliseconds since epoch
    pub timestamp: i64,
    /// Insertion-order hint assigned at creation
    pub sequence_id: u64,
    #[serde(default)]
    pub flash_state: FlashState,
    pub token_identity: TokenIdentity,
    pub lifecycle: Lifecycle,
    pub market_data: MarketData,
    pub security_forensics: SecurityForensics,
    pub distribution: Distribution,
    pub social_signals: SocialSignals,
    pub user_execution: UserExecution,
}

impl Token {
    pub fn stage(&self) -> TokenStage {
        self.lifecycle.stage
    }

    /// Milliseconds elapsed since the pair was created.
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.lifecycle.created_at_ts
    }

    /// Whether the simulated feed may still move the bonding curve.
    pub fn is_bonding(&self) -> bool {
        self.lifecycle.stage != TokenStage::Migrated && self.lifecycle.bonding_curve.is_active
    }
}

// ============================================================================
// IDENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenIdentity {
    pub symbol: String,
    pub name: String,
    pub icon_url: String,
    pub icon_shape: IconShape,
    pub platform_badge: PlatformBadge,
    #[serde(default)]
    pub socials: Socials,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Socials {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram: Option<String>,
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lifecycle {
    pub stage: TokenStage,
    pub created_at_ts: i64,
    /// Display-only; consumers recompute it from `created_at_ts`
    pub age_human_readable: String,
    pub bonding_curve: BondingCurve,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BondingCurve {
    pub is_active: bool,
    /// Fill progress in [0, 1]
    pub progress_percent: f64,
    pub sol_reserves: f64,
    /// SOL needed to complete the curve and migrate
    pub migration_threshold: f64,
    /// Seconds
    pub time_to_fill_est: u64,
}

impl BondingCurve {
    /// SOL capacity used to scale reserves from progress. Tokens without a
    /// usable threshold fall back to `default_capacity`.
    pub fn capacity(&self, default_capacity: f64) -> f64 {
        if self.migration_threshold > 0.0 && self.migration_threshold.is_finite() {
            self.migration_threshold
        } else {
            default_capacity
        }
    }
}

// ============================================================================
// MARKET DATA
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketData {
    pub price_usd: f64,
    pub price_sol: f64,
    pub market_cap: f64,
    pub liquidity_usd: f64,
    pub volume: Volume,
    pub transactions: Transactions,
    /// Recent samples, oldest first. Width is fixed per token.
    pub sparkline: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    pub v5m: f64,
    pub v1h: f64,
    pub direction: VolumeDirection,
}

impl Volume {
    /// Tags flow as buy/sell heavy once one side outweighs the other by 20%.
    pub fn direction_for(buys: u64, sells: u64) -> VolumeDirection {
        let (buys, sells) = (buys as f64, sells as f64);
        if buys > sells * 1.2 {
            VolumeDirection::BuyHeavy
        } else if sells > buys * 1.2 {
            VolumeDirection::SellHeavy
        } else {
            VolumeDirection::Neutral
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transactions {
    pub buys5m: u64,
    pub sells5m: u64,
    pub ratio: f64,
}

impl Transactions {
    pub fn new(buys5m: u64, sells5m: u64) -> Self {
        let ratio = if sells5m == 0 {
            buys5m as f64
        } else {
            ((buys5m as f64 / sells5m as f64) * 100.0).round() / 100.0
        };
        Self { buys5m, sells5m, ratio }
    }
}

// ============================================================================
// SECURITY FORENSICS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityForensics {
    /// 0-100, higher is safer
    pub score: u32,
    pub is_honeypot: bool,
    pub mint_auth_disabled: bool,
    pub freeze_auth_disabled: bool,
    pub deployer: Deployer,
    pub snipers: Snipers,
    pub insiders: Insiders,
    pub bundles: Bundles,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployer {
    pub address: String,
    pub holding_pct: f64,
    pub is_selling: bool,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snipers {
    pub count: u32,
    pub total_supply_sniped: f64,
    pub status: SniperRisk,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insiders {
    pub count: u32,
    pub holding_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundles {
    pub is_bundled: bool,
    pub bundle_supply_pct: f64,
}

// ============================================================================
// DISTRIBUTION, SOCIAL, USER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub buckets: HolderBuckets,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderBuckets {
    pub whales_over1pct: u32,
    pub fish_under01pct: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialSignals {
    pub smart_money_count: u32,
    pub whale_count: u32,
    pub fresh_wallet_count: u32,
    pub tweet_sentiment: TweetSentiment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TweetSentiment {
    pub mention_count: u32,
    pub influencer_mentions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserExecution {
    /// Quick-buy preset amounts in SOL
    pub quick_buy_defaults: Vec<f64>,
    pub user_holding: UserHolding,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserHolding {
    pub is_held: bool,
    pub balance: f64,
    pub pnl_usd: f64,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Minimal well-formed token for tests.
    pub fn token(id: &str, stage: TokenStage, market_cap: f64) -> Token {
        let migrated = stage == TokenStage::Migrated;
        Token {
            id: id.to_string(),
            timestamp: 1_700_000_000_000,
            sequence_id: 0,
            flash_state: FlashState::None,
            token_identity: TokenIdentity {
                symbol: id.to_uppercase(),
                name: format!("{} token", id),
                icon_url: String::new(),
                icon_shape: if migrated { IconShape::Circle } else { IconShape::Square },
                platform_badge: if migrated { PlatformBadge::Raydium } else { PlatformBadge::PumpFun },
                socials: Socials::default(),
            },
            lifecycle: Lifecycle {
                stage,
                created_at_ts: 1_700_000_000_000,
                age_human_readable: "0m".to_string(),
                bonding_curve: BondingCurve {
                    is_active: !migrated,
                    progress_percent: if migrated { 1.0 } else { 0.5 },
                    sol_reserves: if migrated { 85.0 } else { 42.5 },
                    migration_threshold: 85.0,
                    time_to_fill_est: 150,
                },
            },
            market_data: MarketData {
                price_usd: 0.0005,
                price_sol: 0.000003,
                market_cap,
                liquidity_usd: market_cap * 0.2,
                volume: Volume { v5m: 1_000.0, v1h: 5_000.0, direction: VolumeDirection::Neutral },
                transactions: Transactions::new(20, 10),
                sparkline: vec![0.0001; 12],
            },
            security_forensics: SecurityForensics {
                score: 75,
                is_honeypot: false,
                mint_auth_disabled: true,
                freeze_auth_disabled: true,
                deployer: Deployer {
                    address: "DeployerAddr1111".to_string(),
                    holding_pct: 0.02,
                    is_selling: false,
                    tags: vec![],
                },
                snipers: Snipers { count: 1, total_supply_sniped: 0.01, status: SniperRisk::LowRisk },
                insiders: Insiders { count: 0, holding_pct: 0.0 },
                bundles: Bundles { is_bundled: false, bundle_supply_pct: 0.0 },
            },
            distribution: Distribution {
                buckets: HolderBuckets { whales_over1pct: 2, fish_under01pct: 150 },
            },
            social_signals: SocialSignals {
                smart_money_count: 0,
                whale_count: 1,
                fresh_wallet_count: 4,
                tweet_sentiment: TweetSentiment { mention_count: 3, influencer_mentions: vec![] },
            },
            user_execution: UserExecution {
                quick_buy_defaults: vec![0.5, 1.0, 5.0],
                user_holding: UserHolding::default(),
            },
        }
    }
}
