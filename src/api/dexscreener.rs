//! DexScreener client
//!
//! Pulls recent Solana pairs from the public search endpoint and maps each
//! pair onto a board `Token`. DexScreener knows nothing about forensics,
//! social signals or the viewer's holdings, so those start zeroed.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use super::TokenSource;
use crate::error::PulseError;
use crate::models::token::*;
use crate::pulse::format::age_human_readable;

pub const DEXSCREENER_BASE_URL: &str = "https://api.dexscreener.com";

/// Threshold DexScreener pairs are assumed to migrate at (SOL)
const DEFAULT_MIGRATION_THRESHOLD: f64 = 85.0;

/// Progress assumed for a pair still on its launch venue
const UNMIGRATED_PROGRESS: f64 = 0.25;

// ============================================================================
// Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub pairs: Option<Vec<DexPair>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DexPair {
    pub pair_address: String,
    #[serde(default)]
    pub dex_id: Option<String>,
    #[serde(default)]
    pub price_usd: Option<String>,
    #[serde(default)]
    pub price_native: Option<String>, // Quote-denominated, SOL for SOL pairs
    #[serde(default)]
    pub fdv: Option<f64>,
    #[serde(default)]
    pub liquidity: Option<DexLiquidity>,
    #[serde(default)]
    pub volume: Option<DexVolume>,
    #[serde(default)]
    pub txns: Option<DexTxns>,
    #[serde(default)]
    pub pair_created_at: Option<i64>, // ms since epoch
    #[serde(default)]
    pub base_token: Option<DexBaseToken>,
    #[serde(default)]
    pub info: Option<DexInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexLiquidity {
    #[serde(default)]
    pub usd: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexVolume {
    #[serde(default)]
    pub m5: Option<f64>,
    #[serde(default)]
    pub h1: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexTxns {
    #[serde(default)]
    pub m5: Option<DexTxnCounts>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexTxnCounts {
    #[serde(default)]
    pub buys: u64,
    #[serde(default)]
    pub sells: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexBaseToken {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DexInfo {
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub websites: Vec<DexLink>,
    #[serde(default)]
    pub socials: Vec<DexSocial>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexLink {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexSocial {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

// ============================================================================
// Mapping
// ============================================================================

fn infer_stage(pair: &DexPair) -> TokenStage {
    match pair.dex_id.as_deref() {
        Some("raydium") => TokenStage::Migrated,
        _ => TokenStage::NewPairs,
    }
}

fn parse_num(raw: &Option<String>) -> f64 {
    raw.as_deref().and_then(|s| s.parse::<f64>().ok()).unwrap_or(0.0)
}

fn socials_from(info: Option<&DexInfo>) -> Socials {
    let Some(info) = info else {
        return Socials::default();
    };
    let social = |kind: &str| {
        info.socials
            .iter()
            .find(|s| s.kind.eq_ignore_ascii_case(kind))
            .map(|s| s.url.clone())
    };
    Socials {
        twitter: social("twitter"),
        website: info.websites.first().map(|w| w.url.clone()),
        telegram: social("telegram"),
    }
}

/// Maps one DexScreener pair to a board token. `index` becomes the sequence id.
pub fn map_pair_to_token(pair: &DexPair, index: usize, now_ms: i64) -> Token {
    let stage = infer_stage(pair);
    let migrated = stage == TokenStage::Migrated;

    let (buys5m, sells5m) = pair
        .txns
        .as_ref()
        .and_then(|t| t.m5.as_ref())
        .map(|c| (c.buys, c.sells))
        .unwrap_or((0, 0));

    let created_at_ts = pair.pair_created_at.unwrap_or(now_ms);
    let age = match pair.pair_created_at {
        Some(ts) => age_human_readable(ts, now_ms),
        None => "-".to_string(),
    };

    let base = pair.base_token.as_ref();

    Token {
        id: pair.pair_address.clone(),
        timestamp: now_ms,
        sequence_id: index as u64,
        flash_state: FlashState::None,
        token_identity: TokenIdentity {
            symbol: base.and_then(|b| b.symbol.clone()).unwrap_or_else(|| "-".to_string()),
            name: base.and_then(|b| b.name.clone()).unwrap_or_else(|| "Unknown".to_string()),
            icon_url: pair.info.as_ref().and_then(|i| i.image_url.clone()).unwrap_or_default(),
            icon_shape: if migrated { IconShape::Circle } else { IconShape::Square },
            platform_badge: if migrated { PlatformBadge::Raydium } else { PlatformBadge::PumpFun },
            socials: socials_from(pair.info.as_ref()),
        },
        lifecycle: Lifecycle {
            stage,
            created_at_ts,
            age_human_readable: age,
            bonding_curve: BondingCurve {
                is_active: !migrated,
                progress_percent: if migrated { 1.0 } else { UNMIGRATED_PROGRESS },
                sol_reserves: 0.0,
                migration_threshold: DEFAULT_MIGRATION_THRESHOLD,
                time_to_fill_est: 0,
            },
        },
        market_data: MarketData {
            price_usd: parse_num(&pair.price_usd),
            price_sol: parse_num(&pair.price_native),
            market_cap: pair.fdv.unwrap_or(0.0),
            liquidity_usd: pair.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0),
            volume: Volume {
                v5m: pair.volume.as_ref().and_then(|v| v.m5).unwrap_or(0.0),
                v1h: pair.volume.as_ref().and_then(|v| v.h1).unwrap_or(0.0),
                direction: Volume::direction_for(buys5m, sells5m),
            },
            transactions: Transactions::new(buys5m, sells5m),
            sparkline: Vec::new(),
        },
        security_forensics: SecurityForensics {
            score: 0,
            is_honeypot: false,
            mint_auth_disabled: true,
            freeze_auth_disabled: true,
            deployer: Deployer {
                address: String::new(),
                holding_pct: 0.0,
                is_selling: false,
                tags: vec![],
            },
            snipers: Snipers { count: 0, total_supply_sniped: 0.0, status: SniperRisk::LowRisk },
            insiders: Insiders { count: 0, holding_pct: 0.0 },
            bundles: Bundles { is_bundled: false, bundle_supply_pct: 0.0 },
        },
        distribution: Distribution {
            buckets: HolderBuckets { whales_over1pct: 0, fish_under01pct: 0 },
        },
        social_signals: SocialSignals {
            smart_money_count: 0,
            whale_count: 0,
            fresh_wallet_count: 0,
            tweet_sentiment: TweetSentiment { mention_count: 0, influencer_mentions: vec![] },
        },
        user_execution: UserExecution {
            quick_buy_defaults: vec![0.5, 1.0, 5.0],
            user_holding: UserHolding::default(),
        },
    }
}

// ============================================================================
// DexScreener Client
// ============================================================================

#[derive(Debug, Clone)]
pub struct DexScreenerClient {
    base_url: String,
    max_pairs: usize,
    client: Client,
}

impl DexScreenerClient {
    pub fn new(base_url: &str, max_pairs: usize) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            max_pairs,
            client: Client::builder()
                .timeout(Duration::from_secs(20))
                .build()
                .context("Failed to create HTTP client for DexScreener")?,
        })
    }

    /// Raw pair search. Non-2xx responses are errors so the caller can retry.
    pub async fn search_pairs(&self, query: &str) -> Result<Vec<DexPair>> {
        let url = format!("{}/latest/dex/search", self.base_url);
        debug!("Searching DexScreener pairs: {} q={}", url, query);

        let response = self.client
            .get(&url)
            .header("Accept", "application/json")
            .query(&[("q", query)])
            .send()
            .await
            .context("Failed to send request to DexScreener search")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PulseError::ApiError(format!(
                "DexScreener search error: {} - {}",
                status, error_text
            ))
            .into());
        }

        let data: SearchResponse = response
            .json()
            .await
            .context("Failed to parse DexScreener search response")?;

        Ok(data.pairs.unwrap_or_default())
    }
}

#[async_trait]
impl TokenSource for DexScreenerClient {
    fn name(&self) -> &str {
        "dexscreener"
    }

    async fn fetch_tokens(&self) -> Result<Vec<Token>> {
        let pairs = self.search_pairs("solana").await?;
        let now_ms = Utc::now().timestamp_millis();

        let tokens: Vec<Token> = pairs
            .iter()
            .take(self.max_pairs)
            .enumerate()
            .map(|(index, pair)| map_pair_to_token(pair, index, now_ms))
            .collect();

        info!("📡 DexScreener: mapped {} of {} pairs", tokens.len(), pairs.len());
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const SEARCH_BODY: &str = r#"{
        "schemaVersion": "1.0.0",
        "pairs": [
            {
                "chainId": "solana",
                "dexId": "raydium",
                "pairAddress": "PairRaydium111",
                "baseToken": { "address": "Mint1", "name": "Dogwifhat", "symbol": "WIF" },
                "priceNative": "0.0123",
                "priceUsd": "2.15",
                "txns": { "m5": { "buys": 130, "sells": 100 } },
                "volume": { "m5": 5000.5, "h1": 60000 },
                "liquidity": { "usd": 250000 },
                "fdv": 2150000000,
                "pairCreatedAt": 1700000000000,
                "info": {
                    "imageUrl": "https://img.example/wif.png",
                    "websites": [{ "label": "Website", "url": "https://wif.example" }],
                    "socials": [
                        { "type": "twitter", "url": "https://x.com/wif" },
                        { "type": "telegram", "url": "https://t.me/wif" }
                    ]
                }
            },
            {
                "chainId": "solana",
                "dexId": "pumpfun",
                "pairAddress": "PairPump222",
                "txns": { "m5": { "buys": 3, "sells": 0 } }
            },
            {
                "chainId": "solana",
                "dexId": "orca",
                "pairAddress": "PairOrca333"
            }
        ]
    }"#;

    #[test]
    fn test_map_migrated_pair() {
        let data: SearchResponse = serde_json::from_str(SEARCH_BODY).unwrap();
        let pairs = data.pairs.unwrap();
        let now = 1_700_000_000_000 + 90 * 60_000;

        let t = map_pair_to_token(&pairs[0], 0, now);
        assert_eq!(t.id, "PairRaydium111");
        assert_eq!(t.lifecycle.stage, TokenStage::Migrated);
        assert!(!t.lifecycle.bonding_curve.is_active);
        assert_eq!(t.lifecycle.bonding_curve.progress_percent, 1.0);
        assert_eq!(t.lifecycle.age_human_readable, "1h");
        assert_eq!(t.token_identity.symbol, "WIF");
        assert_eq!(t.token_identity.platform_badge, PlatformBadge::Raydium);
        assert_eq!(t.token_identity.socials.twitter.as_deref(), Some("https://x.com/wif"));
        assert_eq!(t.token_identity.socials.website.as_deref(), Some("https://wif.example"));
        assert_eq!(t.market_data.price_usd, 2.15);
        assert_eq!(t.market_data.price_sol, 0.0123);
        assert_eq!(t.market_data.market_cap, 2_150_000_000.0);
        assert_eq!(t.market_data.liquidity_usd, 250_000.0);
        assert_eq!(t.market_data.volume.direction, VolumeDirection::BuyHeavy);
        assert_eq!(t.market_data.transactions.ratio, 1.3);
    }

    #[test]
    fn test_map_sparse_pair_defaults() {
        let data: SearchResponse = serde_json::from_str(SEARCH_BODY).unwrap();
        let pairs = data.pairs.unwrap();
        let now = 1_700_000_000_000;

        let t = map_pair_to_token(&pairs[1], 1, now);
        assert_eq!(t.lifecycle.stage, TokenStage::NewPairs);
        assert!(t.lifecycle.bonding_curve.is_active);
        assert_eq!(t.lifecycle.bonding_curve.progress_percent, 0.25);
        assert_eq!(t.lifecycle.created_at_ts, now);
        assert_eq!(t.lifecycle.age_human_readable, "-");
        assert_eq!(t.token_identity.name, "Unknown");
        assert_eq!(t.market_data.transactions.ratio, 3.0);
        assert_eq!(t.market_data.market_cap, 0.0);
        assert!(t.market_data.sparkline.is_empty());
        assert_eq!(t.sequence_id, 1);
    }

    #[tokio::test]
    async fn test_fetch_tokens_limits_pairs() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/latest/dex/search")
            .match_query(Matcher::UrlEncoded("q".into(), "solana".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(SEARCH_BODY)
            .create_async()
            .await;

        let client = DexScreenerClient::new(&server.url(), 2).unwrap();
        let tokens = client.fetch_tokens().await.unwrap();

        mock.assert_async().await;
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].id, "PairRaydium111");
        assert_eq!(tokens[1].id, "PairPump222");
    }

    #[tokio::test]
    async fn test_fetch_tokens_surfaces_http_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/latest/dex/search")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;

        let client = DexScreenerClient::new(&server.url(), 20).unwrap();
        let err = client.fetch_tokens().await.unwrap_err();
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn test_missing_pairs_is_empty() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/latest/dex/search")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"schemaVersion":"1.0.0","pairs":null}"#)
            .create_async()
            .await;

        let client = DexScreenerClient::new(&server.url(), 20).unwrap();
        assert!(client.fetch_tokens().await.unwrap().is_empty());
    }
}
