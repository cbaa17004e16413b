//! Derived views over the token collection: the three lifecycle columns and
//! the sorted order inside a column. Pure functions; inputs are never mutated.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

use crate::error::PulseError;
use crate::models::{Token, TokenStage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    Age,
    MarketCap,
    Liquidity,
    Volume,
    Score,
}

impl FromStr for SortKey {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "age" => Ok(Self::Age),
            "marketCap" | "market_cap" => Ok(Self::MarketCap),
            "liquidity" => Ok(Self::Liquidity),
            "volume" => Ok(Self::Volume),
            "score" => Ok(Self::Score),
            other => Err(PulseError::InvalidQuery(format!("unknown sort key '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortDirection {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(PulseError::InvalidQuery(format!("unknown sort direction '{}'", other))),
        }
    }
}

/// Comparable value behind a sort key. Age is the raw millisecond delta, so
/// ascending age puts the newest pair first.
pub fn sort_key_value(token: &Token, key: SortKey, now_ms: i64) -> f64 {
    match key {
        SortKey::Age => token.age_ms(now_ms) as f64,
        SortKey::MarketCap => token.market_data.market_cap,
        SortKey::Liquidity => token.market_data.liquidity_usd,
        SortKey::Volume => token.market_data.volume.v5m,
        SortKey::Score => token.security_forensics.score as f64,
    }
}

/// Stable sort into a new vector. Equal keys keep their input order in both
/// directions; `total_cmp` keeps the order total even with NaN in the data.
pub fn sort_tokens(tokens: &[Token], key: SortKey, direction: SortDirection, now_ms: i64) -> Vec<Token> {
    let mut keyed: Vec<(f64, &Token)> = tokens
        .iter()
        .map(|t| (sort_key_value(t, key, now_ms), t))
        .collect();

    keyed.sort_by(|(a, _), (b, _)| compare(*a, *b, direction));
    keyed.into_iter().map(|(_, t)| t.clone()).collect()
}

fn compare(a: f64, b: f64, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => a.total_cmp(&b),
        SortDirection::Desc => b.total_cmp(&a),
    }
}

/// The board's three columns, each in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StagePartition {
    pub new_pairs: Vec<Token>,
    pub final_stretch: Vec<Token>,
    pub migrated: Vec<Token>,
}

impl StagePartition {
    pub fn column(&self, stage: TokenStage) -> &[Token] {
        match stage {
            TokenStage::NewPairs => &self.new_pairs,
            TokenStage::FinalStretch => &self.final_stretch,
            TokenStage::Migrated => &self.migrated,
        }
    }

    pub fn len(&self) -> usize {
        self.new_pairs.len() + self.final_stretch.len() + self.migrated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorts every column the same way.
    pub fn sorted(&self, key: SortKey, direction: SortDirection, now_ms: i64) -> Self {
        Self {
            new_pairs: sort_tokens(&self.new_pairs, key, direction, now_ms),
            final_stretch: sort_tokens(&self.final_stretch, key, direction, now_ms),
            migrated: sort_tokens(&self.migrated, key, direction, now_ms),
        }
    }
}

pub fn partition_by_stage(tokens: &[Token]) -> StagePartition {
    let mut partition = StagePartition::default();
    for token in tokens {
        let column = match token.stage() {
            TokenStage::NewPairs => &mut partition.new_pairs,
            TokenStage::FinalStretch => &mut partition.final_stretch,
            TokenStage::Migrated => &mut partition.migrated,
        };
        column.push(token.clone());
    }
    partition
}
