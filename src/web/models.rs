//! Request and Response DTOs for the Web API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Token;
use crate::pulse::{FetchStatus, SortDirection, SortKey, StagePartition};

// ============================================================================
// Health & Status
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StageCounts {
    pub new_pairs: usize,
    pub final_stretch: usize,
    pub migrated: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub source: String,
    pub fetch: FetchStatus,
    /// Last good batch is older than the stale time, or there is none yet
    pub stale: bool,
    pub polling: bool,
    pub simulator_running: bool,
    pub pending_flash_clears: usize,
    pub total: usize,
    pub counts: StageCounts,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefetchResponse {
    pub success: bool,
    pub message: String,
    /// Set when the fetch ran inline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

// ============================================================================
// Board
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct TokenListQuery {
    pub stage: Option<String>,
    pub sort: Option<String>,
    pub direction: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PulseQuery {
    pub sort: Option<String>,
    pub direction: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenListResponse {
    pub tokens: Vec<Token>,
    pub total: usize,
    pub sort: SortKey,
    pub direction: SortDirection,
}

/// Preformatted strings for a token card.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDisplay {
    pub price: String,
    pub market_cap: String,
    pub liquidity: String,
    pub volume5m: String,
    pub bonding_progress: String,
    pub deployer: String,
    pub age: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDetailResponse {
    #[serde(flatten)]
    pub token: Token,
    pub display: TokenDisplay,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PulseResponse {
    #[serde(flatten)]
    pub columns: StagePartition,
    pub total: usize,
    pub sort: SortKey,
    pub direction: SortDirection,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct RemoveTokenResponse {
    pub success: bool,
    pub id: String,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
