//! Request handlers for all API endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::{error, info, warn};

use super::models::*;
use super::AppState;
use crate::error::PulseError;
use crate::models::{Token, TokenStage};
use crate::pulse::format::{
    age_human_readable, format_address, format_cash, format_percent, format_price,
};
use crate::pulse::{partition_by_stage, sort_tokens, SortDirection, SortKey};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

fn api_error(err: PulseError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        PulseError::TokenNotFound(_) => StatusCode::NOT_FOUND,
        PulseError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
        PulseError::FetchExhausted { .. } | PulseError::ApiError(_) => StatusCode::BAD_GATEWAY,
        PulseError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            details: None,
        }),
    )
}

fn parse_sort(sort: Option<&str>, direction: Option<&str>) -> Result<(SortKey, SortDirection), PulseError> {
    let key = sort.map(str::parse::<SortKey>).transpose()?.unwrap_or_default();
    let direction = direction.map(str::parse::<SortDirection>).transpose()?.unwrap_or_default();
    Ok((key, direction))
}

/// Stored ages go stale as time passes; recompute them for the response.
fn with_current_age(mut token: Token, now_ms: i64) -> Token {
    token.lifecycle.age_human_readable = age_human_readable(token.lifecycle.created_at_ts, now_ms);
    token
}

fn display(token: &Token) -> TokenDisplay {
    let market = &token.market_data;
    TokenDisplay {
        price: format_price(market.price_usd),
        market_cap: format!("${}", format_cash(market.market_cap)),
        liquidity: format!("${}", format_cash(market.liquidity_usd)),
        volume5m: format!("${}", format_cash(market.volume.v5m)),
        bonding_progress: format_percent(token.lifecycle.bonding_curve.progress_percent),
        deployer: format_address(&token.security_forensics.deployer.address),
        age: token.lifecycle.age_human_readable.clone(),
    }
}

// ============================================================================
// Health Check
// ============================================================================

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

// ============================================================================
// Board
// ============================================================================

pub async fn list_tokens(
    State(state): State<AppState>,
    Query(query): Query<TokenListQuery>,
) -> ApiResult<TokenListResponse> {
    let (sort, direction) =
        parse_sort(query.sort.as_deref(), query.direction.as_deref()).map_err(api_error)?;
    let stage = query
        .stage
        .as_deref()
        .map(str::parse::<TokenStage>)
        .transpose()
        .map_err(|e| api_error(PulseError::InvalidQuery(e)))?;

    let now_ms = Utc::now().timestamp_millis();
    let mut tokens = state.store.snapshot().await;
    if let Some(stage) = stage {
        tokens.retain(|t| t.stage() == stage);
    }

    let tokens: Vec<Token> = sort_tokens(&tokens, sort, direction, now_ms)
        .into_iter()
        .map(|t| with_current_age(t, now_ms))
        .collect();
    let total = tokens.len();

    Ok(Json(TokenListResponse { tokens, total, sort, direction }))
}

pub async fn get_token(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<TokenDetailResponse> {
    match state.store.get(&id).await {
        Some(token) => {
            let token = with_current_age(token, Utc::now().timestamp_millis());
            let display = display(&token);
            Ok(Json(TokenDetailResponse { token, display }))
        }
        None => {
            warn!("Token not found: {}", id);
            Err(api_error(PulseError::TokenNotFound(id)))
        }
    }
}

/// Drops a token from the board. A later fetch may bring it back.
pub async fn remove_token(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<RemoveTokenResponse> {
    match state.store.remove_token(&id).await {
        Some(_) => {
            info!("Removed token {}", id);
            Ok(Json(RemoveTokenResponse { success: true, id }))
        }
        None => Err(api_error(PulseError::TokenNotFound(id))),
    }
}

/// All three columns, each sorted the same way.
pub async fn get_pulse(
    State(state): State<AppState>,
    Query(query): Query<PulseQuery>,
) -> ApiResult<PulseResponse> {
    let (sort, direction) =
        parse_sort(query.sort.as_deref(), query.direction.as_deref()).map_err(api_error)?;

    let now = Utc::now();
    let now_ms = now.timestamp_millis();
    let tokens: Vec<Token> = state
        .store
        .snapshot()
        .await
        .into_iter()
        .map(|t| with_current_age(t, now_ms))
        .collect();

    let columns = partition_by_stage(&tokens).sorted(sort, direction, now_ms);
    let total = columns.len();

    Ok(Json(PulseResponse {
        columns,
        total,
        sort,
        direction,
        generated_at: now,
    }))
}

// ============================================================================
// Feed control
// ============================================================================

pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let columns = partition_by_stage(&state.store.snapshot().await);

    Json(StatusResponse {
        source: state.poller.source_name().to_string(),
        fetch: state.poller.status().await,
        stale: state.poller.is_stale().await,
        polling: state.poller.is_running().await,
        simulator_running: state.simulator.is_running().await,
        pending_flash_clears: state.simulator.flash_scheduler().pending(),
        total: columns.len(),
        counts: StageCounts {
            new_pairs: columns.new_pairs.len(),
            final_stretch: columns.final_stretch.len(),
            migrated: columns.migrated.len(),
        },
    })
}

/// Manual retry. Wakes the poller when it runs, otherwise fetches inline.
pub async fn refetch(State(state): State<AppState>) -> ApiResult<RefetchResponse> {
    if state.poller.is_running().await {
        state.poller.refetch();
        info!("Manual refetch requested");
        return Ok(Json(RefetchResponse {
            success: true,
            message: "Refetch requested".to_string(),
            count: None,
        }));
    }

    match state.poller.fetch_once().await {
        Ok(count) => Ok(Json(RefetchResponse {
            success: true,
            message: format!("Fetched {} tokens", count),
            count: Some(count),
        })),
        Err(e) => {
            error!("Manual refetch failed: {}", e);
            Err(api_error(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::server::create_app;
    use super::super::test_support;
    use crate::models::token::fixtures::token;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;

    async fn call(state: AppState, method: Method, uri: &str) -> (StatusCode, Value) {
        let response = create_app(state)
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn seeded() -> AppState {
        let state = test_support::state();
        state
            .store
            .upsert_tokens(vec![
                token("A", TokenStage::NewPairs, 1000.0),
                token("B", TokenStage::NewPairs, 5000.0),
                token("F", TokenStage::FinalStretch, 3000.0),
                token("C", TokenStage::NewPairs, 2000.0),
                token("M", TokenStage::Migrated, 9000.0),
            ])
            .await;
        state
    }

    fn ids(list: &Value) -> Vec<String> {
        list.as_array()
            .unwrap()
            .iter()
            .map(|t| t["id"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(test_support::state(), Method::GET, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_list_filters_and_sorts() {
        let (status, body) = call(
            seeded().await,
            Method::GET,
            "/api/tokens?stage=NEW_PAIRS&sort=marketCap&direction=desc",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(ids(&body["tokens"]), vec!["B", "C", "A"]);
        assert_eq!(body["total"], 3);
        assert_eq!(body["sort"], "marketCap");
        assert_eq!(body["direction"], "desc");
    }

    #[tokio::test]
    async fn test_list_rejects_bad_params() {
        let (status, _) = call(seeded().await, Method::GET, "/api/tokens?sort=price").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(seeded().await, Method::GET, "/api/tokens?stage=graduated").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_token_detail_recomputes_age() {
        let (status, body) = call(seeded().await, Method::GET, "/api/tokens/A").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "A");
        // Fixture was created in 2023, stored as "0m"
        assert_ne!(body["lifecycle"]["ageHumanReadable"], "0m");
        assert_eq!(body["display"]["marketCap"], "$1K");
        assert_eq!(body["display"]["price"], "$0.000500");
        assert_eq!(body["display"]["bondingProgress"], "50.0%");
        assert_eq!(body["display"]["deployer"], "Depl...1111");
        assert_eq!(body["display"]["age"], body["lifecycle"]["ageHumanReadable"]);

        let (status, body) = call(seeded().await, Method::GET, "/api/tokens/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("nope"));
    }

    #[tokio::test]
    async fn test_remove_token() {
        let state = seeded().await;
        let (status, body) = call(state.clone(), Method::DELETE, "/api/tokens/B").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "B");
        assert!(state.store.get("B").await.is_none());

        let (status, _) = call(state, Method::DELETE, "/api/tokens/B").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_pulse_columns() {
        let (status, body) = call(seeded().await, Method::GET, "/api/pulse?sort=marketCap").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ids(&body["newPairs"]), vec!["A", "C", "B"]);
        assert_eq!(ids(&body["finalStretch"]), vec!["F"]);
        assert_eq!(ids(&body["migrated"]), vec!["M"]);
        assert_eq!(body["total"], 5);
        assert_eq!(body["direction"], "asc");
    }

    #[tokio::test]
    async fn test_status_counts() {
        let (status, body) = call(seeded().await, Method::GET, "/api/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "mock");
        assert_eq!(body["fetch"]["state"], "idle");
        assert_eq!(body["stale"], true);
        assert_eq!(body["polling"], false);
        assert_eq!(body["pendingFlashClears"], 0);
        assert_eq!(body["counts"]["newPairs"], 3);
        assert_eq!(body["counts"]["finalStretch"], 1);
        assert_eq!(body["counts"]["migrated"], 1);
        assert_eq!(body["total"], 5);
    }

    #[tokio::test]
    async fn test_refetch_runs_inline_when_not_polling() {
        let state = test_support::state();
        let (status, body) = call(state.clone(), Method::POST, "/api/refetch").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["count"], 19);
        assert_eq!(state.store.len().await, 19);

        let (_, status_body) = call(state, Method::GET, "/api/status").await;
        assert_eq!(status_body["fetch"]["state"], "ready");
        assert_eq!(status_body["stale"], false);
    }
}
