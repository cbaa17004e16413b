//! WebSocket handler for real-time board updates

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use super::AppState;
use crate::models::FlashState;
use crate::pulse::StoreEvent;

/// WebSocket message types pushed to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    /// Tokens were inserted or replaced; clients refetch them by id
    TokensUpserted { ids: Vec<String> },

    #[serde(rename_all = "camelCase")]
    PriceUpdate {
        id: String,
        market_cap: f64,
        flash_state: FlashState,
        sparkline: Option<Vec<f64>>,
    },

    #[serde(rename_all = "camelCase")]
    BondingUpdate {
        id: String,
        progress_percent: f64,
        sol_reserves: f64,
    },

    FlashCleared { id: String },

    TokenRemoved { id: String },

    /// The client fell behind and missed `skipped` events. It should reload
    /// the board from the REST API.
    Resync { skipped: u64 },

    /// Ids on the board when the client connected, in insertion order
    Snapshot { ids: Vec<String> },

    /// Heartbeat/ping message
    Ping { timestamp: DateTime<Utc> },
}

impl From<StoreEvent> for WsMessage {
    fn from(event: StoreEvent) -> Self {
        match event {
            StoreEvent::Upserted { ids } => Self::TokensUpserted { ids },
            StoreEvent::PriceUpdated { id, market_cap, flash_state, sparkline } => {
                Self::PriceUpdate { id, market_cap, flash_state, sparkline }
            }
            StoreEvent::BondingUpdated { id, progress_percent, sol_reserves } => {
                Self::BondingUpdate { id, progress_percent, sol_reserves }
            }
            StoreEvent::FlashCleared { id } => Self::FlashCleared { id },
            StoreEvent::Removed { id } => Self::TokenRemoved { id },
        }
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.subscribe_ws();

    info!("New WebSocket client connected");

    let greeting = [
        WsMessage::Ping { timestamp: Utc::now() },
        WsMessage::Snapshot { ids: state.store.ids().await },
    ];
    for msg in &greeting {
        if let Ok(json) = serde_json::to_string(msg) {
            let _ = sender.send(Message::Text(json)).await;
        }
    }

    let mut send_task = tokio::spawn(async move {
        loop {
            let msg = match rx.recv().await {
                Ok(event) => WsMessage::from(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("WebSocket client lagged, skipped {} events", skipped);
                    WsMessage::Resync { skipped }
                }
                Err(RecvError::Closed) => break,
            };

            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize WebSocket message: {}", e);
                }
            }
        }
    });

    // Clients only listen; inbound traffic is just control frames
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => {
                    info!("WebSocket client disconnected");
                    break;
                }
                Ok(Message::Text(text)) => {
                    debug!("Ignoring WebSocket message: {}", text);
                }
                Ok(_) => {}
                Err(e) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("WebSocket connection closed");
}
