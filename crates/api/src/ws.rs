//! `/api/stream`: every desk event as a tagged JSON text frame.

use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use po3_core::{AccountUpdate, TradingEvent};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

pub async fn stream(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let events = state.events.subscribe();
    // Current accounts first, so a fresh client does not start blank.
    let snapshot: Vec<TradingEvent> = state
        .service
        .accounts()
        .into_iter()
        .map(|account| {
            TradingEvent::AccountUpdate(AccountUpdate {
                account_id: account.id.clone(),
                account,
            })
        })
        .collect();
    ws.on_upgrade(move |socket| forward_events(socket, snapshot, events))
}

async fn send(socket: &mut WebSocket, event: &TradingEvent) -> bool {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!(event = event.name(), "Failed to encode event: {}", e);
            return true;
        }
    };
    socket.send(Message::Text(text.into())).await.is_ok()
}

async fn forward_events(
    mut socket: WebSocket,
    snapshot: Vec<TradingEvent>,
    mut events: broadcast::Receiver<TradingEvent>,
) {
    for event in &snapshot {
        if !send(&mut socket, event).await {
            return;
        }
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if !send(&mut socket, &event).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Stream client lagging, events dropped");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    debug!("Stream client disconnected");
}
