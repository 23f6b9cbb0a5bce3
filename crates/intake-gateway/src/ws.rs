//! WebSocket endpoint for live status updates.
//!
//! Clients authenticate with `?access_token=<jwt>` in the upgrade request —
//! browsers cannot set headers on WebSocket connects — and then receive:
//!
//! ← `{"type":"connected","username":"..."}`
//! ← `{"type":"status_update","application":{...}}`  on every change
//!
//! → `{"type":"ping"}` is answered with `{"type":"pong"}`.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    #[serde(default)]
    pub access_token: String,
}

/// WebSocket upgrade handler — token checked before the upgrade completes.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let claims = match crate::auth::validate_token(&params.access_token, &state.jwt_secret) {
        Ok(claims) => claims,
        Err(_) => {
            return (
                StatusCode::UNAUTHORIZED,
                axum::Json(serde_json::json!({"ok": false, "error": "Invalid or missing access_token"})),
            )
                .into_response();
        }
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, claims.name))
}

/// Pump hub events to the client and answer pings until either side closes.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, username: String) {
    tracing::info!("WebSocket client connected ({username})");
    let mut events = state.hub.subscribe();
    let (mut sender, mut receiver) = socket.split();

    let welcome = serde_json::json!({
        "type": "connected",
        "username": username,
        "version": env!("CARGO_PKG_VERSION"),
    });
    if sender.send(Message::Text(welcome.to_string().into())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let payload = serde_json::json!({
                            "type": "status_update",
                            "application": event.application,
                        });
                        if sender.send(Message::Text(payload.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                    // Slow client skipped events — keep streaming from here
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("WebSocket client ({username}) lagged, skipped {skipped} event(s)");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let json: serde_json::Value =
                            serde_json::from_str(&text).unwrap_or_default();
                        if json["type"] == "ping" {
                            let pong = serde_json::json!({"type": "pong"});
                            if sender.send(Message::Text(pong.to_string().into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!("WebSocket receive error ({username}): {e}");
                        break;
                    }
                }
            }
        }
    }

    tracing::info!("WebSocket client disconnected ({username})");
}
