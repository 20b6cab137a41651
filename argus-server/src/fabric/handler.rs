use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::AppState;
use crate::auth::validate_token;
use crate::fabric::connection::{OBSERVER_BUFFER, Observer};
use argus_contracts::frames::Intent;

#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    #[serde(default)]
    token: Option<String>,
}

/// Handle WebSocket upgrade request. Observers are dashboard clients, so
/// the upgrade carries a bearer token in the header or, for browser
/// clients, a `token` query parameter.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<WsAuthQuery>,
) -> Response {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
        .or(query.token);
    let authenticated = token
        .map(|token| validate_token(&token, &state.config.jwt_secret).is_ok())
        .unwrap_or(false);
    if !authenticated {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an individual observer connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel(OBSERVER_BUFFER);

    let observer = Arc::new(Observer::new(tx));
    let observer_id = observer.id;
    state.fabric.add_observer(observer);

    // Drain queued frames into the socket.
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let Ok(payload) = serde_json::to_string(&frame) else {
                continue;
            };
            if ws_sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    // Inbound messages are subscription intents; anything else is ignored.
    while let Some(message) = ws_receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if let Some(intent) = Intent::parse(text.as_str()) {
                    state.fabric.join_room(intent.room(), observer_id);
                }
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::debug!(%observer_id, "observer socket error: {e}");
                break;
            }
            _ => {}
        }
    }

    // Clean up on disconnect; subscriptions are not replayed.
    state.fabric.remove_observer(observer_id);
    writer.abort();
}
