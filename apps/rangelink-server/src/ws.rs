use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use serde_json::Value;
use tracing::{debug, info, warn};

use rangelink_core::TransportSource;

use crate::http::AppState;

/// Game-client channel: one UTF-8 JSON text frame per message.
pub async fn game_channel(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_game_socket(socket, state))
}

async fn handle_game_socket(mut socket: WebSocket, state: AppState) {
    let (peer_id, mut outbound) = state.relay.hub().add_peer();
    state.relay.game_slot().set(peer_id, peer_id);
    info!(peer = peer_id, "game client connected");

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(text) = frame else { break };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<Value>(&text) {
                        Ok(message) => {
                            debug!(peer = peer_id, "message from game client");
                            state.relay.dispatch(TransportSource::Game, message);
                        }
                        // Malformed input is dropped, never fatal.
                        Err(err) => warn!(peer = peer_id, %err, "invalid JSON from game client"),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(peer = peer_id, %err, "game channel read error");
                        break;
                    }
                }
            }
        }
    }

    state.relay.hub().remove_peer(peer_id);
    state.relay.game_slot().clear_if(peer_id);
    info!(peer = peer_id, "game client disconnected");
}

/// Development bridge emulating the GATT characteristic pair over a
/// local socket: each inbound frame is one write-characteristic write,
/// and notify values stream back as binary frames. Connecting
/// subscribes the central; disconnecting runs the unsubscribe and
/// advertising-restart policy.
pub async fn gatt_bridge(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_gatt_socket(socket, state))
}

async fn handle_gatt_socket(mut socket: WebSocket, state: AppState) {
    state.lifecycle.peer_connected();
    let (subscriber_id, mut notifications) = state
        .peripheral
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .central_subscribe();
    info!(subscriber = subscriber_id, "mobile central connected");

    loop {
        tokio::select! {
            value = notifications.recv() => {
                let Some(value) = value else { break };
                if socket.send(Message::Binary(value)).await.is_err() {
                    break;
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Binary(bytes))) => {
                        state
                            .peripheral
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .central_write(&bytes);
                    }
                    Some(Ok(Message::Text(text))) => {
                        state
                            .peripheral
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .central_write(text.as_bytes());
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(subscriber = subscriber_id, %err, "gatt bridge read error");
                        break;
                    }
                }
            }
        }
    }

    state
        .peripheral
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .central_unsubscribe(subscriber_id);
    state.lifecycle.peer_disconnected();
    info!(subscriber = subscriber_id, "mobile central disconnected");
}
