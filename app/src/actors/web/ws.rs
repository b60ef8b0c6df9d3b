//! Relay WebSocket.
//!
//! Every text message in either direction is one `Frame`
//! (`{"event": ..., "data": ...}`). A client first sends `joinRoom` with the
//! room id and gets `roomJoined` or `roomError` back; after that any
//! allow-listed event it sends is relayed to the rest of its room.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};

use super::{WebState, emit_telemetry};
use crate::state::relay::{RelayError, SocketId};
use puttlink::{AlertLevel, AlertMessage, Frame, JOIN_ROOM, PuttlinkMessage, RoomActivityKind};

/// GET /ws
pub async fn ws_upgrade(
    State(state): State<Arc<WebState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(socket: WebSocket, state: Arc<WebState>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (socket_id, mut frames) = state.root.relay.connect();

    state.ws_count.fetch_add(1, Ordering::Relaxed);
    emit_telemetry(&state);
    tracing::info!("ws: socket {socket_id} connected");

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            let Ok(json) = serde_json::to_string(&frame) else {
                continue;
            };
            if ws_tx.send(Message::text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_state = Arc::clone(&state);
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                Message::Text(text) => handle_frame(&recv_state, socket_id, &text),
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    if let Some((room_id, connected)) = state.root.relay.disconnect(socket_id) {
        tracing::info!("ws: socket {socket_id} left room {room_id} ({connected} connected)");
        state.room_activity(&room_id, RoomActivityKind::Left, connected);
    }
    state.ws_count.fetch_sub(1, Ordering::Relaxed);
    emit_telemetry(&state);
    tracing::info!("ws: socket {socket_id} disconnected");
}

/// Route one inbound text message. Failures are isolated to this socket.
fn handle_frame(state: &WebState, socket: SocketId, text: &str) {
    let frame: Frame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!("ws: socket {socket}: unparseable message: {e}");
            return;
        }
    };

    let relay = &state.root.relay;
    if frame.event == JOIN_ROOM {
        let room_id = frame.join_target().unwrap_or_default();
        let previous = relay.room_of(socket);
        match relay.join_room(socket, room_id) {
            Ok(connected) => {
                tracing::info!("ws: socket {socket} joined room {room_id} ({connected} connected)");
                if let Some(prev) = previous.filter(|p| p != room_id) {
                    let left = relay.connected_count(&prev).unwrap_or(0);
                    state.room_activity(&prev, RoomActivityKind::Left, left);
                }
                state.room_activity(room_id, RoomActivityKind::Joined, connected);
            }
            Err(e) => {
                tracing::info!("ws: socket {socket}: {e}");
                state.room_activity(room_id, RoomActivityKind::Rejected, 0);
            }
        }
        return;
    }

    match relay.relay(socket, &frame.event, frame.data) {
        Ok(delivered) => {
            state.relayed_count.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("ws: socket {socket}: '{}' -> {delivered}", frame.event);
        }
        Err(RelayError::InvalidPayload(e)) => {
            state.dropped_count.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("ws: socket {socket}: dropped '{}': {e}", frame.event);
            let _ = state.bus_tx.send(
                PuttlinkMessage::new(AlertMessage {
                    level: AlertLevel::Warn,
                    message: format!("dropped invalid '{}' payload: {e}", frame.event),
                })
                .source(&state.actor_id),
            );
        }
        Err(e) => {
            state.dropped_count.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("ws: socket {socket}: dropped '{}': {e}", frame.event);
        }
    }
}
