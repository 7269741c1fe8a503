//! WebSocket handler: the room relay.
//!
//! DESIGN
//! ======
//! On upgrade the participant joins its room and enters a `select!` loop:
//! - inbound binary frames are validated, stamped with the sender's id,
//!   and fanned out (or delivered to `frame.to` when addressed);
//! - frames queued by peers are written to the socket.
//!
//! The relay reads only the envelope. Payloads pass through untouched, so
//! the relay does not need to know any event's shape.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade, join room, send `session:connected` with the participant id
//! 2. Relay frames until the socket closes
//! 3. Part room (broadcasts `room:part`, evicts an empty room)

#[cfg(test)]
#[path = "ws_test.rs"]
mod ws_test;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use frames::{Frame, SESSION_CONNECTED, is_tutor_only_event};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::frame::{ErrorCode, RelayError, error_frame};
use crate::services::room;
use crate::state::{AppState, Client, Role};

const MAX_NAME_CHARS: usize = 64;

#[derive(Debug, Deserialize)]
pub struct JoinParams {
    pub room: String,
    pub role: String,
    #[serde(default)]
    pub name: Option<String>,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<JoinParams>,
    ws: WebSocketUpgrade,
) -> Response {
    if !room::valid_room(&params.room) {
        return (StatusCode::BAD_REQUEST, "invalid room id").into_response();
    }
    let Ok(role) = params.role.parse::<Role>() else {
        return (StatusCode::BAD_REQUEST, "role must be tutor or student").into_response();
    };
    let name = display_name(params.name.as_deref());
    ws.on_upgrade(move |socket| run_ws(socket, state, params.room, role, name))
}

fn display_name(raw: Option<&str>) -> String {
    let trimmed = raw.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return "anonymous".to_owned();
    }
    trimmed.chars().take(MAX_NAME_CHARS).collect()
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, room_id: String, role: Role, name: String) {
    let (tx, mut rx) = mpsc::channel::<Frame>(state.config.client_queue);
    let client = Client { name, role, tx };

    let id = match room::join_room(&state, &room_id, client).await {
        Ok(id) => id,
        Err(e) => {
            warn!(room = %room_id, %role, error = %e, "ws: join refused");
            if send_frame(&mut socket, &error_frame(&e)).await.is_ok() {
                if let Err(e) = socket.send(Message::Close(None)).await {
                    debug!(error = %e, "ws: close after refusal failed");
                }
            }
            return;
        }
    };

    let peers = room::peers(&state, &room_id, &id).await;
    let welcome = Frame::new(SESSION_CONNECTED, json!({ "id": id, "room": room_id, "role": role.as_str(), "peers": peers }))
        .with_room(&room_id);
    if send_frame(&mut socket, &welcome).await.is_ok() {
        loop {
            tokio::select! {
                msg = socket.recv() => {
                    let Some(Ok(msg)) = msg else { break };
                    match msg {
                        Message::Binary(bytes) => {
                            if let Some(reply) = process_inbound(&state, &room_id, &id, role, &bytes).await {
                                if send_frame(&mut socket, &reply).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Message::Text(_) => {
                            let reply = error_frame(&RelayError::Malformed("binary frames only".into()));
                            if send_frame(&mut socket, &reply).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => break,
                        Message::Ping(_) | Message::Pong(_) => {}
                    }
                }
                Some(frame) = rx.recv() => {
                    if send_frame(&mut socket, &frame).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    room::part_room(&state, &room_id, &id).await;
    info!(room = %room_id, %id, "ws: participant disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Validate and route one inbound frame. Returns a frame for the sender
/// only when the inbound frame was rejected.
async fn process_inbound(state: &AppState, room_id: &str, id: &str, role: Role, bytes: &[u8]) -> Option<Frame> {
    match route_inbound(state, room_id, id, role, bytes).await {
        Ok(()) => None,
        Err(e) => {
            warn!(room = %room_id, %id, code = e.error_code(), error = %e, "ws: frame rejected");
            Some(error_frame(&e))
        }
    }
}

async fn route_inbound(state: &AppState, room_id: &str, id: &str, role: Role, bytes: &[u8]) -> Result<(), RelayError> {
    let mut frame = frames::decode_frame(bytes).map_err(|e| RelayError::Malformed(e.to_string()))?;
    if frame.event.is_empty() {
        return Err(RelayError::Malformed("missing event".into()));
    }
    if frame.event.contains(':') {
        return Err(RelayError::Reserved(frame.event));
    }
    if frame.room.as_deref().is_some_and(|r| r != room_id) {
        return Err(RelayError::WrongRoom(frame.room.unwrap_or_default()));
    }
    if role == Role::Student && is_tutor_only_event(&frame.event) {
        return Err(RelayError::Forbidden(frame.event));
    }

    frame.from = Some(id.to_owned());
    frame.room = Some(room_id.to_owned());
    match frame.to.clone() {
        Some(to) => {
            if !room::contains(state, room_id, &to).await {
                return Err(RelayError::UnknownPeer(to));
            }
            let event = frame.event.clone();
            let delivered = room::send_to(state, room_id, &to, frame).await;
            debug!(room = %room_id, from = %id, %to, %event, delivered, "ws: relayed");
        }
        None => {
            let delivered = room::broadcast(state, room_id, &frame, Some(id)).await;
            debug!(room = %room_id, from = %id, event = %frame.event, delivered, "ws: relayed");
        }
    }
    Ok(())
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), axum::Error> {
    socket.send(Message::Binary(frames::encode_frame(frame).into())).await
}
