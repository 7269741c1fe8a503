//! Room membership and fan-out.
//!
//! DESIGN
//! ======
//! A room is created by its first join and evicted when its last
//! participant parts. Joins and parts are announced to the rest of the room
//! (`room:join`, `room:part`) so clients can track presence; the relay
//! never stores events, it only forwards them.
//!
//! Delivery uses `try_send` on each participant's bounded queue. A slow
//! reader loses frames rather than stalling the room.

#[cfg(test)]
#[path = "room_test.rs"]
mod room_test;

use frames::{Frame, ROOM_JOIN, ROOM_PART};
use serde_json::json;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::frame::ErrorCode;
use crate::state::{AppState, Client, Role};

const MAX_ROOM_ID_LEN: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("invalid room id `{0}`")]
    InvalidRoom(String),
    #[error("room `{0}` already has a tutor")]
    TutorPresent(String),
}

impl ErrorCode for RoomError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRoom(_) => "E_ROOM_INVALID",
            Self::TutorPresent(_) => "E_TUTOR_PRESENT",
        }
    }
}

/// Room ids are 1-64 characters of ASCII letters, digits, `-` and `_`.
#[must_use]
pub fn valid_room(room: &str) -> bool {
    !room.is_empty()
        && room.len() <= MAX_ROOM_ID_LEN
        && room.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// A participant already in the room, as reported in the welcome frame.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PeerInfo {
    pub id: String,
    pub name: String,
    pub role: &'static str,
}

// =============================================================================
// MEMBERSHIP
// =============================================================================

/// Add `client` to `room_id` and return its new participant id.
///
/// # Errors
///
/// [`RoomError::InvalidRoom`] for a bad id; [`RoomError::TutorPresent`]
/// when a second tutor tries to join.
pub async fn join_room(state: &AppState, room_id: &str, client: Client) -> Result<String, RoomError> {
    if !valid_room(room_id) {
        return Err(RoomError::InvalidRoom(room_id.to_owned()));
    }
    let mut rooms = state.rooms.write().await;
    let room = rooms.entry(room_id.to_owned()).or_default();
    if client.role == Role::Tutor && room.tutor().is_some() {
        return Err(RoomError::TutorPresent(room_id.to_owned()));
    }

    let id = Uuid::new_v4().to_string();
    let announce = Frame::new(ROOM_JOIN, json!({ "id": id, "name": client.name, "role": client.role.as_str() }))
        .with_room(room_id);
    for (peer, other) in &room.clients {
        deliver(peer, other, announce.clone());
    }
    info!(room = %room_id, %id, role = %client.role, peers = room.clients.len(), "participant joined");
    room.clients.insert(id.clone(), client);
    Ok(id)
}

/// Remove a participant, announce the departure, and evict the room when
/// it becomes empty. Returns whether the participant was present.
pub async fn part_room(state: &AppState, room_id: &str, id: &str) -> bool {
    let mut rooms = state.rooms.write().await;
    let Some(room) = rooms.get_mut(room_id) else {
        return false;
    };
    let Some(client) = room.clients.remove(id) else {
        return false;
    };
    let announce = Frame::new(ROOM_PART, json!({ "id": id, "role": client.role.as_str() })).with_room(room_id);
    for (peer, other) in &room.clients {
        deliver(peer, other, announce.clone());
    }
    info!(room = %room_id, %id, remaining = room.clients.len(), "participant left");
    if room.clients.is_empty() {
        rooms.remove(room_id);
        info!(room = %room_id, "room evicted");
    }
    true
}

/// Everyone in the room except `except`.
pub async fn peers(state: &AppState, room_id: &str, except: &str) -> Vec<PeerInfo> {
    let rooms = state.rooms.read().await;
    let Some(room) = rooms.get(room_id) else {
        return Vec::new();
    };
    let mut peers: Vec<PeerInfo> = room
        .clients
        .iter()
        .filter(|(id, _)| id.as_str() != except)
        .map(|(id, c)| PeerInfo { id: id.clone(), name: c.name.clone(), role: c.role.as_str() })
        .collect();
    peers.sort_by(|a, b| a.id.cmp(&b.id));
    peers
}

// =============================================================================
// FAN-OUT
// =============================================================================

/// Send `frame` to every participant in the room except `exclude`.
/// Returns how many queues accepted it.
pub async fn broadcast(state: &AppState, room_id: &str, frame: &Frame, exclude: Option<&str>) -> usize {
    let rooms = state.rooms.read().await;
    let Some(room) = rooms.get(room_id) else {
        return 0;
    };
    room.clients
        .iter()
        .filter(|(id, _)| Some(id.as_str()) != exclude)
        .filter(|(id, client)| deliver(id, client, frame.clone()))
        .count()
}

/// Send `frame` to one participant. Returns `false` when the participant is
/// not in the room or its queue refused the frame.
pub async fn send_to(state: &AppState, room_id: &str, to: &str, frame: Frame) -> bool {
    let rooms = state.rooms.read().await;
    match rooms.get(room_id).and_then(|room| room.clients.get(to)) {
        Some(client) => deliver(to, client, frame),
        None => false,
    }
}

/// Whether `id` is currently in the room.
pub async fn contains(state: &AppState, room_id: &str, id: &str) -> bool {
    state.rooms.read().await.get(room_id).is_some_and(|room| room.clients.contains_key(id))
}

fn deliver(id: &str, client: &Client, frame: Frame) -> bool {
    match client.tx.try_send(frame) {
        Ok(()) => true,
        Err(TrySendError::Full(frame)) => {
            warn!(%id, event = %frame.event, "participant queue full; frame dropped");
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!(%id, "participant queue closed");
            false
        }
    }
}
