//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the live room map and the snapshot store. A room exists only while
//! at least one participant is connected; each participant has a bounded
//! outgoing frame queue drained by its socket task.

#[cfg(test)]
#[path = "state_test.rs"]
mod state_test;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use frames::Frame;
use tokio::sync::{RwLock, mpsc};

use crate::services::snapshot::SnapshotStore;

const DEFAULT_SNAPSHOT_MAX_BYTES: usize = 8 * 1024 * 1024;
const DEFAULT_CLIENT_QUEUE: usize = 256;

/// Parse `key` from the environment, falling back to `default`.
pub fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok()).unwrap_or(default)
}

// =============================================================================
// PARTICIPANTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Tutor,
    Student,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tutor => "tutor",
            Self::Student => "student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tutor" => Ok(Self::Tutor),
            "student" => Ok(Self::Student),
            _ => Err(()),
        }
    }
}

/// One connected socket.
#[derive(Debug, Clone)]
pub struct Client {
    pub name: String,
    pub role: Role,
    pub tx: mpsc::Sender<Frame>,
}

/// Live state of one room.
#[derive(Debug, Default)]
pub struct Room {
    /// Participant id -> client.
    pub clients: HashMap<String, Client>,
}

impl Room {
    #[must_use]
    pub fn tutor(&self) -> Option<&str> {
        self.clients.iter().find(|(_, c)| c.role == Role::Tutor).map(|(id, _)| id.as_str())
    }
}

// =============================================================================
// APP STATE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Largest snapshot body accepted by `PUT /api/rooms/{room}/snapshot`.
    pub snapshot_max_bytes: usize,
    /// Outgoing frames buffered per participant before drops.
    pub client_queue: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self { snapshot_max_bytes: DEFAULT_SNAPSHOT_MAX_BYTES, client_queue: DEFAULT_CLIENT_QUEUE }
    }
}

impl RelayConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            snapshot_max_bytes: env_parse("SNAPSHOT_MAX_BYTES", DEFAULT_SNAPSHOT_MAX_BYTES),
            client_queue: env_parse("CLIENT_QUEUE", DEFAULT_CLIENT_QUEUE).max(1),
        }
    }
}

/// Shared application state. Clone is required by Axum; every field is
/// `Arc`-wrapped or cheap to copy.
#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RwLock<HashMap<String, Room>>>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub config: RelayConfig,
}

impl AppState {
    #[must_use]
    pub fn new(snapshots: Arc<dyn SnapshotStore>, config: RelayConfig) -> Self {
        Self { rooms: Arc::new(RwLock::new(HashMap::new())), snapshots, config }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
