//! Room snapshot persistence.
//!
//! DESIGN
//! ======
//! A snapshot is an opaque PNG blob per room, last write wins. The tutor's
//! client uploads one periodically and on leave; joining clients download
//! it to paint the board before live events arrive.
//!
//! [`SnapshotStore`] abstracts the backend: [`PgSnapshots`] in production,
//! [`MemorySnapshots`] when no database is configured and in tests.
//!
//! ERROR HANDLING
//! ==============
//! Validation (room id, empty or oversized body) happens before the store is
//! touched. Database errors are marked retryable.

#[cfg(test)]
#[path = "snapshot_test.rs"]
mod snapshot_test;

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::info;

use super::room::valid_room;
use crate::frame::ErrorCode;
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("invalid room id `{0}`")]
    InvalidRoom(String),
    #[error("snapshot body is empty")]
    Empty,
    #[error("snapshot of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for SnapshotError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRoom(_) => "E_ROOM_INVALID",
            Self::Empty => "E_SNAPSHOT_EMPTY",
            Self::TooLarge { .. } => "E_SNAPSHOT_TOO_LARGE",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn put(&self, room: &str, png: Vec<u8>) -> Result<(), SnapshotError>;

    async fn get(&self, room: &str) -> Result<Option<Vec<u8>>, SnapshotError>;
}

// =============================================================================
// BACKENDS
// =============================================================================

/// Snapshots in the `room_snapshots` table.
#[derive(Debug, Clone)]
pub struct PgSnapshots {
    pool: PgPool,
}

impl PgSnapshots {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotStore for PgSnapshots {
    async fn put(&self, room: &str, png: Vec<u8>) -> Result<(), SnapshotError> {
        sqlx::query(
            "INSERT INTO room_snapshots (room_id, png, updated_at)
             VALUES ($1, $2, now())
             ON CONFLICT (room_id) DO UPDATE SET png = EXCLUDED.png, updated_at = now()",
        )
        .bind(room)
        .bind(png)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, room: &str) -> Result<Option<Vec<u8>>, SnapshotError> {
        let row = sqlx::query_as::<_, (Vec<u8>,)>("SELECT png FROM room_snapshots WHERE room_id = $1")
            .bind(room)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(png,)| png))
    }
}

/// Process-local snapshots. Lost on restart.
#[derive(Debug, Default)]
pub struct MemorySnapshots {
    rooms: RwLock<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl SnapshotStore for MemorySnapshots {
    async fn put(&self, room: &str, png: Vec<u8>) -> Result<(), SnapshotError> {
        self.rooms.write().await.insert(room.to_owned(), png);
        Ok(())
    }

    async fn get(&self, room: &str) -> Result<Option<Vec<u8>>, SnapshotError> {
        Ok(self.rooms.read().await.get(room).cloned())
    }
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Validate and store a room's snapshot. Returns the stored size.
///
/// # Errors
///
/// [`SnapshotError`] for a bad room id, an empty or oversized body, or a
/// backend failure.
pub async fn save(state: &AppState, room: &str, png: Vec<u8>) -> Result<usize, SnapshotError> {
    if !valid_room(room) {
        return Err(SnapshotError::InvalidRoom(room.to_owned()));
    }
    let size = png.len();
    if size == 0 {
        return Err(SnapshotError::Empty);
    }
    let max = state.config.snapshot_max_bytes;
    if size > max {
        return Err(SnapshotError::TooLarge { size, max });
    }
    state.snapshots.put(room, png).await?;
    info!(%room, size, "snapshot stored");
    Ok(size)
}

/// The room's latest snapshot, if any.
///
/// # Errors
///
/// [`SnapshotError::InvalidRoom`] or a backend failure.
pub async fn load(state: &AppState, room: &str) -> Result<Option<Vec<u8>>, SnapshotError> {
    if !valid_room(room) {
        return Err(SnapshotError::InvalidRoom(room.to_owned()));
    }
    state.snapshots.get(room).await
}
