//! Room snapshot storage.
//!
//! A snapshot is the whiteboard encoded as PNG, keyed by room id. The tutor
//! saves; anyone joining loads. Storage failures are reported to the caller,
//! which logs them: a failed save never blocks drawing.

#[cfg(test)]
#[path = "storage_test.rs"]
mod storage_test;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage request failed: {0}")]
    Request(String),
    #[error("storage returned status {0}")]
    Status(u16),
    #[error("snapshot too large: {0} bytes")]
    TooLarge(usize),
}

#[async_trait]
pub trait RoomStorage: Send + Sync {
    async fn save(&self, room: &str, snapshot: Vec<u8>) -> Result<(), StorageError>;

    /// The latest snapshot, or `None` when the room has none.
    async fn load(&self, room: &str) -> Result<Option<Vec<u8>>, StorageError>;
}

/// Process-local storage. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    rooms: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }
}

#[async_trait]
impl RoomStorage for MemoryStorage {
    async fn save(&self, room: &str, snapshot: Vec<u8>) -> Result<(), StorageError> {
        self.rooms.write().await.insert(room.to_owned(), snapshot);
        Ok(())
    }

    async fn load(&self, room: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.rooms.read().await.get(room).cloned())
    }
}
