//! Snapshot storage over the relay's REST endpoint.
//!
//! `PUT /api/rooms/{room}/snapshot` stores a PNG body; `GET` returns it, or
//! 404 when the room has never been saved.

#[cfg(test)]
#[path = "http_test.rs"]
mod http_test;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use super::{NetError, snapshot_url};
use crate::storage::{RoomStorage, StorageError};

#[derive(Debug, Clone)]
pub struct HttpStorage {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStorage {
    /// # Errors
    ///
    /// [`NetError::InvalidBaseUrl`] unless `base_url` is `http(s)://`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, NetError> {
        let base_url = base_url.into();
        snapshot_url(&base_url, "lobby")?;
        Ok(Self { client: reqwest::Client::new(), base_url })
    }

    fn url(&self, room: &str) -> Result<reqwest::Url, StorageError> {
        snapshot_url(&self.base_url, room).map_err(|e| StorageError::Request(e.to_string()))
    }
}

fn request_error(e: reqwest::Error) -> StorageError {
    StorageError::Request(e.to_string())
}

#[async_trait]
impl RoomStorage for HttpStorage {
    async fn save(&self, room: &str, snapshot: Vec<u8>) -> Result<(), StorageError> {
        let size = snapshot.len();
        let response = self
            .client
            .put(self.url(room)?)
            .header(CONTENT_TYPE, "image/png")
            .body(snapshot)
            .send()
            .await
            .map_err(request_error)?;
        match response.status() {
            status if status.is_success() => {
                debug!(%room, size, "snapshot uploaded");
                Ok(())
            }
            StatusCode::PAYLOAD_TOO_LARGE => Err(StorageError::TooLarge(size)),
            status => Err(StorageError::Status(status.as_u16())),
        }
    }

    async fn load(&self, room: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let response = self.client.get(self.url(room)?).send().await.map_err(request_error)?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let bytes = response.bytes().await.map_err(request_error)?;
                Ok(Some(bytes.to_vec()))
            }
            status => Err(StorageError::Status(status.as_u16())),
        }
    }
}
