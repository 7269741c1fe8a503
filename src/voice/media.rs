//! Seams to the platform's media capture and peer-connection stack.

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("no device")]
    NoDevice,
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct NegotiationError(pub String);

/// One captured track, identified by the platform's track id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTrack {
    pub id: String,
}

/// Microphone access.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Ask for an audio input. Dropping the returned source must release the
    /// device; dropping the future before it resolves must not leak one.
    async fn acquire_audio(&self) -> Result<Box<dyn MediaSource>, MediaError>;
}

/// An acquired capture source.
pub trait MediaSource: Send {
    fn tracks(&self) -> Vec<MediaTrack>;

    /// Stop every track. Must be safe to call more than once.
    fn stop(&mut self);
}

/// Creates peer connections, one per remote participant.
#[async_trait]
pub trait PeerFactory: Send + Sync {
    /// A new connection to `peer_id` that sends `tracks`. Receive-only
    /// connections pass no tracks.
    async fn create(&self, peer_id: &str, tracks: &[MediaTrack]) -> Result<Box<dyn PeerConnection>, NegotiationError>;
}

/// One negotiated peer connection.
#[async_trait]
pub trait PeerConnection: Send {
    async fn create_offer(&mut self) -> Result<String, NegotiationError>;

    /// Apply a remote offer and produce the local answer.
    async fn accept_offer(&mut self, sdp: &str) -> Result<String, NegotiationError>;

    async fn accept_answer(&mut self, sdp: &str) -> Result<(), NegotiationError>;

    async fn add_ice_candidate(&mut self, candidate: &str) -> Result<(), NegotiationError>;

    /// Tear down. Must be safe to call more than once.
    fn close(&mut self);
}
