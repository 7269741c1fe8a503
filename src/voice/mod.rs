//! Voice broadcast signaling.
//!
//! DESIGN
//! ======
//! The tutor fans one microphone out to N students over N independent peer
//! connections. [`VoiceBroadcaster`] owns the acquired media source and a
//! [`PeerRegistry`] keyed by student session id; [`VoiceListener`] owns the
//! student's single receive-only connection.
//!
//! Neither object touches the network. Each operation returns the
//! [`Signal`]s to send, and the runtime routes them over the sync channel.
//! Media capture and the peer-connection machinery sit behind the traits in
//! [`media`], so a browser or native WebRTC stack plugs in underneath.
//!
//! ERROR HANDLING
//! ==============
//! Media acquisition failures are terminal for that start attempt and are
//! surfaced as distinct [`VoiceError`] variants so the UI can tell "denied"
//! from "no microphone". A negotiation failure discards only the affected
//! connection. Signals for unknown or stale peers are dropped with a debug log.

pub mod broadcaster;
pub mod listener;
pub mod media;
pub mod peer;

#[cfg(test)]
pub(crate) mod test_support;

pub use broadcaster::{BroadcastState, VoiceBroadcaster};
pub use listener::VoiceListener;
pub use media::{MediaDevices, MediaError, MediaSource, MediaTrack, NegotiationError, PeerConnection, PeerFactory};
pub use peer::{Peer, PeerRegistry, PeerState};

use frames::SyncEvent;

#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("microphone permission denied")]
    PermissionDenied,
    #[error("no microphone available")]
    NoDevice,
    #[error("media capture failed: {0}")]
    Media(String),
    #[error("broadcast is not live")]
    NotLive,
    #[error("negotiation with `{peer}` failed: {source}")]
    Negotiation {
        peer: String,
        #[source]
        source: NegotiationError,
    },
}

impl From<MediaError> for VoiceError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::PermissionDenied => Self::PermissionDenied,
            MediaError::NoDevice => Self::NoDevice,
            MediaError::Other(msg) => Self::Media(msg),
        }
    }
}

/// A signaling event and who it is for. `to: None` goes to the whole room.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub to: Option<String>,
    pub event: SyncEvent,
}

impl Signal {
    #[must_use]
    pub fn room(event: SyncEvent) -> Self {
        Self { to: None, event }
    }

    #[must_use]
    pub fn to(peer: impl Into<String>, event: SyncEvent) -> Self {
        Self { to: Some(peer.into()), event }
    }
}
