//! Tutor side of the voice broadcast.

#[cfg(test)]
#[path = "broadcaster_test.rs"]
mod broadcaster_test;

use std::sync::Arc;

use frames::{SignalTarget, SyncEvent};
use tracing::{debug, info, warn};

use super::media::{MediaDevices, MediaSource, PeerConnection, PeerFactory};
use super::peer::{PeerRegistry, PeerState};
use super::{Signal, VoiceError};

/// Whether the tutor is currently broadcasting. The single source of truth
/// for "mic on".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BroadcastState {
    #[default]
    Off,
    Live,
}

pub struct VoiceBroadcaster {
    devices: Arc<dyn MediaDevices>,
    factory: Arc<dyn PeerFactory>,
    state: BroadcastState,
    media: Option<Box<dyn MediaSource>>,
    peers: PeerRegistry<Box<dyn PeerConnection>>,
}

impl std::fmt::Debug for VoiceBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceBroadcaster")
            .field("state", &self.state)
            .field("peers", &self.peers.ids())
            .finish_non_exhaustive()
    }
}

impl VoiceBroadcaster {
    #[must_use]
    pub fn new(devices: Arc<dyn MediaDevices>, factory: Arc<dyn PeerFactory>) -> Self {
        Self { devices, factory, state: BroadcastState::Off, media: None, peers: PeerRegistry::new() }
    }

    /// An idle broadcaster on the same devices and peer factory.
    #[must_use]
    pub fn fresh(&self) -> Self {
        Self::new(Arc::clone(&self.devices), Arc::clone(&self.factory))
    }

    #[must_use]
    pub fn state(&self) -> BroadcastState {
        self.state
    }

    /// Connected or negotiating students, sorted.
    #[must_use]
    pub fn students(&self) -> Vec<String> {
        self.peers.ids()
    }

    /// Acquire the microphone and announce the broadcast. Already live is a
    /// no-op.
    ///
    /// Cancel-safe: if this future is dropped before acquisition completes,
    /// nothing is stored and the half-acquired source is released by drop.
    ///
    /// # Errors
    ///
    /// [`VoiceError::PermissionDenied`], [`VoiceError::NoDevice`], or
    /// [`VoiceError::Media`]. State stays `Off`.
    pub async fn start(&mut self) -> Result<Option<Signal>, VoiceError> {
        if self.state == BroadcastState::Live {
            return Ok(None);
        }
        let source = self.devices.acquire_audio().await?;
        self.media = Some(source);
        self.state = BroadcastState::Live;
        info!("voice broadcast started");
        Ok(Some(Signal::room(SyncEvent::BroadcastStarted)))
    }

    /// Open a connection to `student` against the already-acquired source
    /// and return the targeted offer. A student that already has a
    /// connection is left alone.
    ///
    /// # Errors
    ///
    /// [`VoiceError::NotLive`] when not broadcasting;
    /// [`VoiceError::Negotiation`] if the connection cannot produce an offer,
    /// in which case nothing is registered.
    pub async fn connect_student(&mut self, student: &str) -> Result<Option<Signal>, VoiceError> {
        let Some(media) = self.media.as_ref() else {
            return Err(VoiceError::NotLive);
        };
        if self.peers.contains(student) {
            debug!(%student, "student already connected");
            return Ok(None);
        }
        let tracks = media.tracks();
        let negotiation = |source| VoiceError::Negotiation { peer: student.to_owned(), source };

        let mut conn = self.factory.create(student, &tracks).await.map_err(negotiation)?;
        let sdp = match conn.create_offer().await {
            Ok(sdp) => sdp,
            Err(e) => {
                conn.close();
                return Err(negotiation(e));
            }
        };
        self.peers.insert(student, conn, PeerState::Negotiating);
        info!(%student, peers = self.peers.len(), "voice offer sent");
        Ok(Some(Signal::to(student, SyncEvent::Offer { sdp, student: student.to_owned() })))
    }

    /// A student asked whether a broadcast is live. Connects late joiners.
    ///
    /// # Errors
    ///
    /// As [`VoiceBroadcaster::connect_student`].
    pub async fn handle_status_request(&mut self, student: &str) -> Result<Option<Signal>, VoiceError> {
        if self.state != BroadcastState::Live {
            return Ok(None);
        }
        self.connect_student(student).await
    }

    /// Apply a student's answer. Unknown students are ignored; a failed
    /// answer discards that one connection.
    ///
    /// # Errors
    ///
    /// [`VoiceError::Negotiation`] after the connection has been discarded.
    pub async fn handle_answer(&mut self, student: &str, sdp: &str) -> Result<(), VoiceError> {
        let Some(peer) = self.peers.get_mut(student) else {
            debug!(%student, "answer for unknown student dropped");
            return Ok(());
        };
        if let Err(source) = peer.conn.accept_answer(sdp).await {
            self.discard(student);
            return Err(VoiceError::Negotiation { peer: student.to_owned(), source });
        }
        Ok(())
    }

    /// Route a remote ICE candidate to its connection, or to every
    /// connection when the target is ambiguous. Unknown targets are dropped.
    pub async fn handle_ice(&mut self, target: &SignalTarget, candidate: &str) {
        match target {
            SignalTarget::Student(student) => {
                let Some(peer) = self.peers.get_mut(student) else {
                    debug!(%student, "ice candidate for unknown student dropped");
                    return;
                };
                if let Err(e) = peer.conn.add_ice_candidate(candidate).await {
                    warn!(%student, error = %e, "ice candidate rejected");
                }
            }
            SignalTarget::All => {
                for (student, peer) in self.peers.iter_mut() {
                    if let Err(e) = peer.conn.add_ice_candidate(candidate).await {
                        warn!(%student, error = %e, "ice candidate rejected");
                    }
                }
            }
        }
    }

    /// Wrap a locally gathered candidate for `student`'s connection.
    #[must_use]
    pub fn local_candidate(&self, student: &str, candidate: String) -> Option<Signal> {
        if !self.peers.contains(student) {
            return None;
        }
        let target = SignalTarget::Student(student.to_owned());
        Some(Signal::to(student, SyncEvent::IceCandidate { candidate, target }))
    }

    /// Track a connection's state. Failed, disconnected, and closed
    /// connections are removed without touching their siblings.
    pub fn on_peer_state(&mut self, student: &str, state: PeerState) {
        if state.is_terminal() {
            if self.discard(student) {
                info!(%student, ?state, "voice peer removed");
            }
            return;
        }
        if let Some(peer) = self.peers.get_mut(student) {
            if peer.state.can_transition(state) {
                peer.state = state;
            } else {
                debug!(%student, from = ?peer.state, to = ?state, "ignored peer state change");
            }
        }
    }

    /// A student left the room.
    pub fn on_student_left(&mut self, student: &str) {
        self.discard(student);
    }

    /// Close every connection, release the microphone, and announce the
    /// end. Idempotent: stopping while off emits nothing.
    pub fn stop(&mut self) -> Option<Signal> {
        if self.state == BroadcastState::Off {
            return None;
        }
        self.release();
        self.state = BroadcastState::Off;
        info!("voice broadcast ended");
        Some(Signal::room(SyncEvent::BroadcastEnded))
    }

    fn discard(&mut self, student: &str) -> bool {
        match self.peers.remove(student) {
            Some(mut peer) => {
                peer.conn.close();
                true
            }
            None => false,
        }
    }

    fn release(&mut self) {
        for (_, mut peer) in self.peers.drain() {
            peer.conn.close();
        }
        if let Some(mut media) = self.media.take() {
            media.stop();
        }
    }
}

impl Drop for VoiceBroadcaster {
    fn drop(&mut self) {
        self.release();
    }
}
