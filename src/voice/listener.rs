//! Student side of the voice broadcast: one receive-only connection.

#[cfg(test)]
#[path = "listener_test.rs"]
mod listener_test;

use std::sync::Arc;

use frames::{SignalTarget, SyncEvent};
use tracing::{debug, info, warn};

use super::media::{PeerConnection, PeerFactory};
use super::peer::PeerState;
use super::{Signal, VoiceError};

pub struct VoiceListener {
    me: String,
    factory: Arc<dyn PeerFactory>,
    conn: Option<Box<dyn PeerConnection>>,
    state: PeerState,
}

impl std::fmt::Debug for VoiceListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceListener")
            .field("me", &self.me)
            .field("state", &self.state)
            .field("connected", &self.conn.is_some())
            .finish_non_exhaustive()
    }
}

impl VoiceListener {
    /// `me` is this student's session id as the relay knows it.
    #[must_use]
    pub fn new(me: impl Into<String>, factory: Arc<dyn PeerFactory>) -> Self {
        Self { me: me.into(), factory, conn: None, state: PeerState::Idle }
    }

    /// An idle listener for the same student.
    #[must_use]
    pub fn fresh(&self) -> Self {
        Self::new(self.me.clone(), Arc::clone(&self.factory))
    }

    #[must_use]
    pub fn state(&self) -> PeerState {
        self.state
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Ask the tutor whether a broadcast is live. Sent on join and whenever
    /// a broadcast starts, so late joiners get an offer too.
    #[must_use]
    pub fn request_status(&self) -> Signal {
        Signal::room(SyncEvent::BroadcastStatus)
    }

    /// Answer the tutor's offer for this student. Offers for other students
    /// are ignored. A fresh offer replaces any existing connection.
    ///
    /// # Errors
    ///
    /// [`VoiceError::Negotiation`]; no connection is kept.
    pub async fn on_offer(&mut self, student: &str, sdp: &str) -> Result<Option<Signal>, VoiceError> {
        if student != self.me {
            return Ok(None);
        }
        self.close();
        let negotiation = |source| VoiceError::Negotiation { peer: self.me.clone(), source };

        let mut conn = self.factory.create(&self.me, &[]).await.map_err(negotiation)?;
        let answer = match conn.accept_offer(sdp).await {
            Ok(answer) => answer,
            Err(e) => {
                conn.close();
                return Err(negotiation(e));
            }
        };
        self.conn = Some(conn);
        self.state = PeerState::Negotiating;
        info!(me = %self.me, "voice answer sent");
        Ok(Some(Signal::room(SyncEvent::Answer { sdp: answer, student: self.me.clone() })))
    }

    /// Apply a remote candidate addressed to this student (or to everyone).
    /// Dropped when no connection exists yet.
    pub async fn on_ice(&mut self, target: &SignalTarget, candidate: &str) {
        let for_me = match target {
            SignalTarget::Student(id) => *id == self.me,
            SignalTarget::All => true,
        };
        if !for_me {
            return;
        }
        let Some(conn) = self.conn.as_mut() else {
            debug!(me = %self.me, "ice candidate before offer dropped");
            return;
        };
        if let Err(e) = conn.add_ice_candidate(candidate).await {
            warn!(me = %self.me, error = %e, "ice candidate rejected");
        }
    }

    /// Wrap a locally gathered candidate for the tutor.
    #[must_use]
    pub fn local_candidate(&self, candidate: String) -> Option<Signal> {
        self.conn.as_ref()?;
        let target = SignalTarget::Student(self.me.clone());
        Some(Signal::room(SyncEvent::IceCandidate { candidate, target }))
    }

    pub fn on_peer_state(&mut self, state: PeerState) {
        if self.conn.is_none() {
            return;
        }
        if state.is_terminal() {
            self.close();
            self.state = state;
        } else if self.state.can_transition(state) {
            self.state = state;
        }
    }

    /// The tutor stopped broadcasting. Idempotent.
    pub fn on_broadcast_ended(&mut self) {
        if self.conn.is_some() {
            info!(me = %self.me, "voice broadcast ended");
        }
        self.close();
    }

    fn close(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            conn.close();
        }
        self.state = PeerState::Idle;
    }
}

impl Drop for VoiceListener {
    fn drop(&mut self) {
        self.close();
    }
}
