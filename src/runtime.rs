//! The participant's event loop.
//!
//! DESIGN
//! ======
//! [`Runtime::run`] is the single mutator of a [`Participant`]. One
//! `tokio::select!` loop multiplexes:
//!
//! - local [`Command`]s from the UI or the embedding application,
//! - inbound events from the sync channel,
//! - the cursor auto-hide deadline,
//! - a periodic snapshot save (tutor only, skipped when nothing changed),
//! - shutdown.
//!
//! Voice work that awaits the media stack (starting the microphone,
//! negotiating a peer) runs as one in-flight job polled by the same loop,
//! so a slow device prompt never stalls drawing, inbound events, or
//! shutdown. The job owns the voice role while it runs; voice inputs that
//! arrive meanwhile queue behind it in order. Stopping the broadcast or
//! shutting down drops the job, which releases whatever it had acquired.
//!
//! On join the saved board is restored and a student asks whether a voice
//! broadcast is live. On exit the voice role is stopped, a final snapshot is
//! saved by the tutor, and every media and peer resource is released when
//! the runtime is dropped, whichever way the loop ended.
//!
//! ERROR HANDLING
//! ==============
//! Nothing in the loop is fatal. Refused local actions, failed sends, and
//! storage errors are logged; the loop only ends on shutdown or when the
//! sync channel or command channel closes.

#[cfg(test)]
#[path = "runtime_test.rs"]
mod runtime_test;

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;

use canvas::normalize::{Dims, Point, Rect};
use frames::{CaptionSegment, SignalTarget, SyncEvent, Tool};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::cursor::Surface;
use crate::session::{Participant, Role, Routed, SessionError};
use crate::storage::RoomStorage;
use crate::sync::{Inbound, Inbox, Incoming, Outbound};
use crate::voice::{BroadcastState, PeerState, Signal, VoiceBroadcaster, VoiceError, VoiceListener};

/// A local action for the runtime to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Resize(Dims),
    Draw { from: Point, to: Point, color: String, width_px: f64 },
    Text { at: Point, text: String, color: String, font_px: f64, font_family: String },
    Clear,
    Highlight { selection: Vec<Rect>, page: u32, page_box: Rect, color: Option<String> },
    EraseHighlight(String),
    Pointer(Point),
    SetTool(Tool),
    SetSurface(Surface),
    Ask(String),
    SetCaptions(bool),
    /// A segment from the tutor's caption pipeline.
    Caption(CaptionSegment),
    StartBroadcast,
    StopBroadcast,
    /// The platform reported a peer connection state change.
    PeerState { peer: String, state: PeerState },
    /// The platform gathered a local ICE candidate.
    LocalCandidate { peer: String, candidate: String },
}

// =============================================================================
// VOICE ROLE
// =============================================================================

/// The participant's side of the voice broadcast.
#[derive(Debug, Default)]
pub enum VoiceRole {
    #[default]
    Disabled,
    Tutor(VoiceBroadcaster),
    Student(VoiceListener),
}

impl VoiceRole {
    /// Signals to send right after joining.
    fn on_join(&self) -> Option<Signal> {
        match self {
            Self::Student(listener) => Some(listener.request_status()),
            _ => None,
        }
    }

    async fn on_event(&mut self, inbound: Inbound) -> Result<Option<Signal>, VoiceError> {
        match (self, inbound.event) {
            (Self::Tutor(b), SyncEvent::BroadcastStatus) => match inbound.from {
                Some(student) => b.handle_status_request(&student).await,
                None => Ok(None),
            },
            (Self::Tutor(b), SyncEvent::Answer { sdp, student }) => {
                if inbound.from.as_deref() != Some(student.as_str()) {
                    debug!(%student, from = ?inbound.from, "answer not sent by its student dropped");
                    return Ok(None);
                }
                b.handle_answer(&student, &sdp).await?;
                Ok(None)
            }
            (Self::Tutor(b), SyncEvent::IceCandidate { candidate, target }) => {
                // A student's candidate belongs to the sender's own connection.
                let Some(from) = inbound.from else {
                    return Ok(None);
                };
                if matches!(&target, SignalTarget::Student(student) if *student != from) {
                    debug!(%from, ?target, "ice candidate for another student dropped");
                    return Ok(None);
                }
                b.handle_ice(&SignalTarget::Student(from), &candidate).await;
                Ok(None)
            }
            (Self::Student(l), SyncEvent::BroadcastStarted) => Ok(Some(l.request_status())),
            (Self::Student(l), SyncEvent::BroadcastEnded) => {
                l.on_broadcast_ended();
                Ok(None)
            }
            (Self::Student(l), SyncEvent::Offer { sdp, student }) => l.on_offer(&student, &sdp).await,
            (Self::Student(l), SyncEvent::IceCandidate { candidate, target }) => {
                l.on_ice(&target, &candidate).await;
                Ok(None)
            }
            (_, event) => {
                debug!(event = event.name(), "voice event not for this role");
                Ok(None)
            }
        }
    }

    fn on_peer_left(&mut self, peer: &str, was_tutor: bool) {
        match self {
            Self::Tutor(b) => b.on_student_left(peer),
            Self::Student(l) if was_tutor => l.on_broadcast_ended(),
            _ => {}
        }
    }

    fn on_peer_state(&mut self, peer: &str, state: PeerState) {
        match self {
            Self::Tutor(b) => b.on_peer_state(peer, state),
            Self::Student(l) => l.on_peer_state(state),
            Self::Disabled => {}
        }
    }

    fn local_candidate(&self, peer: &str, candidate: String) -> Option<Signal> {
        match self {
            Self::Tutor(b) => b.local_candidate(peer, candidate),
            Self::Student(l) => l.local_candidate(candidate),
            Self::Disabled => None,
        }
    }

    async fn start(&mut self) -> Result<Option<Signal>, VoiceError> {
        match self {
            Self::Tutor(b) => b.start().await,
            _ => Ok(None),
        }
    }

    fn stop(&mut self) -> Option<Signal> {
        match self {
            Self::Tutor(b) => b.stop(),
            Self::Student(l) => {
                l.on_broadcast_ended();
                None
            }
            Self::Disabled => None,
        }
    }

    /// An idle role of the same kind, sharing devices and peer factory.
    fn fresh(&self) -> Self {
        match self {
            Self::Tutor(b) => Self::Tutor(b.fresh()),
            Self::Student(l) => Self::Student(l.fresh()),
            Self::Disabled => Self::Disabled,
        }
    }

    fn is_live(&self) -> bool {
        matches!(self, Self::Tutor(b) if b.state() == BroadcastState::Live)
    }

    /// Run one piece of async voice work, handing the role back with the
    /// outcome.
    async fn perform(mut self, work: VoiceWork) -> VoiceOutcome {
        let result = match work {
            VoiceWork::Start => self.start().await,
            VoiceWork::Event(inbound) => self.on_event(inbound).await,
        };
        (self, result)
    }
}

/// Voice work that awaits the media stack.
enum VoiceWork {
    Start,
    Event(Inbound),
}

/// Any voice input, queued in arrival order while a job is in flight.
enum VoiceInput {
    Work(VoiceWork),
    PeerLeft { peer: String, was_tutor: bool },
    PeerState { peer: String, state: PeerState },
    LocalCandidate { peer: String, candidate: String },
}

type VoiceOutcome = (VoiceRole, Result<Option<Signal>, VoiceError>);
type VoiceJob = Pin<Box<dyn Future<Output = VoiceOutcome> + Send>>;

// =============================================================================
// RUNTIME
// =============================================================================

pub struct Runtime<I, O, S> {
    pub participant: Participant,
    pub voice: VoiceRole,
    pub inbox: I,
    pub out: O,
    pub storage: S,
    pub room: String,
    pub config: SessionConfig,
    dirty: bool,
    job: Option<VoiceJob>,
    /// Whether the role inside `job` was broadcasting when it was taken.
    job_was_live: bool,
    backlog: VecDeque<VoiceInput>,
}

impl<I, O, S> Runtime<I, O, S>
where
    I: Inbox,
    O: Outbound,
    S: RoomStorage,
{
    #[must_use]
    pub fn new(
        participant: Participant,
        voice: VoiceRole,
        inbox: I,
        out: O,
        storage: S,
        room: impl Into<String>,
        config: SessionConfig,
    ) -> Self {
        Self {
            participant,
            voice,
            inbox,
            out,
            storage,
            room: room.into(),
            config,
            dirty: false,
            job: None,
            job_was_live: false,
            backlog: VecDeque::new(),
        }
    }

    /// Drive the session until `shutdown` resolves or a channel closes.
    /// Returns the participant for inspection.
    pub async fn run<F>(mut self, mut commands: mpsc::Receiver<Command>, shutdown: F) -> Participant
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);
        self.restore().await;
        if let Some(signal) = self.voice.on_join() {
            dispatch(&self.out, signal).await;
        }

        let period = self.config.snapshot_interval;
        let mut snapshots = tokio::time::interval_at(Instant::now() + period, period);
        snapshots.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let is_tutor = self.participant.role() == Role::Tutor;

        info!(room = %self.room, id = %self.participant.id(), role = %self.participant.role(), "session started");
        loop {
            let deadline = self.participant.cursor_deadline();
            tokio::select! {
                biased;
                () = &mut shutdown => break,
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
                incoming = self.inbox.recv() => match incoming {
                    Some(Incoming::Event(inbound)) => self.handle_inbound(inbound).await,
                    Some(Incoming::PeerLeft(peer)) => self.handle_peer_left(peer).await,
                    None => {
                        warn!(room = %self.room, "sync channel closed");
                        break;
                    }
                },
                (role, result) = next_outcome(&mut self.job), if self.job.is_some() => {
                    self.finish_job(role, result).await;
                }
                () = sleep_until_opt(deadline) => {
                    self.participant.tick_cursor(Instant::now());
                }
                _ = snapshots.tick(), if is_tutor => self.persist().await,
            }
        }

        self.stop_voice().await;
        if is_tutor {
            self.persist().await;
        }
        info!(room = %self.room, id = %self.participant.id(), "session ended");
        self.participant
    }

    async fn restore(&mut self) {
        match self.storage.load(&self.room).await {
            Ok(Some(snapshot)) => {
                if let Err(e) = self.participant.restore_board(snapshot) {
                    warn!(room = %self.room, error = %e, "snapshot restore failed");
                }
            }
            Ok(None) => debug!(room = %self.room, "no snapshot to restore"),
            Err(e) => warn!(room = %self.room, error = %e, "snapshot load failed"),
        }
    }

    async fn persist(&mut self) {
        if !self.dirty {
            return;
        }
        match self.participant.snapshot() {
            Ok(Some(bytes)) => {
                let size = bytes.len();
                match self.storage.save(&self.room, bytes).await {
                    Ok(()) => {
                        self.dirty = false;
                        debug!(room = %self.room, size, "snapshot saved");
                    }
                    Err(e) => warn!(room = %self.room, error = %e, "snapshot save failed"),
                }
            }
            Ok(None) => {}
            Err(e) => warn!(room = %self.room, error = %e, "snapshot encode failed"),
        }
    }

    async fn handle_inbound(&mut self, inbound: Inbound) {
        match self.participant.apply_remote(inbound, Instant::now()) {
            Routed::Voice(voice) => self.voice_input(VoiceInput::Work(VoiceWork::Event(voice))).await,
            Routed::Applied | Routed::Ignored => {}
        }
    }

    async fn handle_peer_left(&mut self, peer: String) {
        let was_tutor = self.participant.on_peer_left(&peer);
        debug!(%peer, was_tutor, "peer left");
        self.voice_input(VoiceInput::PeerLeft { peer, was_tutor }).await;
    }

    // -------------------------------------------------------------------------
    // Voice jobs
    // -------------------------------------------------------------------------

    async fn voice_input(&mut self, input: VoiceInput) {
        if self.job.is_some() {
            self.backlog.push_back(input);
            return;
        }
        self.apply_voice(input).await;
    }

    async fn apply_voice(&mut self, input: VoiceInput) {
        match input {
            VoiceInput::Work(work) => self.launch(work),
            VoiceInput::PeerLeft { peer, was_tutor } => self.voice.on_peer_left(&peer, was_tutor),
            VoiceInput::PeerState { peer, state } => self.voice.on_peer_state(&peer, state),
            VoiceInput::LocalCandidate { peer, candidate } => {
                if let Some(signal) = self.voice.local_candidate(&peer, candidate) {
                    dispatch(&self.out, signal).await;
                }
            }
        }
    }

    /// Hand the role to a new job, leaving an idle stand-in behind.
    fn launch(&mut self, work: VoiceWork) {
        if matches!(self.voice, VoiceRole::Disabled) {
            return;
        }
        let stand_in = self.voice.fresh();
        let role = std::mem::replace(&mut self.voice, stand_in);
        self.job_was_live = role.is_live();
        self.job = Some(Box::pin(role.perform(work)));
    }

    async fn finish_job(&mut self, role: VoiceRole, result: Result<Option<Signal>, VoiceError>) {
        self.job = None;
        self.job_was_live = false;
        self.voice = role;
        match result {
            Ok(Some(signal)) => dispatch(&self.out, signal).await,
            Ok(None) => {}
            Err(e) => warn!(error = %e, "voice signaling failed"),
        }
        while self.job.is_none() {
            let Some(input) = self.backlog.pop_front() else {
                break;
            };
            self.apply_voice(input).await;
        }
    }

    /// Stop the broadcast, cancelling any in-flight job and queued input.
    async fn stop_voice(&mut self) {
        self.backlog.clear();
        let mut ended = false;
        if let Some(job) = self.job.take() {
            drop(job);
            ended = std::mem::take(&mut self.job_was_live);
            debug!(was_live = ended, "in-flight voice work cancelled");
        }
        let signal = self.voice.stop().or_else(|| ended.then(|| Signal::room(SyncEvent::BroadcastEnded)));
        if let Some(signal) = signal {
            dispatch(&self.out, signal).await;
        }
    }

    async fn handle_command(&mut self, cmd: Command) {
        let p = &mut self.participant;
        let marks_board = matches!(cmd, Command::Draw { .. } | Command::Text { .. } | Command::Clear);
        let result: Result<Option<SyncEvent>, SessionError> = match cmd {
            Command::Resize(dims) => p.set_dims(dims).map(|()| None),
            Command::Draw { from, to, color, width_px } => p.draw(from, to, &color, width_px).map(Some),
            Command::Text { at, text, color, font_px, font_family } => {
                p.write_text(at, &text, &color, font_px, &font_family).map(Some)
            }
            Command::Clear => p.clear_board().map(Some),
            Command::Highlight { selection, page, page_box, color } => {
                p.highlight(&selection, page, page_box, color.as_deref()).map(Some)
            }
            Command::EraseHighlight(id) => p.erase_highlight(&id).map(Some),
            Command::Pointer(pos) => Ok(p.pointer_moved(pos, frames::now_ms())),
            Command::SetTool(tool) => {
                p.set_tool(tool);
                Ok(None)
            }
            Command::SetSurface(surface) => {
                p.set_surface(surface);
                Ok(None)
            }
            Command::Ask(text) => p.ask(&text, frames::now_ms()).map(Some),
            Command::SetCaptions(on) => {
                p.captions_mut().set_enabled(on);
                Ok(None)
            }
            Command::Caption(segment) if p.role() == Role::Tutor => Ok(Some(SyncEvent::Caption(segment))),
            Command::Caption(_) => Err(SessionError::NotPermitted { role: p.role(), action: "caption" }),
            Command::StartBroadcast => {
                self.voice_input(VoiceInput::Work(VoiceWork::Start)).await;
                return;
            }
            Command::StopBroadcast => {
                self.stop_voice().await;
                return;
            }
            Command::PeerState { peer, state } => {
                self.voice_input(VoiceInput::PeerState { peer, state }).await;
                return;
            }
            Command::LocalCandidate { peer, candidate } => {
                self.voice_input(VoiceInput::LocalCandidate { peer, candidate }).await;
                return;
            }
        };
        match result {
            Ok(Some(event)) => {
                if marks_board {
                    self.dirty = true;
                }
                dispatch(&self.out, Signal::room(event)).await;
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "local action refused"),
        }
    }
}

/// Send a signal to its addressee, or to the room. Failures are logged.
pub async fn dispatch<O: Outbound + ?Sized>(out: &O, signal: Signal) {
    let name = signal.event.name();
    let sent = match signal.to {
        Some(peer) => out.send_to(&peer, signal.event).await,
        None => out.publish(signal.event).await,
    };
    if let Err(e) = sent {
        warn!(event = name, error = %e, "send failed");
    }
}

async fn next_outcome(job: &mut Option<VoiceJob>) -> VoiceOutcome {
    match job {
        Some(job) => job.await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
