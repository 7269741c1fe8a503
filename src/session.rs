//! One participant's session state and the event dispatcher.
//!
//! DESIGN
//! ======
//! [`Participant`] bundles every local component: whiteboard, annotations,
//! cursor display, caption feed, and Q&A board. Local actions mutate local
//! state first and return the [`SyncEvent`] to publish. Remote events are
//! routed to their component with replace/append/filter semantics, so the
//! order in which peers' events arrive does not matter.
//!
//! The participant is owned by exactly one task (see [`crate::runtime`]), so
//! nothing here is synchronized. Voice signaling needs async I/O against the
//! peer-connection stack; those events are handed back as [`Routed::Voice`]
//! for the voice role object instead of being applied here.
//!
//! ERROR HANDLING
//! ==============
//! Local actions fail loudly ([`SessionError`]). Remote events never fail:
//! a mark that cannot be painted is logged and skipped.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::fmt;
use std::str::FromStr;

use canvas::annotation::{AnnotationStore, DEFAULT_HIGHLIGHT_COLOR};
use canvas::font::FontBook;
use canvas::normalize::{
    Dims, Point, Rect, normalize_font_size, normalize_line_width, normalize_point,
};
use canvas::whiteboard::{Whiteboard, WhiteboardError};
use frames::{AnnotationEvent, StrokeSegment, SyncEvent, TextMark, Tool};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::captions::CaptionFeed;
use crate::config::SessionConfig;
use crate::cursor::{CursorBroadcaster, CursorDisplay, CursorMarker, Surface};
use crate::qa::{QaBoard, QaError};
use crate::sync::Inbound;

// =============================================================================
// ROLE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
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

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role `{0}`")]
pub struct RoleParseError(pub String);

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tutor" => Ok(Self::Tutor),
            "student" => Ok(Self::Student),
            _ => Err(RoleParseError(s.to_owned())),
        }
    }
}

// =============================================================================
// ERRORS / ROUTING
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("{role} may not {action}")]
    NotPermitted { role: Role, action: &'static str },
    #[error("canvas has not been measured yet")]
    Unmeasured,
    #[error("nothing on the page was selected")]
    EmptySelection,
    #[error(transparent)]
    Whiteboard(#[from] WhiteboardError),
    #[error(transparent)]
    Qa(#[from] QaError),
}

/// What [`Participant::apply_remote`] did with an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    /// Applied to local state.
    Applied,
    /// Dropped: stale, duplicate, or not applicable here.
    Ignored,
    /// Voice signaling for the broadcaster or listener.
    Voice(Inbound),
}

// =============================================================================
// PARTICIPANT
// =============================================================================

pub struct Participant {
    id: String,
    name: String,
    role: Role,
    dims: Dims,
    fonts: FontBook,
    board: Option<Whiteboard>,
    pending_snapshot: Option<Vec<u8>>,
    annotations: AnnotationStore,
    cursor_out: CursorBroadcaster,
    cursor: CursorDisplay,
    captions: CaptionFeed,
    qa: QaBoard,
    tool: Tool,
    surface: Surface,
    broadcast_live: bool,
    /// Last known sender of tutor-only events.
    tutor: Option<String>,
}

impl fmt::Debug for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Participant")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("dims", &self.dims)
            .field("annotations", &self.annotations.len())
            .finish_non_exhaustive()
    }
}

impl Participant {
    /// A participant whose canvas is not laid out yet.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role, fonts: FontBook, config: &SessionConfig) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
            dims: Dims::default(),
            fonts,
            board: None,
            pending_snapshot: None,
            annotations: AnnotationStore::new(),
            cursor_out: CursorBroadcaster::new(role),
            cursor: CursorDisplay::new(config.cursor_ttl),
            captions: CaptionFeed::new(config.caption_history),
            qa: QaBoard::new(),
            tool: Tool::Pen,
            surface: Surface::Whiteboard,
            broadcast_live: false,
            tutor: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Adopt the id the relay assigned on join.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn dims(&self) -> Dims {
        self.dims
    }

    #[must_use]
    pub fn board(&self) -> Option<&Whiteboard> {
        self.board.as_ref()
    }

    #[must_use]
    pub fn annotations(&self) -> &AnnotationStore {
        &self.annotations
    }

    #[must_use]
    pub fn qa(&self) -> &QaBoard {
        &self.qa
    }

    #[must_use]
    pub fn captions(&self) -> &CaptionFeed {
        &self.captions
    }

    pub fn captions_mut(&mut self) -> &mut CaptionFeed {
        &mut self.captions
    }

    #[must_use]
    pub fn cursor_marker(&self, now: Instant) -> Option<CursorMarker> {
        self.cursor.position(self.dims, now)
    }

    #[must_use]
    pub fn cursor_deadline(&self) -> Option<Instant> {
        self.cursor.deadline()
    }

    /// Expire the cursor marker. Returns whether it was hidden.
    pub fn tick_cursor(&mut self, now: Instant) -> bool {
        self.cursor.tick(now)
    }

    /// Whether the tutor is known to be broadcasting voice.
    #[must_use]
    pub fn broadcast_live(&self) -> bool {
        self.broadcast_live
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    pub fn set_surface(&mut self, surface: Surface) {
        self.surface = surface;
    }

    // =========================================================================
    // LAYOUT / SNAPSHOTS
    // =========================================================================

    /// The canvas container was laid out or resized. The first measured
    /// layout allocates the board and applies any snapshot received before it.
    ///
    /// # Errors
    ///
    /// [`SessionError::Whiteboard`] if the surface cannot be (re)allocated.
    pub fn set_dims(&mut self, dims: Dims) -> Result<(), SessionError> {
        if !dims.is_measured() {
            return Err(SessionError::Unmeasured);
        }
        match self.board.as_mut() {
            Some(board) => board.resize(dims)?,
            None => {
                let mut board = Whiteboard::new(dims, self.fonts.clone())?;
                if let Some(snapshot) = self.pending_snapshot.take() {
                    if let Err(e) = board.restore(&snapshot) {
                        warn!(error = %e, "deferred snapshot restore failed");
                    }
                }
                self.board = Some(board);
            }
        }
        self.dims = dims;
        Ok(())
    }

    /// Load a saved board. Before first layout the snapshot is held and
    /// applied once the canvas is measured.
    ///
    /// # Errors
    ///
    /// [`SessionError::Whiteboard`] when the bytes are not a readable image.
    pub fn restore_board(&mut self, snapshot: Vec<u8>) -> Result<(), SessionError> {
        match self.board.as_mut() {
            Some(board) => Ok(board.restore(&snapshot)?),
            None => {
                self.pending_snapshot = Some(snapshot);
                Ok(())
            }
        }
    }

    /// Encode the board for storage, or `None` before first layout.
    ///
    /// # Errors
    ///
    /// [`SessionError::Whiteboard`] if encoding fails.
    pub fn snapshot(&self) -> Result<Option<Vec<u8>>, SessionError> {
        match &self.board {
            Some(board) => Ok(Some(board.persist()?)),
            None => Ok(None),
        }
    }

    // =========================================================================
    // LOCAL ACTIONS
    // =========================================================================

    fn require_tutor(&self, action: &'static str) -> Result<(), SessionError> {
        if self.role == Role::Tutor {
            Ok(())
        } else {
            Err(SessionError::NotPermitted { role: self.role, action })
        }
    }

    fn board_mut(&mut self) -> Result<&mut Whiteboard, SessionError> {
        self.board.as_mut().ok_or(SessionError::Unmeasured)
    }

    /// Draw a segment between two local pixel positions.
    ///
    /// # Errors
    ///
    /// Students may not draw; the canvas must be measured; the color must parse.
    pub fn draw(&mut self, from: Point, to: Point, color: &str, width_px: f64) -> Result<SyncEvent, SessionError> {
        self.require_tutor("draw")?;
        let dims = self.dims;
        let a = normalize_point(from, dims);
        let b = normalize_point(to, dims);
        let segment = StrokeSegment {
            x0: a.x,
            y0: a.y,
            x1: b.x,
            y1: b.y,
            color: color.to_owned(),
            line_width: normalize_line_width(width_px),
        };
        self.board_mut()?.apply_stroke(&segment)?;
        Ok(SyncEvent::Draw(segment))
    }

    /// Place text at a local pixel position (alphabetic baseline).
    ///
    /// # Errors
    ///
    /// As [`Participant::draw`], plus a missing font.
    pub fn write_text(
        &mut self,
        at: Point,
        text: &str,
        color: &str,
        font_px: f64,
        font_family: &str,
    ) -> Result<SyncEvent, SessionError> {
        self.require_tutor("write text")?;
        let dims = self.dims;
        let pos = normalize_point(at, dims);
        let mark = TextMark {
            text: text.to_owned(),
            x: pos.x,
            y: pos.y,
            color: color.to_owned(),
            font_size: normalize_font_size(font_px, dims),
            font_family: font_family.to_owned(),
        };
        self.board_mut()?.apply_text_mark(&mark)?;
        Ok(SyncEvent::Text(mark))
    }

    /// # Errors
    ///
    /// Students may not clear; the canvas must be measured.
    pub fn clear_board(&mut self) -> Result<SyncEvent, SessionError> {
        self.require_tutor("clear the board")?;
        self.board_mut()?.clear();
        Ok(SyncEvent::Clear)
    }

    /// Highlight a text selection on a PDF page. `selection` and `page_box`
    /// are client-space rectangles; `color` defaults to the highlighter paint.
    ///
    /// # Errors
    ///
    /// Students may not annotate; an empty selection is refused.
    pub fn highlight(
        &mut self,
        selection: &[Rect],
        page: u32,
        page_box: Rect,
        color: Option<&str>,
    ) -> Result<SyncEvent, SessionError> {
        self.require_tutor("annotate")?;
        let color = color.unwrap_or(DEFAULT_HIGHLIGHT_COLOR);
        let annotation = self
            .annotations
            .add_highlight(selection, page, page_box, color)
            .ok_or(SessionError::EmptySelection)?;
        Ok(SyncEvent::Annotation { annotation: AnnotationEvent::Upsert(annotation) })
    }

    /// # Errors
    ///
    /// Students may not remove annotations.
    pub fn erase_highlight(&mut self, id: &str) -> Result<SyncEvent, SessionError> {
        self.require_tutor("annotate")?;
        let tombstone = self.annotations.remove_highlight(id);
        Ok(SyncEvent::Annotation { annotation: AnnotationEvent::Tombstone(tombstone) })
    }

    /// Pointer moved over the local canvas. `None` when nothing should be sent.
    #[must_use]
    pub fn pointer_moved(&self, pos: Point, now_ms: i64) -> Option<SyncEvent> {
        self.cursor_out.sample(pos, self.dims, self.tool, self.surface, now_ms).map(SyncEvent::Cursor)
    }

    /// Post a question. Both roles may ask.
    ///
    /// # Errors
    ///
    /// [`SessionError::Qa`] for blank or oversized text.
    pub fn ask(&mut self, text: &str, now_ms: i64) -> Result<SyncEvent, SessionError> {
        let author = self.name.clone();
        Ok(SyncEvent::Question(self.qa.ask(&author, text, now_ms)?))
    }

    // =========================================================================
    // REMOTE EVENTS
    // =========================================================================

    /// Apply a peer's event.
    pub fn apply_remote(&mut self, inbound: Inbound, now: Instant) -> Routed {
        let name = inbound.event.name();
        if inbound.event.is_tutor_only() {
            if let Some(from) = &inbound.from {
                self.tutor = Some(from.clone());
            }
        }
        match inbound.event {
            SyncEvent::Draw(segment) => self.paint(name, |board| board.apply_stroke(&segment)),
            SyncEvent::Text(mark) => self.paint(name, |board| board.apply_text_mark(&mark)),
            SyncEvent::Clear => self.paint(name, |board| {
                board.clear();
                Ok(())
            }),
            SyncEvent::Annotation { annotation } => {
                if self.annotations.apply_remote(&annotation) { Routed::Applied } else { Routed::Ignored }
            }
            SyncEvent::Cursor(sample) => {
                self.cursor.on_sample(sample, now);
                Routed::Applied
            }
            SyncEvent::Caption(segment) => {
                self.captions.apply(segment);
                Routed::Applied
            }
            SyncEvent::Question(question) => {
                if self.qa.apply_remote(question) { Routed::Applied } else { Routed::Ignored }
            }
            event @ (SyncEvent::BroadcastStarted | SyncEvent::BroadcastEnded) => {
                self.broadcast_live = matches!(event, SyncEvent::BroadcastStarted);
                Routed::Voice(Inbound { from: inbound.from, event })
            }
            event @ (SyncEvent::BroadcastStatus
            | SyncEvent::Offer { .. }
            | SyncEvent::Answer { .. }
            | SyncEvent::IceCandidate { .. }) => Routed::Voice(Inbound { from: inbound.from, event }),
        }
    }

    /// A peer left the room. When it was the tutor, the cursor marker and
    /// the live-broadcast flag are dropped. Returns whether it was the tutor.
    pub fn on_peer_left(&mut self, peer: &str) -> bool {
        if self.tutor.as_deref() != Some(peer) {
            return false;
        }
        self.tutor = None;
        self.cursor.hide();
        self.broadcast_live = false;
        true
    }

    fn paint(&mut self, event: &str, op: impl FnOnce(&mut Whiteboard) -> Result<(), WhiteboardError>) -> Routed {
        let Some(board) = self.board.as_mut() else {
            debug!(event, "board not laid out; event dropped");
            return Routed::Ignored;
        };
        match op(board) {
            Ok(()) => Routed::Applied,
            Err(e) => {
                warn!(event, error = %e, "remote mark skipped");
                Routed::Ignored
            }
        }
    }
}
