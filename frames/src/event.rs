//! Typed session events and their payloads.
//!
//! DESIGN
//! ======
//! Every event kind is one variant of [`SyncEvent`]. On the wire the variant
//! name becomes `Frame::event` (kebab-case) and the payload becomes
//! `Frame::data`; unit variants carry no payload. Geometry in these payloads
//! is always normalized: points in `[0,1]`, page rectangles in `[0,100]`
//! percent, line widths and font sizes relative to reference sizes.

#[cfg(test)]
#[path = "event_test.rs"]
mod event_test;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Frame;

/// Error returned when a frame does not carry a known, well-formed event.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("unknown or malformed `{event}` event: {source}")]
    Malformed {
        event: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode `{event}` event: {source}")]
    Encode {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Tool active on the tutor's side when a cursor sample was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Pen,
    Text,
    Eraser,
    Highlighter,
    Pointer,
}

/// One normalized line segment of a freehand stroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokeSegment {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
    pub color: String,
    /// Width relative to the reference line width.
    pub line_width: f64,
}

/// A run of text placed on the whiteboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextMark {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub color: String,
    /// Size relative to the reference font size on the virtual canvas.
    pub font_size: f64,
    pub font_family: String,
}

/// Page-relative rectangle, all fields in percent of the page box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PctRect {
    pub x_pct: f64,
    pub y_pct: f64,
    pub w_pct: f64,
    pub h_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    #[default]
    Highlight,
}

/// A highlight over one PDF page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    /// Opaque id, stable across the create/remove lifecycle.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AnnotationKind,
    pub page: u32,
    pub rects: Vec<PctRect>,
    /// CSS color, usually `rgba(r,g,b,a)`.
    pub color: String,
    #[serde(default)]
    pub created_at: i64,
}

/// Removal marker for an annotation. On the wire `removed` must be `true`
/// and no other field may appear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Tombstone {
    pub id: String,
    #[serde(deserialize_with = "removed_marker")]
    pub removed: bool,
}

fn removed_marker<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    if bool::deserialize(deserializer)? {
        Ok(true)
    } else {
        Err(de::Error::custom("tombstone must carry `removed: true`"))
    }
}

impl Tombstone {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), removed: true }
    }
}

/// Either a full annotation (create or replace) or its tombstone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnnotationEvent {
    Tombstone(Tombstone),
    Upsert(Annotation),
}

impl AnnotationEvent {
    /// Id of the annotation this event concerns.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Tombstone(t) => &t.id,
            Self::Upsert(a) => &a.id,
        }
    }
}

/// Normalized tutor pointer position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorSample {
    pub x: f64,
    pub y: f64,
    pub tool: Tool,
    /// Sender clock, milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// A partial or final caption for one utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionSegment {
    /// Utterance id shared by every partial and the final segment.
    pub id: String,
    pub text: String,
    pub is_final: bool,
    pub timestamp: i64,
}

/// A Q&A entry. Tutor and students may both post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub author: String,
    pub text: String,
    pub timestamp: i64,
}

/// Which student peer connection a signaling message belongs to.
///
/// `All` is the explicit form of "target not yet known": the receiver applies
/// it to every live connection it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalTarget {
    Student(String),
    All,
}

// =============================================================================
// SYNC EVENT
// =============================================================================

/// Every event exchanged between session participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum SyncEvent {
    Draw(StrokeSegment),
    Text(TextMark),
    Clear,
    Annotation { annotation: AnnotationEvent },
    Cursor(CursorSample),
    BroadcastStarted,
    BroadcastEnded,
    /// Student asks the tutor whether a broadcast is live (late join).
    BroadcastStatus,
    /// Tutor offer for one student's connection.
    Offer { sdp: String, student: String },
    /// Student answer for its own connection.
    Answer { sdp: String, student: String },
    IceCandidate { candidate: String, target: SignalTarget },
    Caption(CaptionSegment),
    Question(Question),
}

impl SyncEvent {
    /// Wire event name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Draw(_) => "draw",
            Self::Text(_) => "text",
            Self::Clear => "clear",
            Self::Annotation { .. } => "annotation",
            Self::Cursor(_) => "cursor",
            Self::BroadcastStarted => "broadcast-started",
            Self::BroadcastEnded => "broadcast-ended",
            Self::BroadcastStatus => "broadcast-status",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "ice-candidate",
            Self::Caption(_) => "caption",
            Self::Question(_) => "question",
        }
    }

    /// Whether only the tutor may originate this event.
    #[must_use]
    pub fn is_tutor_only(&self) -> bool {
        is_tutor_only_event(self.name())
    }

    /// Build a frame for `room`. The relay stamps `from`.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Encode`] if the payload cannot be represented as JSON.
    pub fn into_frame(self, room: &str) -> Result<Frame, EventError> {
        let name = self.name();
        let value = serde_json::to_value(&self).map_err(|source| EventError::Encode { event: name, source })?;
        let data = match value {
            Value::Object(mut map) => map.remove("data").unwrap_or(Value::Null),
            _ => Value::Null,
        };
        Ok(Frame::new(name, data).with_room(room))
    }

    /// Parse the typed event carried by `frame`.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Malformed`] for unknown event names or payloads
    /// that do not match the event's shape.
    pub fn from_frame(frame: &Frame) -> Result<Self, EventError> {
        let mut map = Map::new();
        map.insert("event".into(), Value::String(frame.event.clone()));
        // Unit events may arrive with `{}` from clients that always send an object.
        let empty = frame.data.is_null() || frame.data.as_object().is_some_and(Map::is_empty);
        if !empty {
            map.insert("data".into(), frame.data.clone());
        }
        serde_json::from_value(Value::Object(map)).map_err(|source| EventError::Malformed {
            event: frame.event.clone(),
            source,
        })
    }
}

/// Event names only the tutor may originate. The relay enforces this.
#[must_use]
pub fn is_tutor_only_event(name: &str) -> bool {
    matches!(
        name,
        "draw" | "text" | "clear" | "annotation" | "cursor" | "broadcast-started" | "broadcast-ended" | "offer" | "caption"
    )
}
