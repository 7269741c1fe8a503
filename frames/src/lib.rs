//! Shared frame envelope and protobuf codec for the session relay.
//!
//! This crate owns the wire representation used by `server`, `cli`, and the
//! participant core. The envelope (`Frame`) is routing-only: the relay reads
//! `room`, `from`, `to` and `event` but never inspects `data`. Typed payloads
//! live in [`event`] and convert to and from frames through
//! [`SyncEvent::into_frame`] and [`SyncEvent::from_frame`].

pub mod event;

use std::time::{SystemTime, UNIX_EPOCH};

use prost::Message;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub use event::{
    Annotation, AnnotationEvent, AnnotationKind, CaptionSegment, CursorSample, EventError, PctRect, Question,
    SignalTarget, StrokeSegment, SyncEvent, TextMark, Tombstone, Tool,
};

/// Event name the relay uses for the welcome frame.
pub const SESSION_CONNECTED: &str = "session:connected";

/// Event name broadcast when a participant leaves a room.
pub const ROOM_PART: &str = "room:part";

/// Event name broadcast when a participant joins a room.
pub const ROOM_JOIN: &str = "room:join";

/// Event name for relay-level errors (malformed frames, rejected events).
pub const GATEWAY_ERROR: &str = "gateway:error";

/// Error returned by [`decode_frame`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The raw bytes could not be decoded as a protobuf `WireFrame`.
    #[error("failed to decode protobuf frame: {0}")]
    Decode(#[from] prost::DecodeError),
}

/// A single message on the realtime wire protocol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Unique identifier for this frame (UUID string).
    pub id: String,
    /// Milliseconds since the Unix epoch when the frame was created.
    pub ts: i64,
    /// Room the frame belongs to, if any.
    pub room: Option<String>,
    /// Sender participant id. Stamped by the relay; clients may leave it empty.
    pub from: Option<String>,
    /// Addressed recipient participant id. `None` means every room peer.
    pub to: Option<String>,
    /// Event name, e.g. `"draw"` or `"session:connected"`.
    pub event: String,
    /// Arbitrary JSON payload.
    pub data: Value,
}

impl Frame {
    /// Create a frame for `event` carrying `data`.
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ts: now_ms(),
            room: None,
            from: None,
            to: None,
            event: event.into(),
            data,
        }
    }

    /// Create a relay error frame carrying a grepable code and message.
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        let mut data = Map::new();
        data.insert("code".into(), Value::String(code.to_owned()));
        data.insert("message".into(), Value::String(message.into()));
        Self::new(GATEWAY_ERROR, Value::Object(data))
    }

    #[must_use]
    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    #[must_use]
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    #[must_use]
    pub fn with_to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    /// Read a string field from an object payload.
    #[must_use]
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

/// Current time as milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

/// Encode a frame into protobuf bytes.
#[must_use]
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    let wire = frame_to_wire(frame);

    let mut out = Vec::with_capacity(wire.encoded_len());
    // Encoding into a growable Vec cannot hit `BufferTooSmall`.
    wire.encode(&mut out).unwrap_or_default();
    out
}

/// Decode protobuf bytes into a frame.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed bytes.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, CodecError> {
    let wire = WireFrame::decode(bytes)?;
    Ok(wire_to_frame(wire))
}

fn frame_to_wire(frame: &Frame) -> WireFrame {
    WireFrame {
        id: frame.id.clone(),
        ts: frame.ts,
        room: frame.room.clone(),
        from: frame.from.clone(),
        to: frame.to.clone(),
        event: frame.event.clone(),
        data: Some(json_to_proto_value(&frame.data)),
    }
}

fn wire_to_frame(wire: WireFrame) -> Frame {
    Frame {
        id: wire.id,
        ts: wire.ts,
        room: wire.room,
        from: wire.from,
        to: wire.to,
        event: wire.event,
        data: wire.data.map_or(Value::Null, |v| proto_to_json_value(&v)),
    }
}

fn json_to_proto_value(value: &Value) -> prost_types::Value {
    let kind = match value {
        Value::Null => prost_types::value::Kind::NullValue(prost_types::NullValue::NullValue as i32),
        Value::Bool(v) => prost_types::value::Kind::BoolValue(*v),
        Value::Number(v) => prost_types::value::Kind::NumberValue(v.as_f64().unwrap_or(0.0)),
        Value::String(v) => prost_types::value::Kind::StringValue(v.clone()),
        Value::Array(v) => prost_types::value::Kind::ListValue(prost_types::ListValue {
            values: v.iter().map(json_to_proto_value).collect(),
        }),
        Value::Object(v) => prost_types::value::Kind::StructValue(prost_types::Struct {
            fields: v
                .iter()
                .map(|(k, v)| (k.clone(), json_to_proto_value(v)))
                .collect(),
        }),
    };

    prost_types::Value { kind: Some(kind) }
}

fn proto_to_json_value(value: &prost_types::Value) -> Value {
    let Some(kind) = &value.kind else {
        return Value::Null;
    };

    match kind {
        prost_types::value::Kind::NullValue(_) => Value::Null,
        prost_types::value::Kind::NumberValue(v) => proto_number_to_json(*v),
        prost_types::value::Kind::StringValue(v) => Value::String(v.clone()),
        prost_types::value::Kind::BoolValue(v) => Value::Bool(*v),
        prost_types::value::Kind::StructValue(v) => Value::Object(
            v.fields
                .iter()
                .map(|(k, v)| (k.clone(), proto_to_json_value(v)))
                .collect(),
        ),
        prost_types::value::Kind::ListValue(v) => Value::Array(v.values.iter().map(proto_to_json_value).collect()),
    }
}

/// Protobuf carries every number as `f64`. Integral values come back as JSON
/// integers so fields like `page` and `timestamp` deserialize into integer types.
#[allow(clippy::cast_possible_truncation)]
fn proto_number_to_json(v: f64) -> Value {
    const MAX_SAFE_INT: f64 = 9_007_199_254_740_991.0;
    if v.fract() == 0.0 && v.abs() <= MAX_SAFE_INT {
        return Value::Number(serde_json::Number::from(v as i64));
    }
    serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
}

#[derive(Clone, PartialEq, Message)]
struct WireFrame {
    #[prost(string, tag = "1")]
    id: String,
    #[prost(int64, tag = "2")]
    ts: i64,
    #[prost(string, optional, tag = "3")]
    room: Option<String>,
    #[prost(string, optional, tag = "4")]
    from: Option<String>,
    #[prost(string, optional, tag = "5")]
    to: Option<String>,
    #[prost(string, tag = "6")]
    event: String,
    #[prost(message, optional, tag = "7")]
    data: Option<prost_types::Value>,
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
