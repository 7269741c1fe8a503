//! Participant core for a live tutoring session.
//!
//! One tutor and any number of students share a room. The tutor draws on a
//! whiteboard, highlights PDF pages, points with a live cursor, broadcasts
//! voice, and captions that voice; students see all of it on canvases of
//! their own size and can post questions back.
//!
//! | Module | Role |
//! |---|---|
//! | [`session`] | Per-participant state and role rules |
//! | [`runtime`] | Event loop: local commands, remote events, timers |
//! | [`sync`] | Outbound/inbox traits and the in-process [`sync::Hub`] |
//! | [`net`] | Websocket and HTTP transports to the relay |
//! | [`storage`] | Room snapshot persistence |
//! | [`cursor`] | Cursor sampling and auto-hiding display |
//! | [`voice`] | One-to-many voice broadcast signaling |
//! | [`captions`] | Caption pipeline and caption feed |
//! | [`qa`] | Question board |
//! | [`config`] | Environment-driven tuning |
//!
//! Rendering, geometry normalization and annotations live in the `canvas`
//! crate; the wire envelope and event payloads live in `frames`.

pub mod captions;
pub mod config;
pub mod cursor;
pub mod net;
pub mod qa;
pub mod runtime;
pub mod session;
pub mod storage;
pub mod sync;
pub mod voice;

pub use config::SessionConfig;
pub use runtime::{Command, Runtime, VoiceRole};
pub use session::{Participant, Role, SessionError};
