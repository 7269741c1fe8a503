//! Relay error codes.
//!
//! DESIGN
//! ======
//! The relay never inspects `Frame::data` except to report problems. Every
//! error a client can see carries a grepable `E_*` code: websocket errors go
//! out as `gateway:error` frames and HTTP errors as a status plus the same
//! code in a JSON body.

#[cfg(test)]
#[path = "frame_test.rs"]
mod frame_test;

use frames::Frame;

/// Grepable error code and retryable flag for structured error frames.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

/// Frame-level rejections produced while relaying.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("malformed frame: {0}")]
    Malformed(String),
    #[error("students may not send `{0}`")]
    Forbidden(String),
    #[error("participant `{0}` is not in this room")]
    UnknownPeer(String),
    #[error("frame addressed to room `{0}` on a socket joined to another room")]
    WrongRoom(String),
    #[error("reserved event `{0}`")]
    Reserved(String),
}

impl ErrorCode for RelayError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "E_MALFORMED",
            Self::Forbidden(_) => "E_FORBIDDEN",
            Self::UnknownPeer(_) => "E_UNKNOWN_PEER",
            Self::WrongRoom(_) => "E_WRONG_ROOM",
            Self::Reserved(_) => "E_RESERVED",
        }
    }
}

/// Build a `gateway:error` frame for `err`.
pub fn error_frame(err: &(impl ErrorCode + ?Sized)) -> Frame {
    let mut frame = Frame::error(err.error_code(), err.to_string());
    if err.retryable() {
        if let serde_json::Value::Object(map) = &mut frame.data {
            map.insert("retryable".into(), serde_json::Value::Bool(true));
        }
    }
    frame
}
