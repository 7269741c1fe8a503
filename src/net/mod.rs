//! Network transports for a participant.
//!
//! DESIGN
//! ======
//! [`ws`] connects to the relay over a websocket and exposes the two halves
//! the runtime expects: an [`crate::sync::Outbound`] and an
//! [`crate::sync::Inbox`]. [`http`] stores room snapshots through the
//! relay's REST endpoint. Both speak plain `http(s)://` base URLs; the
//! websocket scheme is derived here.
//!
//! ERROR HANDLING
//! ==============
//! Connection setup returns [`NetError`]. Once connected, send failures
//! surface as [`crate::sync::SyncError::Transport`] and receive failures end
//! the inbox, which the runtime treats as a closed channel.

pub mod http;
pub mod ws;


pub use http::HttpStorage;
pub use ws::{WsInbox, WsLink, WsOutbound, connect};

use reqwest::Url;

use crate::session::Role;

#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("websocket connect failed: {0}")]
    WsConnect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket closed")]
    WsClosed,
    #[error("timed out waiting for the relay")]
    Timeout,
    #[error("frame decode failed: {0}")]
    Decode(#[from] frames::CodecError),
    #[error("relay rejected the connection: {code}: {message}")]
    Rejected { code: String, message: String },
    #[error("missing expected field `{0}`")]
    MissingField(&'static str),
}

/// Websocket endpoint for joining `room`, derived from an `http(s)://` base.
///
/// # Errors
///
/// [`NetError::InvalidBaseUrl`] for any other scheme or an unparsable URL.
pub fn ws_url(base_url: &str, room: &str, role: Role, name: &str) -> Result<Url, NetError> {
    let base = base_url.trim_end_matches('/');
    let raw = if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}/api/ws")
    } else if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}/api/ws")
    } else {
        return Err(NetError::InvalidBaseUrl(base_url.to_owned()));
    };
    let mut url = Url::parse(&raw).map_err(|_| NetError::InvalidBaseUrl(base_url.to_owned()))?;
    url.query_pairs_mut()
        .append_pair("room", room)
        .append_pair("role", role.as_str())
        .append_pair("name", name);
    Ok(url)
}

/// REST endpoint for a room's snapshot.
///
/// # Errors
///
/// [`NetError::InvalidBaseUrl`] when `base_url` is not `http(s)://`.
pub fn snapshot_url(base_url: &str, room: &str) -> Result<Url, NetError> {
    let base = base_url.trim_end_matches('/');
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(NetError::InvalidBaseUrl(base_url.to_owned()));
    }
    let mut url = Url::parse(base).map_err(|_| NetError::InvalidBaseUrl(base_url.to_owned()))?;
    url.path_segments_mut()
        .map_err(|()| NetError::InvalidBaseUrl(base_url.to_owned()))?
        .pop_if_empty()
        .extend(["api", "rooms", room, "snapshot"]);
    Ok(url)
}
