//! Websocket link to the session relay.
//!
//! The relay greets every socket with `session:connected` carrying the
//! participant id it assigned. After that, every frame in either direction
//! is one protobuf-encoded [`Frame`] in a binary message. Presence frames
//! (`room:join`, `room:part`) and relay errors are handled here; everything
//! else is parsed into a [`SyncEvent`].

#[cfg(test)]
#[path = "ws_test.rs"]
mod ws_test;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use frames::{Frame, GATEWAY_ERROR, ROOM_JOIN, ROOM_PART, SESSION_CONNECTED, SyncEvent};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use super::{NetError, ws_url};
use crate::config::env_parse;
use crate::session::Role;
use crate::sync::{Inbound, Inbox, Incoming, Outbound, SyncError};

const DEFAULT_WS_CONNECT_TIMEOUT_MS: u64 = 5_000;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A joined room: the id the relay assigned and both halves of the socket.
#[derive(Debug)]
pub struct WsLink {
    pub id: String,
    pub out: WsOutbound,
    pub inbox: WsInbox,
}

/// Join `room` on the relay at `base_url`.
///
/// # Errors
///
/// [`NetError`] when the URL is bad, the socket cannot be opened, the relay
/// refuses the join, or no welcome arrives within `WS_CONNECT_TIMEOUT_MS`.
pub async fn connect(base_url: &str, room: &str, role: Role, name: &str) -> Result<WsLink, NetError> {
    let url = ws_url(base_url, room, role, name)?;
    let (stream, _) = connect_async(url.as_str()).await.map_err(|e| NetError::WsConnect(Box::new(e)))?;
    let (sink, mut stream) = stream.split();

    let wait = Duration::from_millis(env_parse("WS_CONNECT_TIMEOUT_MS", DEFAULT_WS_CONNECT_TIMEOUT_MS));
    let id = tokio::time::timeout(wait, wait_for_welcome(&mut stream)).await.map_err(|_| NetError::Timeout)??;
    info!(%room, %id, %role, "joined room");

    Ok(WsLink {
        id: id.clone(),
        out: WsOutbound { room: room.to_owned(), sink: Arc::new(Mutex::new(sink)) },
        inbox: WsInbox { me: id, stream },
    })
}

async fn wait_for_welcome(stream: &mut SplitStream<WsStream>) -> Result<String, NetError> {
    loop {
        let Some(message) = stream.next().await else {
            return Err(NetError::WsClosed);
        };
        let bytes = match message.map_err(|e| NetError::WsConnect(Box::new(e)))? {
            Message::Binary(bytes) => bytes,
            Message::Close(_) => return Err(NetError::WsClosed),
            _ => continue,
        };
        let frame = frames::decode_frame(&bytes)?;
        match frame.event.as_str() {
            SESSION_CONNECTED => {
                return frame.data_str("id").map(ToOwned::to_owned).ok_or(NetError::MissingField("id"));
            }
            GATEWAY_ERROR => {
                return Err(NetError::Rejected {
                    code: frame.data_str("code").unwrap_or("E_UNKNOWN").to_owned(),
                    message: frame.data_str("message").unwrap_or_default().to_owned(),
                });
            }
            other => debug!(event = other, "frame before welcome skipped"),
        }
    }
}

// =============================================================================
// SENDING
// =============================================================================

/// Sending half. Clones share the socket.
#[derive(Clone)]
pub struct WsOutbound {
    room: String,
    sink: Arc<Mutex<SplitSink<WsStream, Message>>>,
}

impl std::fmt::Debug for WsOutbound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsOutbound").field("room", &self.room).finish_non_exhaustive()
    }
}

impl WsOutbound {
    async fn send_frame(&self, frame: Frame) -> Result<(), SyncError> {
        let bytes = frames::encode_frame(&frame);
        self.sink
            .lock()
            .await
            .send(Message::Binary(bytes.into()))
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))
    }

    /// Close the socket politely. The relay then tells the room we left.
    ///
    /// # Errors
    ///
    /// [`SyncError::Transport`] when the close frame cannot be written.
    pub async fn close(&self) -> Result<(), SyncError> {
        self.sink.lock().await.close().await.map_err(|e| SyncError::Transport(e.to_string()))
    }
}

#[async_trait]
impl Outbound for WsOutbound {
    async fn publish(&self, event: SyncEvent) -> Result<(), SyncError> {
        let frame = event.into_frame(&self.room)?;
        self.send_frame(frame).await
    }

    async fn send_to(&self, peer: &str, event: SyncEvent) -> Result<(), SyncError> {
        let frame = event.into_frame(&self.room)?.with_to(peer);
        self.send_frame(frame).await
    }
}

// =============================================================================
// RECEIVING
// =============================================================================

/// Receiving half.
pub struct WsInbox {
    me: String,
    stream: SplitStream<WsStream>,
}

impl std::fmt::Debug for WsInbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsInbox").field("me", &self.me).finish_non_exhaustive()
    }
}

/// What one relay frame means to this participant.
fn classify(frame: &Frame, me: &str) -> Option<Incoming> {
    match frame.event.as_str() {
        ROOM_PART => frame.data_str("id").map(|id| Incoming::PeerLeft(id.to_owned())),
        ROOM_JOIN => {
            debug!(peer = frame.data_str("id"), "peer joined");
            None
        }
        SESSION_CONNECTED => None,
        GATEWAY_ERROR => {
            warn!(code = frame.data_str("code"), message = frame.data_str("message"), "relay error");
            None
        }
        _ if frame.from.as_deref() == Some(me) => None,
        _ => match SyncEvent::from_frame(frame) {
            Ok(event) => Some(Incoming::Event(Inbound { from: frame.from.clone(), event })),
            Err(e) => {
                warn!(error = %e, "dropping malformed frame");
                None
            }
        },
    }
}

#[async_trait]
impl Inbox for WsInbox {
    async fn recv(&mut self) -> Option<Incoming> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => {
                    warn!(error = %e, "websocket receive failed");
                    return None;
                }
            };
            match message {
                Message::Binary(bytes) => match frames::decode_frame(&bytes) {
                    Ok(frame) => {
                        if let Some(incoming) = classify(&frame, &self.me) {
                            return Some(incoming);
                        }
                    }
                    Err(e) => warn!(error = %e, "undecodable frame dropped"),
                },
                Message::Close(_) => return None,
                _ => {}
            }
        }
    }
}
