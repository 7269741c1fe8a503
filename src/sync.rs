//! Sync channel: how participants exchange [`SyncEvent`]s.
//!
//! DESIGN
//! ======
//! There is no process-wide socket. A participant holds an explicit
//! connection object: something implementing [`Outbound`] to send and an
//! [`Inbox`] to receive. The network implementation lives in
//! [`crate::net`]; [`Hub`] is an in-process bus with the same routing rules,
//! used to embed several participants in one process and in tests.
//!
//! Receiving is scoped by a [`Subscription`]. Dropping it unsubscribes, so a
//! handler can never outlive the component that registered it.
//!
//! Delivery is best effort per subscriber: a full queue drops the event with
//! a warning rather than stalling the sender, the same policy the relay uses.

#[cfg(test)]
#[path = "sync_test.rs"]
mod sync_test;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use frames::{EventError, SyncEvent};
use tokio::sync::mpsc;
use tracing::{debug, warn};

const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// An event received from a peer.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    /// Sender's participant id, when the transport knows it.
    pub from: Option<String>,
    pub event: SyncEvent,
}

/// Everything an [`Inbox`] yields.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Event(Inbound),
    /// A participant left the room.
    PeerLeft(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("sync channel closed")]
    Closed,
    #[error(transparent)]
    Event(#[from] EventError),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Sending half of a participant's connection.
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Deliver to every other participant in the room.
    async fn publish(&self, event: SyncEvent) -> Result<(), SyncError>;

    /// Deliver to one participant.
    async fn send_to(&self, peer: &str, event: SyncEvent) -> Result<(), SyncError>;
}

/// Receiving half of a participant's connection.
#[async_trait]
pub trait Inbox: Send {
    /// Next delivery, or `None` once the channel is closed.
    async fn recv(&mut self) -> Option<Incoming>;
}

// =============================================================================
// IN-PROCESS HUB
// =============================================================================

struct Subscriber {
    participant: String,
    tx: mpsc::Sender<Incoming>,
}

#[derive(Default)]
struct HubInner {
    next_id: u64,
    subscribers: HashMap<u64, Subscriber>,
}

/// In-process session bus for one room.
#[derive(Clone, Default)]
pub struct Hub {
    inner: Arc<Mutex<HubInner>>,
    capacity: Option<usize>,
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub").field("subscribers", &self.subscriber_count()).finish()
    }
}

impl Hub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A hub whose subscriber queues hold at most `capacity` events.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { inner: Arc::default(), capacity: Some(capacity.max(1)) }
    }

    /// Join as `participant`.
    #[must_use]
    pub fn connect(&self, participant: impl Into<String>) -> Connection {
        Connection { hub: self.clone(), participant: participant.into() }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn subscribe(&self, participant: &str) -> Subscription {
        let (tx, rx) = mpsc::channel(self.capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY));
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.subscribers.insert(id, Subscriber { participant: participant.to_owned(), tx });
        Subscription { hub: self.clone(), id, rx }
    }

    fn unsubscribe(&self, id: u64) {
        self.lock().subscribers.remove(&id);
    }

    /// Queue `event` for every subscriber matching `to`. Returns how many
    /// queues accepted it.
    fn deliver(&self, from: &str, to: Option<&str>, event: &SyncEvent) -> usize {
        self.fan_out(from, to, || Incoming::Event(Inbound { from: Some(from.to_owned()), event: event.clone() }))
    }

    fn fan_out(&self, from: &str, to: Option<&str>, make: impl Fn() -> Incoming) -> usize {
        let inner = self.lock();
        let mut delivered = 0;
        for sub in inner.subscribers.values() {
            let wanted = match to {
                Some(peer) => sub.participant == peer,
                None => sub.participant != from,
            };
            if !wanted {
                continue;
            }
            match sub.tx.try_send(make()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(to = %sub.participant, %from, "subscriber queue full; delivery dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }
}

/// One participant's handle on a [`Hub`].
#[derive(Debug, Clone)]
pub struct Connection {
    hub: Hub,
    participant: String,
}

impl Connection {
    #[must_use]
    pub fn participant(&self) -> &str {
        &self.participant
    }

    /// Start receiving events addressed to this participant.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.hub.subscribe(&self.participant)
    }

    /// Announce departure to the rest of the room.
    pub fn leave(self) {
        let who = self.participant.clone();
        self.hub.fan_out(&self.participant, None, || Incoming::PeerLeft(who.clone()));
    }
}

#[async_trait]
impl Outbound for Connection {
    async fn publish(&self, event: SyncEvent) -> Result<(), SyncError> {
        let n = self.hub.deliver(&self.participant, None, &event);
        debug!(from = %self.participant, event = event.name(), delivered = n, "published");
        Ok(())
    }

    async fn send_to(&self, peer: &str, event: SyncEvent) -> Result<(), SyncError> {
        if self.hub.deliver(&self.participant, Some(peer), &event) == 0 {
            debug!(from = %self.participant, %peer, event = event.name(), "no subscriber for addressed event");
        }
        Ok(())
    }
}

/// A live registration on the hub. Dropping it unsubscribes.
pub struct Subscription {
    hub: Hub,
    id: u64,
    rx: mpsc::Receiver<Incoming>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Subscription {
    /// Next delivery if one is already queued.
    pub fn try_recv(&mut self) -> Option<Incoming> {
        self.rx.try_recv().ok()
    }
}

#[async_trait]
impl Inbox for Subscription {
    async fn recv(&mut self) -> Option<Incoming> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}
