//! Per-peer connection state and the registry that owns the connections.

#[cfg(test)]
#[path = "peer_test.rs"]
mod peer_test;

use std::collections::HashMap;

/// Lifecycle of one peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Idle,
    Negotiating,
    Connected,
    Failed,
    Disconnected,
    Closed,
}

impl PeerState {
    /// Whether `self -> next` is a legal move. `Closed` is terminal.
    #[must_use]
    pub fn can_transition(self, next: Self) -> bool {
        match (self, next) {
            (Self::Closed, _) => false,
            (_, Self::Closed)
            | (Self::Idle, Self::Negotiating)
            | (Self::Negotiating, Self::Connected)
            | (Self::Negotiating | Self::Connected, Self::Failed | Self::Disconnected) => true,
            _ => false,
        }
    }

    /// States after which the connection is discarded.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Disconnected | Self::Closed)
    }
}

/// A registered connection and its last known state.
#[derive(Debug)]
pub struct Peer<C> {
    pub conn: C,
    pub state: PeerState,
}

/// Connections keyed by remote session id.
#[derive(Debug)]
pub struct PeerRegistry<C> {
    peers: HashMap<String, Peer<C>>,
}

impl<C> Default for PeerRegistry<C> {
    fn default() -> Self {
        Self { peers: HashMap::new() }
    }
}

impl<C> PeerRegistry<C> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. An existing entry for `id` is returned so the
    /// caller can close it.
    pub fn insert(&mut self, id: impl Into<String>, conn: C, state: PeerState) -> Option<Peer<C>> {
        self.peers.insert(id.into(), Peer { conn, state })
    }

    /// Remove `id`. Only the first call for a given entry returns it.
    pub fn remove(&mut self, id: &str) -> Option<Peer<C>> {
        self.peers.remove(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.peers.contains_key(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Peer<C>> {
        self.peers.get_mut(id)
    }

    /// Registered ids, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.peers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Peer<C>)> {
        self.peers.iter_mut()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Take every entry, leaving the registry empty.
    pub fn drain(&mut self) -> Vec<(String, Peer<C>)> {
        self.peers.drain().collect()
    }
}
