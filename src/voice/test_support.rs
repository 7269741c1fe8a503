//! In-memory media and peer fakes for voice tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::media::{MediaDevices, MediaError, MediaSource, MediaTrack, NegotiationError, PeerConnection, PeerFactory};

pub(crate) struct FakeDevices {
    fail: Option<MediaError>,
    pub acquired: Arc<AtomicUsize>,
    pub stopped: Arc<AtomicUsize>,
}

impl FakeDevices {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self { fail: None, acquired: Arc::default(), stopped: Arc::default() })
    }

    pub fn failing(err: MediaError) -> Arc<Self> {
        Arc::new(Self { fail: Some(err), acquired: Arc::default(), stopped: Arc::default() })
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn acquire_audio(&self) -> Result<Box<dyn MediaSource>, MediaError> {
        if let Some(err) = &self.fail {
            return Err(err.clone());
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSource { stopped: Arc::clone(&self.stopped), done: false }))
    }
}

/// Devices whose permission prompt never resolves.
pub(crate) struct HangingDevices {
    pub prompted: Arc<AtomicUsize>,
}

impl HangingDevices {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { prompted: Arc::default() })
    }

    pub fn prompted(&self) -> usize {
        self.prompted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaDevices for HangingDevices {
    async fn acquire_audio(&self) -> Result<Box<dyn MediaSource>, MediaError> {
        self.prompted.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

struct FakeSource {
    stopped: Arc<AtomicUsize>,
    done: bool,
}

impl MediaSource for FakeSource {
    fn tracks(&self) -> Vec<MediaTrack> {
        vec![MediaTrack { id: "mic-0".into() }]
    }

    fn stop(&mut self) {
        if !self.done {
            self.done = true;
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Drop for FakeSource {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Default)]
pub(crate) struct PeerLog {
    /// `(peer, track count)` per created connection.
    pub created: Vec<(String, usize)>,
    pub closed: Vec<String>,
    pub answers: Vec<(String, String)>,
    pub candidates: Vec<(String, String)>,
}

pub(crate) struct FakeFactory {
    pub log: Arc<Mutex<PeerLog>>,
    fail_offer_for: Vec<String>,
    hang_offer_for: Vec<String>,
}

impl FakeFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { log: Arc::default(), fail_offer_for: Vec::new(), hang_offer_for: Vec::new() })
    }

    pub fn failing_offer_for(peer: &str) -> Arc<Self> {
        Arc::new(Self { log: Arc::default(), fail_offer_for: vec![peer.to_owned()], hang_offer_for: Vec::new() })
    }

    /// Offers to `peer` never complete.
    pub fn hanging_offer_for(peer: &str) -> Arc<Self> {
        Arc::new(Self { log: Arc::default(), fail_offer_for: Vec::new(), hang_offer_for: vec![peer.to_owned()] })
    }

    pub fn created(&self) -> Vec<String> {
        self.log.lock().unwrap().created.iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn closed(&self) -> Vec<String> {
        self.log.lock().unwrap().closed.clone()
    }

    pub fn candidates(&self) -> Vec<(String, String)> {
        self.log.lock().unwrap().candidates.clone()
    }

    pub fn answers(&self) -> Vec<(String, String)> {
        self.log.lock().unwrap().answers.clone()
    }
}

#[async_trait]
impl PeerFactory for FakeFactory {
    async fn create(&self, peer_id: &str, tracks: &[MediaTrack]) -> Result<Box<dyn PeerConnection>, NegotiationError> {
        self.log.lock().unwrap().created.push((peer_id.to_owned(), tracks.len()));
        Ok(Box::new(FakePeer {
            id: peer_id.to_owned(),
            log: Arc::clone(&self.log),
            fail_offer: self.fail_offer_for.iter().any(|p| p == peer_id),
            hang_offer: self.hang_offer_for.iter().any(|p| p == peer_id),
            closed: false,
        }))
    }
}

struct FakePeer {
    id: String,
    log: Arc<Mutex<PeerLog>>,
    fail_offer: bool,
    hang_offer: bool,
    closed: bool,
}

#[async_trait]
impl PeerConnection for FakePeer {
    async fn create_offer(&mut self) -> Result<String, NegotiationError> {
        if self.fail_offer {
            return Err(NegotiationError("offer rejected".into()));
        }
        if self.hang_offer {
            return std::future::pending().await;
        }
        Ok(format!("offer-for-{}", self.id))
    }

    async fn accept_offer(&mut self, sdp: &str) -> Result<String, NegotiationError> {
        Ok(format!("answer-to-{sdp}"))
    }

    async fn accept_answer(&mut self, sdp: &str) -> Result<(), NegotiationError> {
        self.log.lock().unwrap().answers.push((self.id.clone(), sdp.to_owned()));
        Ok(())
    }

    async fn add_ice_candidate(&mut self, candidate: &str) -> Result<(), NegotiationError> {
        self.log.lock().unwrap().candidates.push((self.id.clone(), candidate.to_owned()));
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.log.lock().unwrap().closed.push(self.id.clone());
        }
    }
}

impl Drop for FakePeer {
    fn drop(&mut self) {
        self.close();
    }
}
