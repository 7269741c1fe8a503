use super::*;
use crate::voice::test_support::FakeFactory;

fn listener(me: &str) -> (VoiceListener, Arc<FakeFactory>) {
    let factory = FakeFactory::new();
    (VoiceListener::new(me, factory.clone()), factory)
}

#[tokio::test]
async fn offer_for_me_is_answered_receive_only() {
    let (mut l, factory) = listener("s1");
    let signal = l.on_offer("s1", "offer-for-s1").await.unwrap().unwrap();
    assert_eq!(
        signal.event,
        SyncEvent::Answer { sdp: "answer-to-offer-for-s1".into(), student: "s1".into() }
    );
    assert!(l.is_connected());
    assert_eq!(factory.log.lock().unwrap().created, [("s1".to_owned(), 0)]);
}

#[tokio::test]
async fn offer_for_someone_else_is_ignored() {
    let (mut l, factory) = listener("s1");
    assert!(l.on_offer("s2", "offer-for-s2").await.unwrap().is_none());
    assert!(!l.is_connected());
    assert!(factory.created().is_empty());
}

#[tokio::test]
async fn second_offer_replaces_connection() {
    let (mut l, factory) = listener("s1");
    l.on_offer("s1", "o1").await.unwrap();
    l.on_offer("s1", "o2").await.unwrap();
    assert_eq!(factory.created().len(), 2);
    assert_eq!(factory.closed(), ["s1"]);
}

#[tokio::test]
async fn ice_before_offer_is_dropped() {
    let (mut l, factory) = listener("s1");
    l.on_ice(&SignalTarget::Student("s1".into()), "early").await;
    assert!(factory.candidates().is_empty());
}

#[tokio::test]
async fn ice_is_filtered_by_target() {
    let (mut l, factory) = listener("s1");
    l.on_offer("s1", "o").await.unwrap();
    l.on_ice(&SignalTarget::Student("s2".into()), "not-mine").await;
    l.on_ice(&SignalTarget::Student("s1".into()), "mine").await;
    l.on_ice(&SignalTarget::All, "everyone").await;
    let got: Vec<_> = factory.candidates().into_iter().map(|(_, c)| c).collect();
    assert_eq!(got, ["mine", "everyone"]);
}

#[tokio::test]
async fn broadcast_end_closes_once() {
    let (mut l, factory) = listener("s1");
    l.on_offer("s1", "o").await.unwrap();
    l.on_broadcast_ended();
    l.on_broadcast_ended();
    assert!(!l.is_connected());
    assert_eq!(factory.closed(), ["s1"]);
}

#[tokio::test]
async fn failed_peer_state_closes_connection() {
    let (mut l, factory) = listener("s1");
    l.on_offer("s1", "o").await.unwrap();
    l.on_peer_state(PeerState::Connected);
    assert_eq!(l.state(), PeerState::Connected);
    l.on_peer_state(PeerState::Failed);
    assert!(!l.is_connected());
    assert_eq!(factory.closed(), ["s1"]);
}

#[test]
fn status_request_goes_to_the_room() {
    let (l, _) = listener("s1");
    assert_eq!(l.request_status(), Signal::room(SyncEvent::BroadcastStatus));
    assert!(l.local_candidate("c".into()).is_none());
}
