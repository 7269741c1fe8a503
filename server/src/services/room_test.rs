use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::timeout;

use super::*;
use crate::state::test_helpers::{seed_client, test_app_state};

async fn recv(rx: &mut mpsc::Receiver<Frame>) -> Frame {
    timeout(Duration::from_millis(500), rx.recv())
        .await
        .expect("receive timed out")
        .expect("queue closed unexpectedly")
}

fn assert_empty(rx: &mut mpsc::Receiver<Frame>) {
    assert!(rx.try_recv().is_err(), "expected no frame");
}

#[test]
fn room_ids_are_validated() {
    assert!(valid_room("algebra-1_b"));
    assert!(!valid_room(""));
    assert!(!valid_room("a b"));
    assert!(!valid_room("../etc"));
    assert!(!valid_room(&"x".repeat(65)));
    assert!(valid_room(&"x".repeat(64)));
}

#[tokio::test]
async fn join_announces_to_existing_participants() {
    let state = test_app_state();
    let (tutor, mut tutor_rx) = seed_client(&state, "r1", Role::Tutor, "ada").await;
    let (student, mut student_rx) = seed_client(&state, "r1", Role::Student, "sam").await;

    let join = recv(&mut tutor_rx).await;
    assert_eq!(join.event, ROOM_JOIN);
    assert_eq!(join.room.as_deref(), Some("r1"));
    assert_eq!(join.data_str("id"), Some(student.as_str()));
    assert_eq!(join.data_str("name"), Some("sam"));
    assert_eq!(join.data_str("role"), Some("student"));
    assert_empty(&mut student_rx);

    let listed = peers(&state, "r1", &student).await;
    assert_eq!(listed, vec![PeerInfo { id: tutor, name: "ada".into(), role: "tutor" }]);
}

#[tokio::test]
async fn second_tutor_is_refused() {
    let state = test_app_state();
    seed_client(&state, "r1", Role::Tutor, "ada").await;
    let (tx, _rx) = mpsc::channel(1);
    let err = join_room(&state, "r1", Client { name: "bob".into(), role: Role::Tutor, tx }).await.unwrap_err();
    assert!(matches!(err, RoomError::TutorPresent(_)));
    assert_eq!(err.error_code(), "E_TUTOR_PRESENT");
}

#[tokio::test]
async fn invalid_room_creates_nothing() {
    let state = test_app_state();
    let (tx, _rx) = mpsc::channel(1);
    let err = join_room(&state, "no spaces", Client { name: "x".into(), role: Role::Student, tx }).await.unwrap_err();
    assert_eq!(err.error_code(), "E_ROOM_INVALID");
    assert!(state.rooms.read().await.is_empty());
}

#[tokio::test]
async fn part_announces_and_evicts_empty_room() {
    let state = test_app_state();
    let (tutor, _tutor_rx) = seed_client(&state, "r1", Role::Tutor, "ada").await;
    let (student, mut student_rx) = seed_client(&state, "r1", Role::Student, "sam").await;

    assert!(part_room(&state, "r1", &tutor).await);
    let part = recv(&mut student_rx).await;
    assert_eq!(part.event, ROOM_PART);
    assert_eq!(part.data.get("id"), Some(&Value::String(tutor.clone())));
    assert!(!part_room(&state, "r1", &tutor).await, "second part is a no-op");

    assert!(part_room(&state, "r1", &student).await);
    assert!(state.rooms.read().await.get("r1").is_none());
}

#[tokio::test]
async fn broadcast_skips_sender_and_other_rooms() {
    let state = test_app_state();
    let (a, mut a_rx) = seed_client(&state, "r1", Role::Tutor, "a").await;
    let (_b, mut b_rx) = seed_client(&state, "r1", Role::Student, "b").await;
    let (_c, mut c_rx) = seed_client(&state, "r2", Role::Student, "c").await;
    recv(&mut a_rx).await;

    let frame = Frame::new("clear", Value::Null).with_room("r1");
    assert_eq!(broadcast(&state, "r1", &frame, Some(&a)).await, 1);
    assert_eq!(recv(&mut b_rx).await.event, "clear");
    assert_empty(&mut a_rx);
    assert_empty(&mut c_rx);
}

#[tokio::test]
async fn send_to_reaches_only_the_addressee() {
    let state = test_app_state();
    let (_t, mut t_rx) = seed_client(&state, "r1", Role::Tutor, "t").await;
    let (s1, mut s1_rx) = seed_client(&state, "r1", Role::Student, "s1").await;
    let (_s2, mut s2_rx) = seed_client(&state, "r1", Role::Student, "s2").await;
    recv(&mut t_rx).await;
    recv(&mut t_rx).await;
    recv(&mut s1_rx).await;

    assert!(send_to(&state, "r1", &s1, Frame::new("offer", Value::Null)).await);
    assert_eq!(recv(&mut s1_rx).await.event, "offer");
    assert_empty(&mut s2_rx);
    assert_empty(&mut t_rx);
    assert!(!send_to(&state, "r1", "ghost", Frame::new("offer", Value::Null)).await);
    assert!(contains(&state, "r1", &s1).await);
    assert!(!contains(&state, "r2", &s1).await);
}

#[tokio::test]
async fn full_queue_drops_instead_of_blocking() {
    let state = test_app_state();
    let (tx, mut slow_rx) = mpsc::channel(1);
    join_room(&state, "r1", Client { name: "slow".into(), role: Role::Student, tx }).await.unwrap();
    let (sender, _rx) = seed_client(&state, "r1", Role::Tutor, "t").await;
    // The join announcement already filled the slow queue.
    let frame = Frame::new("draw", Value::Null);
    assert_eq!(broadcast(&state, "r1", &frame, Some(&sender)).await, 0);
    assert_eq!(recv(&mut slow_rx).await.event, ROOM_JOIN);
}
