use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use super::*;
use crate::state::test_helpers::{seed_client, test_app_state};

async fn recv(rx: &mut mpsc::Receiver<Frame>) -> Frame {
    timeout(Duration::from_millis(500), rx.recv())
        .await
        .expect("receive timed out")
        .expect("queue closed unexpectedly")
}

/// Skip presence notices left over from seeding.
fn drain(rx: &mut mpsc::Receiver<Frame>) {
    while rx.try_recv().is_ok() {}
}

fn bytes_of(frame: &Frame) -> Vec<u8> {
    frames::encode_frame(frame)
}

fn error_code(frame: &Frame) -> Option<&str> {
    assert_eq!(frame.event, frames::GATEWAY_ERROR);
    frame.data_str("code")
}

#[test]
fn display_names_are_trimmed_and_defaulted() {
    assert_eq!(display_name(None), "anonymous");
    assert_eq!(display_name(Some("   ")), "anonymous");
    assert_eq!(display_name(Some(" ada ")), "ada");
    assert_eq!(display_name(Some(&"n".repeat(100))).chars().count(), MAX_NAME_CHARS);
}

// =============================================================================
// process_inbound
// =============================================================================

#[tokio::test]
async fn tutor_draw_is_stamped_and_fanned_out() {
    let state = test_app_state();
    let (tutor, mut tutor_rx) = seed_client(&state, "r1", Role::Tutor, "ada").await;
    let (_s1, mut s1_rx) = seed_client(&state, "r1", Role::Student, "sam").await;
    let (_s2, mut s2_rx) = seed_client(&state, "r1", Role::Student, "kim").await;
    drain(&mut tutor_rx);
    drain(&mut s1_rx);
    drain(&mut s2_rx);

    let draw = Frame::new("draw", json!({ "x0": 0.1, "y0": 0.1, "x1": 0.2, "y1": 0.2, "color": "#000", "lineWidth": 1.0 }));
    let reply = process_inbound(&state, "r1", &tutor, Role::Tutor, &bytes_of(&draw)).await;
    assert!(reply.is_none());

    for rx in [&mut s1_rx, &mut s2_rx] {
        let got = recv(rx).await;
        assert_eq!(got.event, "draw");
        assert_eq!(got.from.as_deref(), Some(tutor.as_str()));
        assert_eq!(got.room.as_deref(), Some("r1"));
        assert_eq!(got.data, draw.data);
    }
    assert!(tutor_rx.try_recv().is_err(), "sender must not receive its own frame");
}

#[tokio::test]
async fn student_cannot_send_tutor_events() {
    let state = test_app_state();
    let (_tutor, mut tutor_rx) = seed_client(&state, "r1", Role::Tutor, "ada").await;
    let (student, _rx) = seed_client(&state, "r1", Role::Student, "sam").await;
    drain(&mut tutor_rx);

    for event in ["draw", "clear", "cursor", "offer", "caption", "broadcast-started"] {
        let frame = Frame::new(event, json!({}));
        let reply = process_inbound(&state, "r1", &student, Role::Student, &bytes_of(&frame))
            .await
            .expect("student frame should be refused");
        assert_eq!(error_code(&reply), Some("E_FORBIDDEN"), "{event}");
    }
    assert!(tutor_rx.try_recv().is_err());
}

#[tokio::test]
async fn student_question_reaches_tutor() {
    let state = test_app_state();
    let (_tutor, mut tutor_rx) = seed_client(&state, "r1", Role::Tutor, "ada").await;
    let (student, _rx) = seed_client(&state, "r1", Role::Student, "sam").await;
    drain(&mut tutor_rx);

    let question = Frame::new("question", json!({ "id": "q1", "author": "sam", "text": "why?", "timestamp": 1 }));
    assert!(process_inbound(&state, "r1", &student, Role::Student, &bytes_of(&question)).await.is_none());

    let got = recv(&mut tutor_rx).await;
    assert_eq!(got.event, "question");
    assert_eq!(got.from.as_deref(), Some(student.as_str()));
}

#[tokio::test]
async fn addressed_frame_reaches_only_its_target() {
    let state = test_app_state();
    let (tutor, mut tutor_rx) = seed_client(&state, "r1", Role::Tutor, "ada").await;
    let (s1, mut s1_rx) = seed_client(&state, "r1", Role::Student, "sam").await;
    let (_s2, mut s2_rx) = seed_client(&state, "r1", Role::Student, "kim").await;
    drain(&mut tutor_rx);
    drain(&mut s1_rx);
    drain(&mut s2_rx);

    let offer = Frame::new("offer", json!({ "sdp": "v=0", "student": s1 })).with_to(&s1);
    assert!(process_inbound(&state, "r1", &tutor, Role::Tutor, &bytes_of(&offer)).await.is_none());

    let got = recv(&mut s1_rx).await;
    assert_eq!(got.event, "offer");
    assert_eq!(got.to.as_deref(), Some(s1.as_str()));
    assert!(s2_rx.try_recv().is_err());
}

#[tokio::test]
async fn envelope_violations_are_reported_to_sender() {
    let state = test_app_state();
    let (tutor, _rx) = seed_client(&state, "r1", Role::Tutor, "ada").await;

    let reply = process_inbound(&state, "r1", &tutor, Role::Tutor, &[0xff, 0xff, 0xff]).await.expect("reply");
    assert_eq!(error_code(&reply), Some("E_MALFORMED"));

    let reserved = Frame::new("room:part", json!({ "id": "x" }));
    let reply = process_inbound(&state, "r1", &tutor, Role::Tutor, &bytes_of(&reserved)).await.expect("reply");
    assert_eq!(error_code(&reply), Some("E_RESERVED"));

    let elsewhere = Frame::new("clear", json!({})).with_room("r2");
    let reply = process_inbound(&state, "r1", &tutor, Role::Tutor, &bytes_of(&elsewhere)).await.expect("reply");
    assert_eq!(error_code(&reply), Some("E_WRONG_ROOM"));

    let stray = Frame::new("offer", json!({ "sdp": "v=0", "student": "ghost" })).with_to("ghost");
    let reply = process_inbound(&state, "r1", &tutor, Role::Tutor, &bytes_of(&stray)).await.expect("reply");
    assert_eq!(error_code(&reply), Some("E_UNKNOWN_PEER"));
}

// =============================================================================
// LIVE SOCKETS
// =============================================================================

type Socket = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn serve() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = crate::routes::app(test_app_state());
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("ws://{addr}/api/ws")
}

async fn open(base: &str, room: &str, role: &str, name: &str) -> Socket {
    let url = format!("{base}?room={room}&role={role}&name={name}");
    let (socket, _) = tokio_tungstenite::connect_async(url).await.expect("connect");
    socket
}

async fn next_frame(socket: &mut Socket) -> Frame {
    loop {
        let msg = timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("socket receive timed out")
            .expect("socket closed")
            .expect("socket error");
        if let WsMessage::Binary(bytes) = msg {
            return frames::decode_frame(&bytes).expect("relay frames decode");
        }
    }
}

async fn send(socket: &mut Socket, frame: &Frame) {
    socket.send(WsMessage::Binary(bytes_of(frame).into())).await.expect("send");
}

#[tokio::test]
async fn live_room_session() {
    let base = serve().await;

    let mut tutor = open(&base, "geo", "tutor", "ada").await;
    let welcome = next_frame(&mut tutor).await;
    assert_eq!(welcome.event, SESSION_CONNECTED);
    assert_eq!(welcome.data["role"], "tutor");
    assert_eq!(welcome.data["peers"], json!([]));
    let tutor_id = welcome.data_str("id").expect("tutor id").to_owned();

    let mut student = open(&base, "geo", "student", "sam").await;
    let welcome = next_frame(&mut student).await;
    assert_eq!(welcome.data["peers"][0]["id"], tutor_id.as_str());
    assert_eq!(welcome.data["peers"][0]["role"], "tutor");
    let student_id = welcome.data_str("id").expect("student id").to_owned();

    let join = next_frame(&mut tutor).await;
    assert_eq!(join.event, frames::ROOM_JOIN);
    assert_eq!(join.data_str("id"), Some(student_id.as_str()));

    send(&mut tutor, &Frame::new("clear", json!({}))).await;
    let got = next_frame(&mut student).await;
    assert_eq!(got.event, "clear");
    assert_eq!(got.from.as_deref(), Some(tutor_id.as_str()));

    send(&mut student, &Frame::new("clear", json!({}))).await;
    let refused = next_frame(&mut student).await;
    assert_eq!(error_code(&refused), Some("E_FORBIDDEN"));

    tutor.close(None).await.expect("close");
    let part = next_frame(&mut student).await;
    assert_eq!(part.event, frames::ROOM_PART);
    assert_eq!(part.data_str("id"), Some(tutor_id.as_str()));
    assert_eq!(part.data_str("role"), Some("tutor"));
}

#[tokio::test]
async fn second_tutor_is_refused() {
    let base = serve().await;
    let mut first = open(&base, "geo", "tutor", "ada").await;
    let _ = next_frame(&mut first).await;

    let mut second = open(&base, "geo", "tutor", "bob").await;
    let refused = next_frame(&mut second).await;
    assert_eq!(error_code(&refused), Some("E_TUTOR_PRESENT"));
}

#[tokio::test]
async fn bad_role_is_rejected_before_upgrade() {
    let base = serve().await;
    let url = format!("{base}?room=geo&role=admin");
    assert!(tokio_tungstenite::connect_async(url).await.is_err());
}
