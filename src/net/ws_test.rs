use std::future::Future;

use frames::{StrokeSegment, decode_frame, encode_frame};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use super::*;

type Server = WebSocketStream<TcpStream>;

async fn relay<F, Fut>(script: F) -> String
where
    F: FnOnce(Server) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        script(ws).await;
    });
    format!("http://{addr}")
}

fn binary(frame: &Frame) -> Message {
    Message::Binary(encode_frame(frame).into())
}

fn welcome(id: &str) -> Message {
    binary(&Frame::new(SESSION_CONNECTED, json!({ "id": id, "room": "r1" })))
}

async fn next_frame(ws: &mut Server) -> Frame {
    loop {
        match ws.next().await.unwrap().unwrap() {
            Message::Binary(bytes) => return decode_frame(&bytes).unwrap(),
            _ => continue,
        }
    }
}

fn stroke() -> SyncEvent {
    SyncEvent::Draw(StrokeSegment { x0: 0.1, y0: 0.2, x1: 0.3, y1: 0.4, color: "#000".into(), line_width: 1.0 })
}

async fn recv_within(inbox: &mut WsInbox) -> Option<Incoming> {
    tokio::time::timeout(Duration::from_secs(2), inbox.recv()).await.unwrap()
}

#[tokio::test]
async fn connect_reads_assigned_id() {
    let base = relay(|mut ws| async move {
        ws.send(binary(&Frame::new(ROOM_JOIN, json!({ "id": "other" })))).await.unwrap();
        ws.send(welcome("p-42")).await.unwrap();
        let _ = ws.next().await;
    })
    .await;

    let link = connect(&base, "r1", Role::Student, "sam").await.unwrap();
    assert_eq!(link.id, "p-42");
}

#[tokio::test]
async fn connect_surfaces_relay_rejection() {
    let base = relay(|mut ws| async move {
        ws.send(binary(&Frame::error("E_ROOM_INVALID", "bad room"))).await.unwrap();
        let _ = ws.next().await;
    })
    .await;

    let err = connect(&base, "r1", Role::Student, "sam").await.unwrap_err();
    match err {
        NetError::Rejected { code, message } => {
            assert_eq!(code, "E_ROOM_INVALID");
            assert_eq!(message, "bad room");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn connect_fails_when_socket_closes_before_welcome() {
    let base = relay(|mut ws| async move {
        ws.close(None).await.unwrap();
    })
    .await;
    assert!(matches!(connect(&base, "r1", Role::Tutor, "t").await, Err(NetError::WsClosed)));
}

#[tokio::test]
async fn outbound_frames_carry_room_and_addressee() {
    let (tx, mut rx) = mpsc::channel(4);
    let base = relay(move |mut ws| async move {
        ws.send(welcome("tutor-1")).await.unwrap();
        for _ in 0..2 {
            let frame = next_frame(&mut ws).await;
            tx.send(frame).await.unwrap();
        }
    })
    .await;

    let link = connect(&base, "r1", Role::Tutor, "ada").await.unwrap();
    link.out.publish(stroke()).await.unwrap();
    link.out.send_to("s-7", SyncEvent::BroadcastStarted).await.unwrap();

    let first = rx.recv().await.unwrap();
    assert_eq!(first.event, "draw");
    assert_eq!(first.room.as_deref(), Some("r1"));
    assert_eq!(first.to, None);
    assert_eq!(SyncEvent::from_frame(&first).unwrap(), stroke());

    let second = rx.recv().await.unwrap();
    assert_eq!(second.event, "broadcast-started");
    assert_eq!(second.to.as_deref(), Some("s-7"));
}

#[tokio::test]
async fn inbox_yields_events_and_departures() {
    let base = relay(|mut ws| async move {
        ws.send(welcome("s-1")).await.unwrap();
        ws.send(binary(&Frame::new(ROOM_JOIN, json!({ "id": "s-2" })))).await.unwrap();
        ws.send(binary(&stroke().into_frame("r1").unwrap().with_from("tutor-1"))).await.unwrap();
        ws.send(binary(&Frame::new("draw", json!({ "x0": "nope" })).with_from("tutor-1"))).await.unwrap();
        ws.send(Message::Binary(vec![0xff, 0xff, 0xff].into())).await.unwrap();
        ws.send(binary(&Frame::error("E_FORBIDDEN", "students may not draw"))).await.unwrap();
        ws.send(binary(&Frame::new(ROOM_PART, json!({ "id": "tutor-1" })))).await.unwrap();
        ws.close(None).await.unwrap();
    })
    .await;

    let mut link = connect(&base, "r1", Role::Student, "sam").await.unwrap();

    let got = recv_within(&mut link.inbox).await;
    assert_eq!(got, Some(Incoming::Event(Inbound { from: Some("tutor-1".into()), event: stroke() })));
    let got = recv_within(&mut link.inbox).await;
    assert_eq!(got, Some(Incoming::PeerLeft("tutor-1".into())));
    assert_eq!(recv_within(&mut link.inbox).await, None);
}

#[test]
fn classify_skips_own_echo() {
    let frame = SyncEvent::Clear.into_frame("r1").unwrap().with_from("me");
    assert_eq!(classify(&frame, "me"), None);
    assert_eq!(
        classify(&frame, "someone-else"),
        Some(Incoming::Event(Inbound { from: Some("me".into()), event: SyncEvent::Clear }))
    );
}

#[test]
fn classify_ignores_part_without_id() {
    assert_eq!(classify(&Frame::new(ROOM_PART, json!({})), "me"), None);
}
