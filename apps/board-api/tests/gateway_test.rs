mod common;

use std::net::SocketAddr;
use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::time;
use tokio_tungstenite::tungstenite;

use crewboard_common::chat::ChatMessageRecord;
use crewboard_common::task::{TaskRecord, TaskStatus};
use crewboard_common::{DomainEvent, TaskDeleted};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Start an actual TCP server for WebSocket testing. The server runs in the
/// background; events are published straight into the fan-out hub.
async fn start_ws_server() -> (SocketAddr, board_api::AppState) {
    let state = common::test_state();
    let app = board_api::routes::router().with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

/// Connect to the gateway and IDENTIFY. Returns the stream after READY.
async fn connect_and_identify(addr: SocketAddr, user_id: &str, display_name: &str) -> WsStream {
    let token = common::mint_token(user_id, display_name);
    let url = format!("ws://{addr}/gateway");
    let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");

    let (mut write, mut read) = ws_stream.split();

    let identify = serde_json::json!({
        "op": 2,
        "d": { "token": token }
    });
    write
        .send(tungstenite::Message::Text(identify.to_string().into()))
        .await
        .expect("send identify");

    let ready = next_json(&mut read).await.expect("READY frame");
    assert_eq!(ready["op"], 0, "READY should be op=0 (DISPATCH)");
    assert_eq!(ready["t"], "ready");
    assert_eq!(ready["d"]["user"]["id"], user_id);

    read.reunite(write).expect("reunite")
}

/// Read the next text frame as JSON, with a timeout.
async fn next_json<S>(read: &mut S) -> Option<serde_json::Value>
where
    S: Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    loop {
        let msg = time::timeout(Duration::from_secs(5), read.next())
            .await
            .ok()??
            .ok()?;
        match msg {
            tungstenite::Message::Text(text) => {
                return serde_json::from_str(&text).ok();
            }
            tungstenite::Message::Close(_) => return None,
            _ => continue,
        }
    }
}

/// Join a room and wait for a heartbeat ack; the ack proves the JOIN was
/// processed, since the session loop handles frames in order.
async fn join_room(stream: &mut WsStream, project_id: &str) {
    stream
        .send(tungstenite::Message::Text(
            serde_json::json!({ "op": 3, "d": { "project_id": project_id } })
                .to_string()
                .into(),
        ))
        .await
        .expect("send join");

    stream
        .send(tungstenite::Message::Text(
            serde_json::json!({ "op": 1, "d": { "seq": 1 } }).to_string().into(),
        ))
        .await
        .expect("send heartbeat");

    let ack = next_json(stream).await.expect("heartbeat ack");
    assert_eq!(ack["op"], 6);
}

/// Assert no frame arrives within a short window.
async fn assert_silent(stream: &mut WsStream) {
    let result = time::timeout(Duration::from_millis(300), stream.next()).await;
    assert!(result.is_err(), "expected no frame, got {result:?}");
}

fn task_event(project_id: &str, id: i64, content: &str) -> DomainEvent {
    DomainEvent::TaskCreated(TaskRecord {
        id,
        project_id: project_id.to_string(),
        content: content.to_string(),
        status: TaskStatus::ToDo,
        assignee: None,
        due_date: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn identify_returns_ready() {
    let (addr, _state) = start_ws_server().await;
    let token = common::mint_token("usr_gw1", "Gateway One");

    let url = format!("ws://{addr}/gateway");
    let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");
    let (mut write, mut read) = ws_stream.split();

    let identify = serde_json::json!({ "op": 2, "d": { "token": token } });
    write
        .send(tungstenite::Message::Text(identify.to_string().into()))
        .await
        .expect("send identify");

    let ready = next_json(&mut read).await.expect("READY");
    assert_eq!(ready["op"], 0);
    assert_eq!(ready["t"], "ready");

    let d = &ready["d"];
    assert!(d["session_id"].as_str().unwrap().starts_with("ses_"));
    assert_eq!(d["user"]["id"], "usr_gw1");
    assert_eq!(d["user"]["display_name"], "Gateway One");
    assert!(d["heartbeat_interval"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn invalid_token_is_rejected_with_close() {
    let (addr, _state) = start_ws_server().await;

    let url = format!("ws://{addr}/gateway");
    let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");
    let (mut write, mut read) = ws_stream.split();

    let identify = serde_json::json!({ "op": 2, "d": { "token": "garbage" } });
    write
        .send(tungstenite::Message::Text(identify.to_string().into()))
        .await
        .expect("send identify");

    let msg = time::timeout(Duration::from_secs(5), read.next())
        .await
        .expect("timeout")
        .expect("stream ended")
        .expect("read error");

    match msg {
        tungstenite::Message::Close(Some(frame)) => {
            assert_eq!(u16::from(frame.code), 4004);
        }
        other => panic!("expected close frame, got {other:?}"),
    }
}

#[tokio::test]
async fn events_reach_only_joined_rooms() {
    let (addr, state) = start_ws_server().await;

    let mut s1 = connect_and_identify(addr, "usr_bob", "Bob").await;
    let mut s2 = connect_and_identify(addr, "usr_carol", "Carol").await;

    join_room(&mut s1, "prj_a").await;
    join_room(&mut s2, "prj_b").await;

    state.broadcast.publish("prj_a", task_event("prj_a", 1, "for room a"));

    let frame = next_json(&mut s1).await.expect("dispatch for s1");
    assert_eq!(frame["op"], 0);
    assert_eq!(frame["t"], "taskCreated");
    assert_eq!(frame["d"]["project_id"], "prj_a");

    // A session joined only to room B never observes room A's event.
    assert_silent(&mut s2).await;
}

#[tokio::test]
async fn events_arrive_in_publish_order() {
    let (addr, state) = start_ws_server().await;

    let mut s1 = connect_and_identify(addr, "usr_bob", "Bob").await;
    join_room(&mut s1, "prj_a").await;

    for id in 1..=5 {
        state.broadcast.publish("prj_a", task_event("prj_a", id, "ordered"));
    }

    for expected in 1..=5 {
        let frame = next_json(&mut s1).await.expect("dispatch");
        assert_eq!(frame["d"]["id"], expected);
    }
}

#[tokio::test]
async fn all_event_kinds_are_dispatched_with_wire_names() {
    let (addr, state) = start_ws_server().await;

    let mut s1 = connect_and_identify(addr, "usr_bob", "Bob").await;
    join_room(&mut s1, "prj_a").await;

    state.broadcast.publish("prj_a", task_event("prj_a", 1, "create"));
    state.broadcast.publish(
        "prj_a",
        DomainEvent::TaskDeleted(TaskDeleted {
            id: 1,
            project_id: "prj_a".to_string(),
        }),
    );
    state.broadcast.publish(
        "prj_a",
        DomainEvent::ChatMessageSent(ChatMessageRecord {
            id: 7,
            project_id: "prj_a".to_string(),
            user_id: "usr_carol".to_string(),
            user_name: "Carol".to_string(),
            content: "hi @Bob".to_string(),
            created_at: Utc::now(),
        }),
    );

    let frame = next_json(&mut s1).await.expect("taskCreated");
    assert_eq!(frame["t"], "taskCreated");
    let frame = next_json(&mut s1).await.expect("taskDeleted");
    assert_eq!(frame["t"], "taskDeleted");
    let frame = next_json(&mut s1).await.expect("receiveMessage");
    assert_eq!(frame["t"], "receiveMessage");
    assert_eq!(frame["d"]["id"], 7);
}

#[tokio::test]
async fn leave_stops_delivery() {
    let (addr, state) = start_ws_server().await;

    let mut s1 = connect_and_identify(addr, "usr_bob", "Bob").await;
    join_room(&mut s1, "prj_a").await;

    state.broadcast.publish("prj_a", task_event("prj_a", 1, "before leave"));
    assert_eq!(next_json(&mut s1).await.expect("dispatch")["d"]["id"], 1);

    s1.send(tungstenite::Message::Text(
        serde_json::json!({ "op": 4, "d": { "project_id": "prj_a" } })
            .to_string()
            .into(),
    ))
    .await
    .expect("send leave");

    // Heartbeat ack proves the LEAVE was processed.
    s1.send(tungstenite::Message::Text(
        serde_json::json!({ "op": 1, "d": { "seq": 2 } }).to_string().into(),
    ))
    .await
    .expect("send heartbeat");
    assert_eq!(next_json(&mut s1).await.expect("ack")["op"], 6);

    state.broadcast.publish("prj_a", task_event("prj_a", 2, "after leave"));
    assert_silent(&mut s1).await;
}

#[tokio::test]
async fn disconnect_removes_session_from_registry() {
    let (addr, state) = start_ws_server().await;

    let mut s1 = connect_and_identify(addr, "usr_bob", "Bob").await;
    join_room(&mut s1, "prj_a").await;
    assert_eq!(state.rooms.members_of("prj_a").len(), 1);

    s1.close(None).await.expect("close");

    // Give the server loop a moment to observe the close.
    for _ in 0..50 {
        if state.rooms.members_of("prj_a").is_empty() {
            break;
        }
        time::sleep(Duration::from_millis(20)).await;
    }
    assert!(state.rooms.members_of("prj_a").is_empty());
    assert_eq!(state.rooms.session_count(), 0);
}

#[tokio::test]
async fn unknown_opcode_closes_the_connection() {
    let (addr, _state) = start_ws_server().await;

    let mut s1 = connect_and_identify(addr, "usr_bob", "Bob").await;
    s1.send(tungstenite::Message::Text(
        serde_json::json!({ "op": 42, "d": {} }).to_string().into(),
    ))
    .await
    .expect("send bogus opcode");

    let msg = time::timeout(Duration::from_secs(5), s1.next())
        .await
        .expect("timeout")
        .expect("stream ended")
        .expect("read error");

    match msg {
        tungstenite::Message::Close(Some(frame)) => {
            assert_eq!(u16::from(frame.code), 4001);
        }
        other => panic!("expected close frame, got {other:?}"),
    }
}
