//! End-to-end session tests against a live server over real WebSockets.

use std::sync::Arc;
use std::time::Duration;

use coderoom::{router_with_sync, RoomRegistry, RoomStore, SyncState};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server() -> (String, SyncState, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(RoomStore::open(dir.path()).await.unwrap());
    let registry = Arc::new(RoomRegistry::new(store));
    let state = SyncState::new(registry);

    let app = router_with_sync(state.clone()).with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("127.0.0.1:{}", addr.port()), state, dir)
}

async fn connect(addr: &str, room_id: &str) -> Client {
    let url = format!("ws://{}/ws/{}", addr, room_id);
    let (client, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    client
}

async fn next_json(client: &mut Client) -> Value {
    let message = timeout(Duration::from_secs(2), client.next())
        .await
        .expect("timed out waiting for a message")
        .expect("stream ended")
        .expect("websocket error");

    match message {
        Message::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected a text frame, got {:?}", other),
    }
}

async fn send_json(client: &mut Client, value: Value) {
    client.send(Message::Text(value.to_string())).await.unwrap();
}

#[tokio::test]
async fn two_clients_share_a_room() {
    let (addr, state, _dir) = start_server().await;
    let room = state.registry().store().create("python").await.unwrap();

    let mut c1 = connect(&addr, &room.id).await;
    let sync = next_json(&mut c1).await;
    assert_eq!(sync["type"], "sync");
    assert_eq!(sync["code"], room.code.as_str());
    assert_eq!(sync["language"], "python");
    let count = next_json(&mut c1).await;
    assert_eq!(count["type"], "user_count");
    assert_eq!(count["count"], 1);

    let mut c2 = connect(&addr, &room.id).await;
    assert_eq!(next_json(&mut c2).await["type"], "sync");
    assert_eq!(next_json(&mut c2).await["count"], 2);
    assert_eq!(next_json(&mut c1).await["count"], 2);

    // An edit from c1 reaches c2 but never echoes back to c1
    send_json(&mut c1, json!({"type": "code_update", "code": "x = 1"})).await;
    let update = next_json(&mut c2).await;
    assert_eq!(update["type"], "code_update");
    assert_eq!(update["code"], "x = 1");

    // c2 leaves; the next message c1 sees is the count drop, proving no
    // echo of its own edit ever arrived in between
    c2.close(None).await.unwrap();
    let after_leave = next_json(&mut c1).await;
    assert_eq!(after_leave["type"], "user_count");
    assert_eq!(after_leave["count"], 1);
}

#[tokio::test]
async fn join_to_unknown_room_is_refused() {
    let (addr, state, _dir) = start_server().await;

    let mut client = connect(&addr, "does-not-exist").await;
    let message = timeout(Duration::from_secs(2), client.next())
        .await
        .expect("timed out waiting for close")
        .expect("stream ended")
        .expect("websocket error");

    match message {
        Message::Close(Some(frame)) => {
            assert_eq!(u16::from(frame.code), 4004);
            assert_eq!(frame.reason, "Room not found");
        }
        other => panic!("expected a close frame, got {:?}", other),
    }

    // The refused join must not leave a registry entry behind
    assert!(!state.registry().contains("does-not-exist"));
}

#[tokio::test]
async fn accepted_edits_reach_the_store() {
    let (addr, state, _dir) = start_server().await;
    let room = state.registry().store().create("python").await.unwrap();

    let mut c1 = connect(&addr, &room.id).await;
    next_json(&mut c1).await;
    next_json(&mut c1).await;

    send_json(&mut c1, json!({"type": "code_update", "code": "x = 1"})).await;

    let store = Arc::clone(state.registry().store());
    let saved = timeout(Duration::from_secs(2), async {
        loop {
            if store.load(&room.id).await.unwrap().code == "x = 1" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(saved.is_ok(), "edit never reached the store");

    let snapshots = store.read_snapshots(&room.id).await.unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].code, "x = 1");
}

#[tokio::test]
async fn malformed_and_unknown_messages_keep_the_session_alive() {
    let (addr, state, _dir) = start_server().await;
    let room = state.registry().store().create("python").await.unwrap();

    let mut c1 = connect(&addr, &room.id).await;
    let mut c2 = connect(&addr, &room.id).await;
    next_json(&mut c1).await;
    next_json(&mut c1).await;
    next_json(&mut c1).await;
    next_json(&mut c2).await;
    next_json(&mut c2).await;

    c1.send(Message::Text("not json".to_string())).await.unwrap();
    send_json(&mut c1, json!({"type": "cursor_moved", "position": 3})).await;
    send_json(&mut c1, json!({"type": "code_update", "code": "x = 1"})).await;

    // Only the valid edit arrives; the garbage was dropped silently
    let update = next_json(&mut c2).await;
    assert_eq!(update["type"], "code_update");
    assert_eq!(update["code"], "x = 1");
    assert_eq!(state.connections().count(&room.id).await, 2);
}

#[tokio::test]
async fn rooms_are_isolated_from_each_other() {
    let (addr, state, _dir) = start_server().await;
    let room_a = state.registry().store().create("python").await.unwrap();
    let room_b = state.registry().store().create("python").await.unwrap();

    let mut c_a = connect(&addr, &room_a.id).await;
    let mut c_b = connect(&addr, &room_b.id).await;
    next_json(&mut c_a).await;
    next_json(&mut c_a).await;
    next_json(&mut c_b).await;
    next_json(&mut c_b).await;

    send_json(&mut c_a, json!({"type": "code_update", "code": "x = 1"})).await;

    // Room B never hears about room A's edit
    let quiet = timeout(Duration::from_millis(300), c_b.next()).await;
    assert!(quiet.is_err(), "room B received a message from room A");

    let handle_b = state.registry().get(&room_b.id).await.unwrap();
    assert_eq!(handle_b.code(), room_b.code);
}
