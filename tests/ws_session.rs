mod support;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect() -> Socket {
    let (socket, _) = connect_async(support::ws_url())
        .await
        .expect("websocket handshake");
    socket
}

async fn send_json(socket: &mut Socket, value: Value) {
    socket
        .send(Message::Text(value.to_string().into()))
        .await
        .expect("send frame");
}

// Read frames until one matches, skipping everything else the world broadcasts meanwhile.
async fn next_matching<F>(socket: &mut Socket, mut accept: F) -> Value
where
    F: FnMut(&Value) -> bool,
{
    let wait = async {
        loop {
            let msg = socket
                .next()
                .await
                .expect("socket closed early")
                .expect("websocket error");
            let Ok(text) = msg.to_text() else {
                continue;
            };
            let Ok(value) = serde_json::from_str::<Value>(text) else {
                continue;
            };
            if accept(&value) {
                return value;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("expected frame did not arrive in time")
}

fn unique_player_id(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
}

#[tokio::test]
async fn when_client_inits_then_receives_init_and_game_state() {
    let mut socket = connect().await;
    let player_id = unique_player_id("init");

    send_json(&mut socket, json!({"type": "init", "data": {"playerId": player_id}})).await;

    let init = next_matching(&mut socket, |v| v["type"] == "init").await;
    let player = &init["data"]["playerData"];
    assert_eq!(player["playerId"], player_id.as_str());
    assert_eq!(player["level"], 1);
    assert_eq!(player["exp"], 0);
    assert!(init["data"]["enemies"].is_object());

    let state = next_matching(&mut socket, |v| {
        v["type"] == "gameState" && !v["data"]["players"][player_id.as_str()].is_null()
    })
    .await;
    assert!(state["data"]["tick"].as_u64().is_some());
}

#[tokio::test]
async fn when_client_sends_movement_then_position_changes_in_broadcast() {
    let mut socket = connect().await;
    let player_id = unique_player_id("mover");

    send_json(&mut socket, json!({"type": "init", "data": {"playerId": player_id}})).await;
    let init = next_matching(&mut socket, |v| v["type"] == "init").await;
    let start_x = init["data"]["playerData"]["position"]["x"]
        .as_f64()
        .expect("spawn x");

    send_json(
        &mut socket,
        json!({"type": "playerInput", "data": {"right": true, "direction": "right"}}),
    )
    .await;

    let moved = next_matching(&mut socket, |v| {
        v["type"] == "gameState"
            && v["data"]["players"][player_id.as_str()]["position"]["x"]
                .as_f64()
                .is_some_and(|x| x > start_x)
    })
    .await;
    assert_eq!(
        moved["data"]["players"][player_id.as_str()]["direction"],
        "right"
    );
}

#[tokio::test]
async fn when_client_chats_then_message_is_broadcast_to_others() {
    let mut speaker = connect().await;
    let mut listener = connect().await;
    let speaker_id = unique_player_id("speaker");
    let listener_id = unique_player_id("listener");

    send_json(&mut speaker, json!({"type": "init", "data": {"playerId": speaker_id}})).await;
    send_json(&mut listener, json!({"type": "init", "data": {"playerId": listener_id}})).await;
    next_matching(&mut speaker, |v| v["type"] == "init").await;
    next_matching(&mut listener, |v| v["type"] == "init").await;

    send_json(&mut speaker, json!({"type": "chatMessage", "data": {"text": "  hello realm  "}})).await;

    let chat = next_matching(&mut listener, |v| {
        v["type"] == "chatMessage" && v["data"]["id"] == speaker_id.as_str()
    })
    .await;
    assert_eq!(chat["data"]["message"], "hello realm");
}

#[tokio::test]
async fn when_client_disconnects_then_others_see_player_left() {
    let mut leaver = connect().await;
    let mut watcher = connect().await;
    let leaver_id = unique_player_id("leaver");
    let watcher_id = unique_player_id("watcher");

    send_json(&mut leaver, json!({"type": "init", "data": {"playerId": leaver_id}})).await;
    send_json(&mut watcher, json!({"type": "init", "data": {"playerId": watcher_id}})).await;
    next_matching(&mut leaver, |v| v["type"] == "init").await;
    next_matching(&mut watcher, |v| v["type"] == "init").await;

    leaver.close(None).await.expect("close handshake");

    let left = next_matching(&mut watcher, |v| {
        v["type"] == "playerLeft" && v["data"]["playerId"] == leaver_id.as_str()
    })
    .await;
    assert_eq!(left["data"]["playerId"], leaver_id.as_str());
}
