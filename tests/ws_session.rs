mod support;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(10);

async fn connect(lobby_id: &str) -> Ws {
    let (ws, _response) = connect_async(support::ws_url(lobby_id))
        .await
        .expect("websocket should connect");
    ws
}

async fn send(ws: &mut Ws, message: Value) {
    ws.send(Message::text(message.to_string()))
        .await
        .expect("send should succeed");
}

// Next JSON text frame from the server.
async fn recv(ws: &mut Ws) -> Value {
    loop {
        let frame = tokio::time::timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("server should answer in time")
            .expect("stream should stay open")
            .expect("frame should be valid");
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).expect("server sends json");
        }
    }
}

// Skips frames until a notice of the given kind arrives.
async fn recv_notice(ws: &mut Ws, kind: &str) -> Value {
    loop {
        let message = recv(ws).await;
        if message["type"] == "Notice" && message["data"]["kind"] == kind {
            return message["data"].clone();
        }
    }
}

async fn join(ws: &mut Ws, display_name: &str) -> (String, Value) {
    send(ws, json!({ "type": "Join", "data": { "display_name": display_name } })).await;
    let identity = recv(ws).await;
    assert_eq!(identity["type"], "Identity");
    let snapshot = recv(ws).await;
    assert_eq!(snapshot["type"], "Snapshot");
    let player_id = identity["data"]["player_id"]
        .as_str()
        .expect("player id is a string")
        .to_string();
    (player_id, snapshot)
}

#[tokio::test]
async fn when_client_joins_then_receives_identity_and_snapshot() {
    let lobby_id = support::create_lobby().await;
    let mut ws = connect(&lobby_id).await;

    let (player_id, snapshot) = join(&mut ws, "Ana").await;

    assert!(player_id.parse::<u64>().is_ok());
    let updates = snapshot["data"]["updates"]
        .as_array()
        .expect("snapshot carries updates");
    let phase = updates
        .iter()
        .find(|u| u["field"] == "phase")
        .expect("phase is replicated");
    assert_eq!(phase["value"], "waiting_for_players");
    assert!(updates.iter().any(|u| u["field"] == "lives" && u["slot"] == 1));
}

#[tokio::test]
async fn when_first_message_is_not_join_then_socket_is_closed() {
    let lobby_id = support::create_lobby().await;
    let mut ws = connect(&lobby_id).await;

    send(&mut ws, json!({ "type": "LeftBounds" })).await;

    let frame = tokio::time::timeout(RECV_TIMEOUT, ws.next())
        .await
        .expect("server should answer in time");
    match frame {
        Some(Ok(Message::Close(Some(close)))) => assert_eq!(close.reason.as_str(), "join required"),
        other => panic!("expected close frame, got {other:?}"),
    }
}

#[tokio::test]
async fn when_lobby_is_unknown_then_upgrade_is_rejected() {
    let result = connect_async(support::ws_url("no-such-lobby")).await;

    match result {
        Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
            assert_eq!(response.status(), 404);
        }
        other => panic!("expected http 404, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn when_both_players_ready_then_match_starts() {
    let lobby_id = support::create_lobby().await;
    let mut first = connect(&lobby_id).await;
    let mut second = connect(&lobby_id).await;
    join(&mut first, "Ana").await;
    join(&mut second, "Bo").await;

    send(&mut first, json!({ "type": "Ready", "data": { "display_name": "" } })).await;
    let ready = recv_notice(&mut first, "ready_changed").await;
    assert_eq!(ready["slot"], 1);
    assert_eq!(ready["ready"], true);
    assert_eq!(ready["display_name"], "Ana");

    send(&mut second, json!({ "type": "Ready", "data": { "display_name": "Bo" } })).await;

    recv_notice(&mut first, "match_started").await;
    recv_notice(&mut second, "match_started").await;
    let spawned = recv_notice(&mut first, "enemy_spawned").await;
    assert!(spawned["enemy_id"].is_string());
}
