//! WebSocket channel tests against a real listener.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use notes_api::WsState;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{protocol::frame::coding::CloseCode, Message},
    MaybeTlsStream, WebSocketStream,
};

#[path = "support/app.rs"]
mod test_app_support;
use test_app_support::{test_config, TestApp};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

async fn serve(app: &TestApp) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let service = app
        .router
        .clone()
        .into_make_service_with_connect_info::<SocketAddr>();
    tokio::spawn(async move {
        axum::serve(listener, service).await.expect("server runs");
    });
    addr
}

async fn connect(addr: SocketAddr, path: &str) -> Client {
    let (client, _) = connect_async(format!("ws://{}{}", addr, path))
        .await
        .expect("websocket handshake");
    client
}

/// The upgrade completes before the server subscribes the socket.
async fn wait_for_connections(state: &WsState, expected: usize) {
    tokio::time::timeout(RECV_TIMEOUT, async {
        while state.connection_count() < expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("connections registered");
}

async fn next_message(client: &mut Client) -> Message {
    tokio::time::timeout(RECV_TIMEOUT, client.next())
        .await
        .expect("message before timeout")
        .expect("stream open")
        .expect("valid frame")
}

async fn next_json(client: &mut Client) -> Value {
    match next_message(client).await {
        Message::Text(text) => serde_json::from_str(&text).expect("json event"),
        other => panic!("expected text frame, got {:?}", other),
    }
}

#[tokio::test]
async fn test_lobby_rebroadcasts_text_verbatim() {
    let app = TestApp::new(test_config());
    let addr = serve(&app).await;

    let mut sender = connect(addr, "/ws").await;
    let mut listener = connect(addr, "/ws").await;
    wait_for_connections(&app.state.ws_lobby, 2).await;

    sender
        .send(Message::Text("hello {not json".into()))
        .await
        .expect("send");

    assert_eq!(next_message(&mut listener).await, Message::Text("hello {not json".into()));
    assert_eq!(next_message(&mut sender).await, Message::Text("hello {not json".into()));
}

#[tokio::test]
async fn test_chat_welcomes_and_broadcasts() {
    let app = TestApp::new(test_config());
    let alice_token = app.token_for("alice").await;
    let bob_token = app.token_for("bob").await;
    let addr = serve(&app).await;

    let mut alice = connect(addr, &format!("/ws/chat?token={}", alice_token)).await;
    let welcome = next_json(&mut alice).await;
    assert_eq!(welcome["type"], "system");
    assert_eq!(welcome["message"], "Welcome, alice!");

    let mut bob = connect(addr, &format!("/ws/chat?token={}", bob_token)).await;
    assert_eq!(next_json(&mut bob).await["message"], "Welcome, bob!");

    alice
        .send(Message::Text(r#"{"content":"hi bob"}"#.into()))
        .await
        .expect("send");

    for client in [&mut bob, &mut alice] {
        let event = next_json(client).await;
        assert_eq!(event["type"], "message");
        assert_eq!(event["username"], "alice");
        assert_eq!(event["message"], "hi bob");
        assert!(event["timestamp"].is_string());
    }
}

#[tokio::test]
async fn test_chat_invalid_json_errors_to_sender_only() {
    let app = TestApp::new(test_config());
    let alice_token = app.token_for("alice").await;
    let bob_token = app.token_for("bob").await;
    let addr = serve(&app).await;

    let mut alice = connect(addr, &format!("/ws/chat?token={}", alice_token)).await;
    next_json(&mut alice).await;
    let mut bob = connect(addr, &format!("/ws/chat?token={}", bob_token)).await;
    next_json(&mut bob).await;

    alice.send(Message::Text("not json".into())).await.expect("send");
    let error = next_json(&mut alice).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["message"], "Invalid JSON format");

    // The connection stays usable and bob saw nothing before this message.
    alice
        .send(Message::Text(r#"{"content":"still here"}"#.into()))
        .await
        .expect("send");
    let first_for_bob = next_json(&mut bob).await;
    assert_eq!(first_for_bob["type"], "message");
    assert_eq!(first_for_bob["message"], "still here");
}

#[tokio::test]
async fn test_chat_rejects_bad_token_with_policy_close() {
    let app = TestApp::new(test_config());
    let addr = serve(&app).await;

    for path in ["/ws/chat?token=not-a-jwt", "/ws/chat"] {
        let mut client = connect(addr, path).await;
        match next_message(&mut client).await {
            Message::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Policy, "{}", path),
            other => panic!("expected close frame for {}, got {:?}", path, other),
        }
    }
}
