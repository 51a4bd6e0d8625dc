//! WebSocket Broadcasting
//!
//! Two independent channels fan messages out to every connected client:
//!
//! - `/ws`: anonymous lobby. Each text frame is rebroadcast verbatim.
//! - `/ws/chat?token=<jwt>`: authenticated chat. Frames are JSON
//!   `{"content": "..."}` and go out as `{"type":"message",...}` events.
//!
//! ## Architecture
//!
//! - One tokio broadcast channel per endpoint holds the connection set
//! - A connection is a subscriber; dropping it removes it from the set
//! - Slow subscribers lag and skip the missed messages, nothing is replayed

use std::sync::Arc;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::{Html, IntoResponse, Response},
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use notes_storage::Storage;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::auth::{authenticate_token, AuthConfig, AuthContext};
use crate::telemetry::with_metrics;

// ============================================================================
// EVENTS
// ============================================================================

/// A message fanned out over a channel.
///
/// `Text` goes on the wire as-is; every other variant is a JSON object tagged
/// by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WsEvent {
    System {
        message: String,
    },
    Message {
        username: String,
        message: String,
        /// RFC 3339 send time.
        timestamp: String,
    },
    Error {
        message: String,
    },
    #[serde(skip)]
    Text(String),
}

impl WsEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            WsEvent::System { .. } => "system",
            WsEvent::Message { .. } => "message",
            WsEvent::Error { .. } => "error",
            WsEvent::Text(_) => "text",
        }
    }

    /// Chat message from `username`, stamped now.
    pub fn chat(username: impl Into<String>, message: impl Into<String>) -> Self {
        WsEvent::Message {
            username: username.into(),
            message: message.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Wire form of the event.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        match self {
            WsEvent::Text(text) => Ok(text.clone()),
            other => serde_json::to_string(other),
        }
    }
}

/// Incoming chat frame.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatInput {
    pub content: String,
}

// ============================================================================
// STATE
// ============================================================================

/// One broadcast channel and its subscribers.
#[derive(Debug, Clone)]
pub struct WsState {
    tx: broadcast::Sender<WsEvent>,
    channel: &'static str,
}

impl WsState {
    /// Create a channel buffering up to `capacity` messages per subscriber.
    pub fn new(channel: &'static str, capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx, channel }
    }

    pub fn channel(&self) -> &'static str {
        self.channel
    }

    /// Send an event to every subscriber. Without subscribers the event is
    /// dropped.
    pub fn broadcast(&self, event: WsEvent) {
        let event_type = event.event_type();
        match self.tx.send(event) {
            Ok(receivers) => debug!(
                channel = self.channel,
                event_type,
                receivers,
                "Broadcast event"
            ),
            Err(_) => debug!(channel = self.channel, event_type, "No receivers for event"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WsEvent> {
        self.tx.subscribe()
    }

    /// Number of open connections on this channel.
    pub fn connection_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// State for the authenticated chat endpoint.
#[derive(Clone)]
pub struct ChatState {
    pub ws: Arc<WsState>,
    pub auth_config: Arc<AuthConfig>,
    pub storage: Arc<dyn Storage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatParams {
    pub token: Option<String>,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// `GET /ws`: anonymous lobby that echoes every text frame to all clients.
pub async fn lobby_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<WsState>>,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        run_connection(socket, state, None).await;
    })
}

/// `GET /ws/chat?token=<jwt>`: authenticated chat.
///
/// The token is checked after the upgrade so the rejection can be a close
/// frame with code 1008.
pub async fn chat_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<ChatState>,
    Query(params): Query<ChatParams>,
) -> Response {
    ws.on_upgrade(move |socket| handle_chat_socket(socket, state, params.token))
}

async fn handle_chat_socket(mut socket: WebSocket, state: ChatState, token: Option<String>) {
    let auth = match token {
        Some(token) => {
            authenticate_token(&state.auth_config, state.storage.as_ref(), &token).await
        }
        None => Err(crate::error::ApiError::unauthorized("Missing token")),
    };

    let auth = match auth {
        Ok(auth) => auth,
        Err(e) => {
            info!(error = %e, "Rejecting chat connection");
            let close = Message::Close(Some(CloseFrame {
                code: close_code::POLICY,
                reason: "Invalid or missing token".into(),
            }));
            if let Err(e) = socket.send(close).await {
                debug!(error = %e, "Failed to send close frame");
            }
            return;
        }
    };

    run_connection(socket, state.ws, Some(auth)).await;
}

/// Drive one connection until either side closes.
///
/// With `auth`, frames are parsed as chat input; without it they are
/// rebroadcast verbatim.
async fn run_connection(socket: WebSocket, state: Arc<WsState>, auth: Option<AuthContext>) {
    let channel = state.channel();
    let user = auth.as_ref().map(|a| a.username.clone());
    info!(channel, user = ?user, "WebSocket connected");
    with_metrics(|m| m.ws_connected(channel));

    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.subscribe();

    if let Some(auth) = &auth {
        let welcome = WsEvent::System {
            message: format!("Welcome, {}!", auth.username),
        };
        if send_event(&mut sender, &welcome).await.is_err() {
            with_metrics(|m| m.ws_disconnected(channel));
            return;
        }
    }

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let Some(auth) = &auth else {
                            state.broadcast(WsEvent::Text(text));
                            continue;
                        };
                        match serde_json::from_str::<ChatInput>(&text) {
                            Ok(input) => state.broadcast(WsEvent::chat(auth.username.clone(), input.content)),
                            Err(e) => {
                                debug!(channel, error = %e, "Invalid chat frame");
                                let error = WsEvent::Error {
                                    message: "Invalid JSON format".to_string(),
                                };
                                if send_event(&mut sender, &error).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        debug!(channel, len = data.len(), "Ignoring binary frame");
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(channel, "Client closed connection");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(channel, error = %e, "WebSocket receive error");
                        break;
                    }
                }
            }

            outgoing = rx.recv() => {
                match outgoing {
                    Ok(event) => {
                        if send_event(&mut sender, &event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(channel, skipped, "Client lagged, messages dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    with_metrics(|m| m.ws_disconnected(channel));
    info!(channel, user = ?user, "WebSocket disconnected");
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &WsEvent,
) -> Result<(), axum::Error> {
    let text = event.to_text().map_err(axum::Error::new)?;
    sender.send(Message::Text(text)).await.map_err(|e| {
        debug!(error = %e, "Failed to send WebSocket message");
        e
    })
}

/// `GET /ws-test`: minimal browser client for the chat channel.
pub async fn ws_test_page() -> impl IntoResponse {
    Html(WS_TEST_PAGE)
}

const WS_TEST_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Notes chat</title>
</head>
<body>
  <h1>Notes chat</h1>
  <p>
    <input id="token" placeholder="access token" size="60">
    <button onclick="connect()">Connect</button>
  </p>
  <p>
    <input id="message" placeholder="message" size="60">
    <button onclick="send()">Send</button>
  </p>
  <ul id="log"></ul>
  <script>
    let socket;
    function log(text) {
      const item = document.createElement("li");
      item.textContent = text;
      document.getElementById("log").appendChild(item);
    }
    function connect() {
      const token = encodeURIComponent(document.getElementById("token").value);
      const scheme = location.protocol === "https:" ? "wss" : "ws";
      socket = new WebSocket(`${scheme}://${location.host}/ws/chat?token=${token}`);
      socket.onmessage = (event) => {
        const data = JSON.parse(event.data);
        log(data.type === "message" ? `${data.username}: ${data.message}` : `[${data.type}] ${data.message}`);
      };
      socket.onclose = (event) => log(`closed (${event.code})`);
    }
    function send() {
      const input = document.getElementById("message");
      socket.send(JSON.stringify({ content: input.value }));
      input.value = "";
    }
  </script>
</body>
</html>
"#;
