use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message as AxumMessage, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use netpong_relay::intercept_log::InterceptLog;
use netpong_relay::policy::{MutationPolicy, SharedPolicy, shared_policy};
use netpong_relay::{RelayState, build_app};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What the fake upstream observed from the relay.
#[derive(Debug, PartialEq)]
pub enum UpstreamEvent {
    Frame(String),
    Binary(Vec<u8>),
    Closed,
}

/// What the test wants the fake upstream to send.
#[derive(Debug)]
pub enum UpstreamCommand {
    Text(String),
    Close,
}

type CommandSlot = Arc<Mutex<Option<mpsc::UnboundedReceiver<UpstreamCommand>>>>;

#[derive(Clone)]
struct FakeUpstreamState {
    events: mpsc::UnboundedSender<UpstreamEvent>,
    commands: CommandSlot,
}

/// A stand-in game server accepting exactly one relay connection on `/ws`.
pub struct FakeUpstream {
    pub addr: SocketAddr,
    pub events: mpsc::UnboundedReceiver<UpstreamEvent>,
    pub commands: mpsc::UnboundedSender<UpstreamCommand>,
    _task: tokio::task::JoinHandle<()>,
}

impl FakeUpstream {
    pub async fn start() -> Self {
        let (events_tx, events) = mpsc::unbounded_channel();
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let state = FakeUpstreamState {
            events: events_tx,
            commands: Arc::new(Mutex::new(Some(commands_rx))),
        };

        let app = Router::new()
            .route("/ws", get(upstream_ws_handler))
            .with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            events,
            commands,
            _task: task,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn send_text(&self, text: &str) {
        self.commands
            .send(UpstreamCommand::Text(text.to_string()))
            .unwrap();
    }

    pub fn close(&self) {
        self.commands.send(UpstreamCommand::Close).unwrap();
    }

    /// Next event seen by the upstream (5s timeout).
    pub async fn next_event(&mut self) -> UpstreamEvent {
        tokio::time::timeout(Duration::from_secs(5), self.events.recv())
            .await
            .expect("Timed out waiting for upstream event")
            .expect("Upstream event channel closed")
    }

    pub async fn next_frame(&mut self) -> String {
        match self.next_event().await {
            UpstreamEvent::Frame(text) => text,
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    /// Assert nothing arrives within `wait`.
    pub async fn expect_silence(&mut self, wait: Duration) {
        if let Ok(event) = tokio::time::timeout(wait, self.events.recv()).await {
            panic!("expected no upstream traffic, got {event:?}");
        }
    }
}

async fn upstream_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<FakeUpstreamState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| fake_upstream_socket(socket, state))
}

async fn fake_upstream_socket(socket: WebSocket, state: FakeUpstreamState) {
    let Some(mut commands) = state.commands.lock().unwrap().take() else {
        return;
    };
    let (mut tx, mut rx) = socket.split();

    loop {
        tokio::select! {
            frame = rx.next() => match frame {
                Some(Ok(AxumMessage::Text(text))) => {
                    let _ = state.events.send(UpstreamEvent::Frame(text.to_string()));
                },
                Some(Ok(AxumMessage::Binary(data))) => {
                    let _ = state.events.send(UpstreamEvent::Binary(data.to_vec()));
                },
                Some(Ok(AxumMessage::Close(_))) | None | Some(Err(_)) => {
                    let _ = state.events.send(UpstreamEvent::Closed);
                    return;
                },
                Some(Ok(_)) => {},
            },
            cmd = commands.recv() => match cmd {
                Some(UpstreamCommand::Text(text)) => {
                    let _ = tx.send(AxumMessage::Text(text.into())).await;
                },
                Some(UpstreamCommand::Close) | None => {
                    let _ = tx.send(AxumMessage::Close(None)).await;
                    return;
                },
            },
        }
    }
}

/// A relay bound to an ephemeral port with its own temporary log file.
pub struct TestRelay {
    pub addr: SocketAddr,
    pub policy: SharedPolicy,
    pub log: InterceptLog,
    _task: tokio::task::JoinHandle<()>,
}

impl TestRelay {
    pub async fn start(target: String) -> Self {
        Self::with_policy(target, MutationPolicy::default()).await
    }

    pub async fn with_policy(target: String, policy: MutationPolicy) -> Self {
        let policy = shared_policy(policy);
        let log = InterceptLog::spawn(temp_log_path());
        let state = RelayState::new(target, Arc::clone(&policy), log.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = build_app(state);
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            policy,
            log,
            _task: task,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn root_url(&self) -> String {
        format!("ws://{}/", self.addr)
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(self.log.path());
    }
}

pub fn temp_log_path() -> PathBuf {
    std::env::temp_dir().join(format!("netpong-relay-test-{}.jsonl", uuid::Uuid::new_v4()))
}

pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

pub async fn ws_send_text(stream: &mut WsStream, text: &str) {
    stream.send(Message::text(text)).await.unwrap();
}

pub async fn ws_send_binary(stream: &mut WsStream, data: &[u8]) {
    stream
        .send(Message::Binary(data.to_vec().into()))
        .await
        .unwrap();
}

/// Read the next text frame (5s timeout).
pub async fn ws_read_text(stream: &mut WsStream) -> String {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return text.to_string(),
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Wait until the peer closes the socket (5s timeout).
pub async fn ws_expect_closed(stream: &mut WsStream) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for close");
}

/// Connect a client through the relay and wait until the fake upstream has
/// accepted the paired connection.
pub async fn connect_pair(relay: &TestRelay) -> WsStream {
    let client = ws_connect(&relay.ws_url()).await;
    // The upstream dial happens after the downstream upgrade completes.
    tokio::time::sleep(Duration::from_millis(100)).await;
    client
}
