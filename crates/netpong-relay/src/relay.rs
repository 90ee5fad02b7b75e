use std::sync::Arc;

use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use netpong_core::net::protocol::{MAX_MESSAGE_SIZE, WS_PATH};

use crate::intercept_log::{Direction, InterceptLog};
use crate::policy::{
    Outcome, SharedPolicy, mutate_client_frame, mutate_server_frame, should_drop,
};

type Upstream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Everything a relay pairing needs, cloned into each connection.
#[derive(Clone)]
pub struct RelayState {
    pub target: Arc<String>,
    pub policy: SharedPolicy,
    pub log: InterceptLog,
}

impl RelayState {
    pub fn new(target: impl Into<String>, policy: SharedPolicy, log: InterceptLog) -> Self {
        Self {
            target: Arc::new(target.into()),
            policy,
            log,
        }
    }
}

/// Accept downstream sockets on `/` and on the game path.
pub fn build_app(state: RelayState) -> Router {
    Router::new()
        .route("/", get(relay_ws_handler))
        .route(WS_PATH, get(relay_ws_handler))
        .with_state(state)
}

async fn relay_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<RelayState>,
) -> impl IntoResponse {
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_relay_socket(socket, state))
}

/// Which side ended a pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Teardown {
    ClientClosed,
    ClientError,
    UpstreamClosed,
    UpstreamError,
}

async fn handle_relay_socket(mut socket: WebSocket, state: RelayState) {
    let upstream = match connect_async(state.target.as_str()).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            tracing::warn!(upstream = %state.target, error = %e, "Upstream connect failed, closing client");
            let _ = socket.send(Message::Close(None)).await;
            return;
        },
    };
    tracing::info!(upstream = %state.target, "Relay pairing opened");

    let (mut client_tx, mut client_rx) = socket.split();
    let (mut upstream_tx, mut upstream_rx) = upstream.split();

    let reason = tokio::select! {
        r = client_to_server(&mut client_rx, &mut upstream_tx, &state) => r,
        r = server_to_client(&mut upstream_rx, &mut client_tx, &state) => r,
    };

    // Close both halves; a side that is already gone just errors.
    let _ = upstream_tx.close().await;
    let _ = client_tx.close().await;

    tracing::info!(upstream = %state.target, ?reason, "Relay pairing closed");
}

async fn client_to_server(
    client_rx: &mut SplitStream<WebSocket>,
    upstream_tx: &mut SplitSink<Upstream, UpstreamMessage>,
    state: &RelayState,
) -> Teardown {
    let mut rng = StdRng::from_os_rng();

    while let Some(frame) = client_rx.next().await {
        let msg = match frame {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(error = %e, "Client socket error");
                return Teardown::ClientError;
            },
        };

        let out = match msg {
            Message::Text(text) => {
                let raw = text.as_str();
                state.log.record(Direction::ClientToServer, raw);
                let policy = *state.policy.read().await;
                match mutate_client_frame(raw, &policy, &mut rng) {
                    Outcome::Forward => UpstreamMessage::text(raw),
                    Outcome::Rewrite(mutated) => {
                        tracing::debug!(original = raw, %mutated, "Client frame rewritten");
                        UpstreamMessage::text(mutated)
                    },
                    Outcome::Drop => {
                        tracing::debug!(raw, "Client frame dropped");
                        continue;
                    },
                }
            },
            Message::Binary(data) => {
                state
                    .log
                    .record(Direction::ClientToServer, &String::from_utf8_lossy(&data));
                let policy = *state.policy.read().await;
                if should_drop(&policy, &mut rng) {
                    tracing::debug!(len = data.len(), "Client binary frame dropped");
                    continue;
                }
                UpstreamMessage::Binary(data)
            },
            Message::Close(_) => return Teardown::ClientClosed,
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        if let Err(e) = upstream_tx.send(out).await {
            tracing::warn!(error = %e, "Upstream send failed");
            return Teardown::UpstreamError;
        }
    }

    Teardown::ClientClosed
}

async fn server_to_client(
    upstream_rx: &mut SplitStream<Upstream>,
    client_tx: &mut SplitSink<WebSocket, Message>,
    state: &RelayState,
) -> Teardown {
    let mut rng = StdRng::from_os_rng();

    while let Some(frame) = upstream_rx.next().await {
        let msg = match frame {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(error = %e, "Upstream socket error");
                return Teardown::UpstreamError;
            },
        };

        let out = match msg {
            UpstreamMessage::Text(text) => {
                let raw = text.as_str();
                state.log.record(Direction::ServerToClient, raw);
                let policy = *state.policy.read().await;
                match mutate_server_frame(raw, &policy, &mut rng) {
                    Outcome::Forward => Message::Text(raw.into()),
                    Outcome::Rewrite(mutated) => Message::Text(mutated.into()),
                    Outcome::Drop => continue,
                }
            },
            UpstreamMessage::Binary(data) => {
                state
                    .log
                    .record(Direction::ServerToClient, &String::from_utf8_lossy(&data));
                Message::Binary(data)
            },
            UpstreamMessage::Close(_) => return Teardown::UpstreamClosed,
            _ => continue,
        };

        if let Err(e) = client_tx.send(out).await {
            tracing::warn!(error = %e, "Client send failed");
            return Teardown::ClientError;
        }
    }

    Teardown::UpstreamClosed
}
