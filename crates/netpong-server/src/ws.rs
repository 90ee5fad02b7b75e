use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use netpong_core::net::messages::ClientMessage;
use netpong_core::net::protocol::{MAX_MESSAGE_SIZE, decode_client_message};

use crate::session_registry::SessionId;
use crate::state::{AppState, ConnectionGuard};

pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let (ws_sender, mut ws_receiver) = socket.split();

    let (tx, rx) = mpsc::channel::<Utf8Bytes>(state.config.limits.session_buffer);
    let Some(session_id) = state.game.join(tx).await else {
        tracing::warn!("Game loop unavailable, refusing connection");
        return;
    };

    spawn_writer(ws_sender, rx);

    read_loop(&mut ws_receiver, &state, session_id).await;

    // Removing the session drops its sender, which ends the writer.
    state.game.leave(session_id);
    tracing::info!(session_id, "Client disconnected");
}

fn spawn_writer(mut ws_sender: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<Utf8Bytes>) {
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });
}

/// Per-connection rate limiter (token bucket).
struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Returns true if the message is allowed; false if rate-limited.
    fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

async fn read_loop(
    ws_receiver: &mut SplitStream<WebSocket>,
    state: &AppState,
    session_id: SessionId,
) {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = RateLimiter::new(rate, rate);

    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Text(text) => {
                if !rate_limiter.allow() {
                    tracing::debug!(session_id, "Rate limited");
                    continue;
                }
                handle_frame(state, session_id, text.as_str());
            },
            Message::Binary(data) => {
                if !rate_limiter.allow() {
                    tracing::debug!(session_id, "Rate limited");
                    continue;
                }
                if let Ok(text) = std::str::from_utf8(&data) {
                    handle_frame(state, session_id, text);
                }
            },
            Message::Close(_) => break,
            _ => continue,
        }
    }
}

/// Route one inbound frame. Anything that is not a valid `paddle_move` or
/// `reset` is ignored and the session stays open.
fn handle_frame(state: &AppState, session_id: SessionId, text: &str) {
    match decode_client_message(text) {
        Ok(ClientMessage::PaddleMove(pm)) => {
            state.game.intent(session_id, pm.intent_update());
        },
        Ok(ClientMessage::Reset(reset)) => {
            state.game.reset(session_id, reset.full);
        },
        Err(e) => {
            tracing::debug!(session_id, error = %e, "Ignoring unrecognized message");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn rate_limiter_refills() {
        let mut limiter = RateLimiter::new(2.0, 2.0);
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());

        tokio::time::advance(std::time::Duration::from_millis(600)).await;
        assert!(limiter.allow());
        assert!(!limiter.allow());
    }
}
