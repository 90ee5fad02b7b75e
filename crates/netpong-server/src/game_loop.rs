use std::time::Duration;

use axum::extract::ws::Utf8Bytes;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use netpong_core::net::messages::{IntentUpdate, ServerMessage, Side};
use netpong_core::net::protocol::encode_server_message;
use netpong_core::sim::config::clamp_dt;
use netpong_core::sim::{GameState, StepEvent};
use netpong_core::time::epoch_ms;

use crate::config::GameConfig;
use crate::session_registry::{SessionId, SessionRegistry, SessionSender};

/// Commands sent from WebSocket handlers to the game loop.
#[derive(Debug)]
pub enum GameCommand {
    Join {
        sender: SessionSender,
        reply: oneshot::Sender<SessionId>,
    },
    Leave {
        session_id: SessionId,
    },
    Intent {
        session_id: SessionId,
        update: IntentUpdate,
    },
    Reset {
        session_id: SessionId,
        full: bool,
    },
    Stop,
}

/// Cloneable handle to the game loop task. All state changes go through it.
#[derive(Debug, Clone)]
pub struct GameHandle {
    cmd_tx: mpsc::UnboundedSender<GameCommand>,
}

impl GameHandle {
    /// Register a session. The loop immediately queues a full snapshot on
    /// `sender`. Returns `None` if the loop has stopped.
    pub async fn join(&self, sender: SessionSender) -> Option<SessionId> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx.send(GameCommand::Join { sender, reply }).ok()?;
        rx.await.ok()
    }

    pub fn leave(&self, session_id: SessionId) {
        let _ = self.cmd_tx.send(GameCommand::Leave { session_id });
    }

    pub fn intent(&self, session_id: SessionId, update: IntentUpdate) {
        let _ = self.cmd_tx.send(GameCommand::Intent { session_id, update });
    }

    pub fn reset(&self, session_id: SessionId, full: bool) {
        let _ = self.cmd_tx.send(GameCommand::Reset { session_id, full });
    }

    pub fn stop(&self) {
        let _ = self.cmd_tx.send(GameCommand::Stop);
    }
}

/// Sole owner of the game state and the session registry. Commands and ticks
/// are applied one at a time, so no reader ever sees a half-applied update.
pub struct GameLoop {
    state: GameState,
    sessions: SessionRegistry,
    rng: StdRng,
    max_dt: f32,
}

impl GameLoop {
    pub fn new(max_dt: f32, mut rng: StdRng) -> Self {
        let mut state = GameState::new();
        state.serve(Side::B, &mut rng);
        Self {
            state,
            sessions: SessionRegistry::new(),
            rng,
            max_dt,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Apply one command. Returns false when the loop should stop.
    pub fn handle_command(&mut self, cmd: GameCommand) -> bool {
        match cmd {
            GameCommand::Join { sender, reply } => {
                let id = self.sessions.register(sender);
                if reply.send(id).is_err() {
                    self.sessions.remove(id);
                    return true;
                }
                if let Some(frame) = self.encode_snapshot() {
                    self.sessions.send_to(id, &frame);
                }
                tracing::info!(session_id = id, sessions = self.sessions.len(), "Session opened");
            },
            GameCommand::Leave { session_id } => {
                if self.sessions.remove(session_id) {
                    tracing::info!(
                        session_id,
                        sessions = self.sessions.len(),
                        "Session closed"
                    );
                }
            },
            GameCommand::Intent { session_id, update } => {
                tracing::trace!(session_id, ?update, "Intent update");
                self.state.apply_intent_update(&update);
            },
            GameCommand::Reset { session_id, full } => {
                tracing::info!(session_id, full, "Reset requested");
                self.state.reset(full, &mut self.rng);
                self.broadcast_snapshot();
            },
            GameCommand::Stop => return false,
        }
        true
    }

    /// Advance the simulation by the wall-clock `elapsed` seconds, bump `seq`
    /// and broadcast the snapshot to every open session.
    pub fn tick(&mut self, elapsed: f32) {
        let dt = clamp_dt(elapsed).min(self.max_dt);
        for event in self.state.step(dt, &mut self.rng) {
            if let StepEvent::Scored(side) = event {
                tracing::info!(
                    scorer = %side,
                    a = self.state.scores.a,
                    b = self.state.scores.b,
                    "Point scored"
                );
            }
        }

        self.broadcast_snapshot();
    }

    /// Bump `seq` and send the current snapshot to every open session.
    fn broadcast_snapshot(&mut self) {
        self.state.next_seq();
        if let Some(frame) = self.encode_snapshot() {
            let dropped = self.sessions.broadcast(&frame);
            if !dropped.is_empty() {
                tracing::info!(
                    ?dropped,
                    sessions = self.sessions.len(),
                    "Dropped sessions after failed broadcast"
                );
            }
        }
    }

    fn encode_snapshot(&self) -> Option<Utf8Bytes> {
        let msg = ServerMessage::State(self.state.snapshot(epoch_ms()));
        match encode_server_message(&msg) {
            Ok(text) => Some(Utf8Bytes::from(text)),
            Err(e) => {
                tracing::error!(seq = self.state.seq, error = %e, "Failed to encode snapshot");
                None
            },
        }
    }
}

/// Spawn the game loop as a tokio task.
pub fn spawn_game_loop(config: &GameConfig) -> (GameHandle, JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let game = GameLoop::new(config.max_dt_secs(), StdRng::from_os_rng());
    let tick_interval = Duration::from_secs_f64(1.0 / f64::from(config.tick_rate_hz.max(1)));

    let handle = tokio::spawn(run_game_loop(game, tick_interval, cmd_rx));

    (GameHandle { cmd_tx }, handle)
}

async fn run_game_loop(
    mut game: GameLoop,
    tick_interval: Duration,
    mut cmd_rx: mpsc::UnboundedReceiver<GameCommand>,
) {
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut last_tick = tokio::time::Instant::now();

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = tokio::time::Instant::now();
                let elapsed = now.duration_since(last_tick).as_secs_f32();
                last_tick = now;
                game.tick(elapsed);
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(cmd) => {
                        if !game.handle_command(cmd) {
                            break;
                        }
                    },
                    None => break,
                }
            }
        }
    }

    tracing::info!(seq = game.state().seq, "Game loop stopped");
}
