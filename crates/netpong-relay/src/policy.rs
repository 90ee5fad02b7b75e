use std::sync::Arc;

use rand::Rng;
use tokio::sync::RwLock;

use netpong_core::net::messages::{BallView, ClientMessage, Scores, ServerMessage, Side};
use netpong_core::net::protocol::{
    decode_client_message, decode_server_message, encode_client_message, encode_server_message,
};
use netpong_core::sim::config::{BALL_SIZE, FIELD_HEIGHT, FIELD_WIDTH};

/// Operator-forced score values. `None` leaves that side's real score alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreOverride {
    pub a: Option<u32>,
    pub b: Option<u32>,
}

impl ScoreOverride {
    pub fn is_active(&self) -> bool {
        self.a.is_some() || self.b.is_some()
    }

    pub fn set(&mut self, side: Side, value: Option<u32>) {
        match side {
            Side::A => self.a = value,
            Side::B => self.b = value,
        }
    }

    pub fn apply(&self, scores: &mut Scores) {
        if let Some(a) = self.a {
            scores.a = a;
        }
        if let Some(b) = self.b {
            scores.b = b;
        }
    }
}

/// Live fault-injection settings, edited by the operator console and read
/// by every relay pairing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MutationPolicy {
    /// Master switch for flips, teleports and score overrides. Drops are
    /// governed by `drop_rate` alone.
    pub enabled: bool,
    /// Probability in `[0, 1]` of discarding any client frame.
    pub drop_rate: f64,
    /// Probability in `[0, 1]` of moving the ball in a `state` frame.
    pub teleport_rate: f64,
    pub flip_a: bool,
    pub flip_b: bool,
    pub score_override: ScoreOverride,
}

impl Default for MutationPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            drop_rate: 0.0,
            teleport_rate: 0.0,
            flip_a: false,
            flip_b: false,
            score_override: ScoreOverride::default(),
        }
    }
}

impl MutationPolicy {
    pub fn flips(&self, side: Side) -> bool {
        match side {
            Side::A => self.flip_a,
            Side::B => self.flip_b,
        }
    }

    pub fn set_flip(&mut self, side: Side, on: bool) {
        match side {
            Side::A => self.flip_a = on,
            Side::B => self.flip_b = on,
        }
    }

    pub fn summary(&self) -> String {
        let score = |v: Option<u32>| v.map_or_else(|| "-".to_string(), |n| n.to_string());
        format!(
            "mutate={} dropRate={} teleportRate={} flipA={} flipB={} scoreOverride=A:{} B:{}",
            if self.enabled { "on" } else { "off" },
            self.drop_rate,
            self.teleport_rate,
            self.flip_a,
            self.flip_b,
            score(self.score_override.a),
            score(self.score_override.b),
        )
    }
}

/// Policy shared between the console and every relay pairing.
pub type SharedPolicy = Arc<RwLock<MutationPolicy>>;

pub fn shared_policy(policy: MutationPolicy) -> SharedPolicy {
    Arc::new(RwLock::new(policy))
}

/// What to do with one relayed text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Send the original bytes unchanged.
    Forward,
    /// Send this re-encoded frame instead.
    Rewrite(String),
    /// Swallow the frame.
    Drop,
}

/// Roll the drop for one client frame. Applies to every frame, decodable or
/// not, and is not gated by the master switch.
pub fn should_drop<R: Rng + ?Sized>(policy: &MutationPolicy, rng: &mut R) -> bool {
    policy.drop_rate > 0.0 && rng.random::<f64>() < policy.drop_rate
}

/// Apply client-to-server mutations. The drop roll comes first; frames that
/// survive it but do not decode are forwarded without flipping.
pub fn mutate_client_frame<R: Rng + ?Sized>(
    raw: &str,
    policy: &MutationPolicy,
    rng: &mut R,
) -> Outcome {
    if should_drop(policy, rng) {
        return Outcome::Drop;
    }
    if !policy.enabled {
        return Outcome::Forward;
    }
    let Ok(mut msg) = decode_client_message(raw) else {
        return Outcome::Forward;
    };

    let ClientMessage::PaddleMove(ref mut paddle_move) = msg else {
        return Outcome::Forward;
    };
    let mut changed = false;
    for side in [Side::A, Side::B] {
        if policy.flips(side) {
            changed |= paddle_move.flip(side);
        }
    }
    if !changed {
        return Outcome::Forward;
    }

    match encode_client_message(&msg) {
        Ok(text) => Outcome::Rewrite(text),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to re-encode flipped frame, forwarding original");
            Outcome::Forward
        },
    }
}

/// Apply server-to-client mutations to `state` frames.
pub fn mutate_server_frame<R: Rng + ?Sized>(
    raw: &str,
    policy: &MutationPolicy,
    rng: &mut R,
) -> Outcome {
    if !policy.enabled {
        return Outcome::Forward;
    }
    let Ok(ServerMessage::State(mut state)) = decode_server_message(raw) else {
        return Outcome::Forward;
    };

    let mut changed = false;
    if policy.teleport_rate > 0.0 && rng.random::<f64>() < policy.teleport_rate {
        teleport_ball(&mut state.ball, rng);
        changed = true;
    }
    if policy.score_override.is_active() {
        policy.score_override.apply(&mut state.scores);
        changed = true;
    }
    if !changed {
        return Outcome::Forward;
    }

    match encode_server_message(&ServerMessage::State(state)) {
        Ok(text) => Outcome::Rewrite(text),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to re-encode mutated snapshot, forwarding original");
            Outcome::Forward
        },
    }
}

/// Move the ball to a uniformly random point where it lies fully inside the
/// field. A non-finite ball size is treated as the regular ball.
pub fn teleport_ball<R: Rng + ?Sized>(ball: &mut BallView, rng: &mut R) {
    let max_x = placement_span(FIELD_WIDTH, ball.w);
    let max_y = placement_span(FIELD_HEIGHT, ball.h);
    ball.x = rng.random_range(0.0..=max_x);
    ball.y = rng.random_range(0.0..=max_y);
}

fn placement_span(field: f32, size: f32) -> f32 {
    let span = field - size;
    if span.is_finite() && size.is_finite() {
        span.clamp(0.0, field)
    } else {
        field - BALL_SIZE
    }
}
