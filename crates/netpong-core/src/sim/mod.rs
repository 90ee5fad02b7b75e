//! Authoritative Pong simulation.
//!
//! [`GameState`] is advanced by [`GameState::step`] with an already clamped
//! `dt` (see [`config::clamp_dt`]). The step never fails: paddles move by
//! their held intent and are clamped, the ball is integrated and bounced off
//! the top/bottom walls, paddle hits are resolved by a single AABB overlap
//! test per tick, and a ball leaving the field scores for the opposite side.
//!
//! Collision is not swept. At very high rally speeds the ball can pass
//! through a paddle between two ticks; `MAX_DT` bounds how far it can move.

pub mod config;
pub mod physics;
pub mod scoring;

use rand::Rng;

use crate::net::messages::{
    BallView, Intent, IntentUpdate, PaddleView, PaddlesView, Scores, Side, StateMsg,
};
use config::{
    BALL_SIZE, FIELD_HEIGHT, FIELD_WIDTH, PADDLE_A_X, PADDLE_B_X, PADDLE_HEIGHT, PADDLE_SPEED,
    PADDLE_WIDTH,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ball {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub w: f32,
    pub h: f32,
}

impl Ball {
    /// Ball at rest, centered on the field.
    pub fn centered() -> Self {
        Self {
            x: (FIELD_WIDTH - BALL_SIZE) / 2.0,
            y: (FIELD_HEIGHT - BALL_SIZE) / 2.0,
            vx: 0.0,
            vy: 0.0,
            w: BALL_SIZE,
            h: BALL_SIZE,
        }
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.h / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paddle {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub speed: f32,
    pub intent: Intent,
}

impl Paddle {
    /// Vertically centered paddle with no held intent.
    pub fn new(x: f32) -> Self {
        Self {
            x,
            y: (FIELD_HEIGHT - PADDLE_HEIGHT) / 2.0,
            w: PADDLE_WIDTH,
            h: PADDLE_HEIGHT,
            speed: PADDLE_SPEED,
            intent: Intent::default(),
        }
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.h / 2.0
    }
}

/// Something notable that happened during one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEvent {
    WallBounce,
    PaddleHit(Side),
    Scored(Side),
}

/// The authoritative game state. Exactly one owner mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct GameState {
    pub ball: Ball,
    pub paddle_a: Paddle,
    pub paddle_b: Paddle,
    pub scores: Scores,
    /// Snapshot sequence number, bumped once per broadcast tick.
    pub seq: u64,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    /// Fresh state with the ball at rest in the center. Call
    /// [`GameState::serve`] to put it in play.
    pub fn new() -> Self {
        Self {
            ball: Ball::centered(),
            paddle_a: Paddle::new(PADDLE_A_X),
            paddle_b: Paddle::new(PADDLE_B_X),
            scores: Scores::default(),
            seq: 0,
        }
    }

    pub fn paddle(&self, side: Side) -> &Paddle {
        match side {
            Side::A => &self.paddle_a,
            Side::B => &self.paddle_b,
        }
    }

    pub fn paddle_mut(&mut self, side: Side) -> &mut Paddle {
        match side {
            Side::A => &mut self.paddle_a,
            Side::B => &mut self.paddle_b,
        }
    }

    /// Overwrite held intent for every paddle the update names.
    pub fn apply_intent_update(&mut self, update: &IntentUpdate) {
        if let Some(intent) = update.a {
            self.paddle_a.intent = intent;
        }
        if let Some(intent) = update.b {
            self.paddle_b.intent = intent;
        }
    }

    /// Re-center the ball and serve it toward `toward`.
    pub fn serve<R: Rng + ?Sized>(&mut self, toward: Side, rng: &mut R) {
        scoring::reset_ball(&mut self.ball, toward, rng);
    }

    /// Re-center the ball toward a random side; `full` also zeroes the scores.
    pub fn reset<R: Rng + ?Sized>(&mut self, full: bool, rng: &mut R) {
        let toward = if rng.random_bool(0.5) {
            Side::A
        } else {
            Side::B
        };
        self.serve(toward, rng);
        if full {
            self.scores = Scores::default();
        }
    }

    /// Advance the simulation by `dt` seconds.
    pub fn step<R: Rng + ?Sized>(&mut self, dt: f32, rng: &mut R) -> Vec<StepEvent> {
        let mut events = Vec::new();

        physics::apply_intent(&mut self.paddle_a, dt);
        physics::apply_intent(&mut self.paddle_b, dt);

        if physics::advance_ball(&mut self.ball, dt) {
            events.push(StepEvent::WallBounce);
        }

        for side in [Side::A, Side::B] {
            let paddle = *self.paddle(side);
            if physics::resolve_paddle_collision(&mut self.ball, &paddle, side) {
                events.push(StepEvent::PaddleHit(side));
            }
        }

        if let Some(scorer) = scoring::resolve_scoring(&mut self.ball, &mut self.scores, rng) {
            events.push(StepEvent::Scored(scorer));
        }

        events
    }

    /// Bump and return the snapshot sequence number.
    pub fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// Wire snapshot of the current state, stamped with the current `seq`.
    pub fn snapshot(&self, ts: u64) -> StateMsg {
        StateMsg {
            seq: self.seq,
            ball: BallView {
                x: self.ball.x,
                y: self.ball.y,
                w: self.ball.w,
                h: self.ball.h,
            },
            paddles: PaddlesView {
                a: PaddleView {
                    y: self.paddle_a.y,
                    h: self.paddle_a.h,
                },
                b: PaddleView {
                    y: self.paddle_b.y,
                    h: self.paddle_b.h,
                },
            },
            scores: self.scores,
            ts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{intent_a, run_steps, seeded_rng};
    use crate::sim::config::PADDLE_Y_MAX;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn open_field_tick_scenario() {
        let mut state = GameState::new();
        state.ball.x = 325.0;
        state.ball.y = 200.0;
        state.ball.vx = 260.0;
        state.ball.vy = 180.0;
        state.paddle_a.y = 170.0;

        let events = state.step(DT, &mut seeded_rng(1));

        assert!(events.is_empty(), "unexpected events: {events:?}");
        assert!((state.ball.x - (325.0 + 260.0 / 60.0)).abs() < 1e-3);
        assert!((state.ball.y - 203.0).abs() < 1e-3);
        assert_eq!(state.ball.vx, 260.0);
        assert_eq!(state.paddle_a.y, 170.0);
    }

    #[test]
    fn ball_at_rest_never_scores() {
        let mut state = GameState::new();
        let events = run_steps(&mut state, 10_000, DT, 3);
        assert!(events.is_empty());
        assert_eq!(state.scores, Scores::default());
        assert_eq!(state.ball, Ball::centered());
    }

    #[test]
    fn intent_persists_across_ticks() {
        let mut state = GameState::new();
        state.apply_intent_update(&intent_a(false, true));
        let start = state.paddle_a.y;
        run_steps(&mut state, 3, DT, 4);
        let expected = start + 3.0 * PADDLE_SPEED * DT;
        assert!((state.paddle_a.y - expected).abs() < 1e-3);
        assert_eq!(state.paddle_b.y, start);
    }

    #[test]
    fn paddle_clamped_after_long_hold() {
        let mut state = GameState::new();
        state.apply_intent_update(&intent_a(false, true));
        run_steps(&mut state, 600, DT, 5);
        assert_eq!(state.paddle_a.y, PADDLE_Y_MAX);

        state.apply_intent_update(&intent_a(true, false));
        run_steps(&mut state, 600, DT, 5);
        assert_eq!(state.paddle_a.y, 0.0);
    }

    #[test]
    fn update_for_b_leaves_a_intent() {
        let mut state = GameState::new();
        state.apply_intent_update(&intent_a(true, false));
        state.apply_intent_update(&IntentUpdate {
            a: None,
            b: Some(Intent { up: false, down: true }),
        });
        assert_eq!(state.paddle_a.intent, Intent { up: true, down: false });
        assert_eq!(state.paddle_b.intent, Intent { up: false, down: true });
    }

    #[test]
    fn full_reset_zeroes_scores_and_centers_ball() {
        let mut state = GameState::new();
        state.scores = Scores { a: 3, b: 2 };
        state.ball.x = 12.0;
        state.ball.y = 7.0;

        state.reset(true, &mut seeded_rng(9));

        assert_eq!(state.scores, Scores::default());
        assert_eq!(state.ball.x, Ball::centered().x);
        assert_eq!(state.ball.y, Ball::centered().y);
        assert_eq!(state.ball.vx.abs(), config::SERVE_SPEED_X);
    }

    #[test]
    fn partial_reset_keeps_scores() {
        let mut state = GameState::new();
        state.scores = Scores { a: 3, b: 2 };
        state.reset(false, &mut seeded_rng(9));
        assert_eq!(state.scores, Scores { a: 3, b: 2 });
    }

    #[test]
    fn seq_increments_by_one() {
        let mut state = GameState::new();
        assert_eq!(state.next_seq(), 1);
        assert_eq!(state.next_seq(), 2);
        assert_eq!(state.snapshot(0).seq, 2);
    }

    #[test]
    fn snapshot_mirrors_state() {
        let mut state = GameState::new();
        state.scores = Scores { a: 4, b: 1 };
        let snap = state.snapshot(42);
        assert_eq!(snap.ball.x, state.ball.x);
        assert_eq!(snap.paddles.b.y, state.paddle_b.y);
        assert_eq!(snap.paddles.a.h, PADDLE_HEIGHT);
        assert_eq!(snap.scores, Scores { a: 4, b: 1 });
        assert_eq!(snap.ts, 42);
    }
}
