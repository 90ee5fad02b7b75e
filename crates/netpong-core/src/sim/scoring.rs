use rand::Rng;

use super::Ball;
use super::config::{FIELD_WIDTH, SERVE_SPEED_X, SERVE_SPEED_Y_MAX};
use crate::net::messages::{Scores, Side};

/// If the ball has crossed a side line, credit the opposite side and serve
/// again. Returns the side that scored.
pub fn resolve_scoring<R: Rng + ?Sized>(
    ball: &mut Ball,
    scores: &mut Scores,
    rng: &mut R,
) -> Option<Side> {
    let scorer = if ball.x < 0.0 {
        Side::B
    } else if ball.x + ball.w > FIELD_WIDTH {
        Side::A
    } else {
        return None;
    };

    let score = scores.get_mut(scorer);
    *score = score.saturating_add(1);
    reset_ball(ball, scorer.opponent(), rng);
    Some(scorer)
}

/// Center the ball and serve it toward `toward` with a random vertical speed.
pub fn reset_ball<R: Rng + ?Sized>(ball: &mut Ball, toward: Side, rng: &mut R) {
    let centered = Ball::centered();
    ball.x = centered.x;
    ball.y = centered.y;
    ball.vx = match toward {
        Side::A => -SERVE_SPEED_X,
        Side::B => SERVE_SPEED_X,
    };
    ball.vy = rng.random_range(-SERVE_SPEED_Y_MAX..=SERVE_SPEED_Y_MAX);
}
