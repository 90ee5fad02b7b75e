use super::config::{DEFLECTION_PER_PX, FIELD_HEIGHT, RALLY_SPEEDUP};
use super::{Ball, Paddle};
use crate::net::messages::Side;

/// Move a paddle by its held intent and clamp it to the field.
pub fn apply_intent(paddle: &mut Paddle, dt: f32) {
    let dy = paddle.intent.direction() * paddle.speed * dt;
    paddle.y = (paddle.y + dy).clamp(0.0, FIELD_HEIGHT - paddle.h);
}

/// Integrate the ball and bounce it off the top and bottom walls.
/// Returns true if a wall was hit.
pub fn advance_ball(ball: &mut Ball, dt: f32) -> bool {
    ball.x += ball.vx * dt;
    ball.y += ball.vy * dt;

    if ball.y < 0.0 {
        ball.y = 0.0;
        ball.vy = ball.vy.abs();
        true
    } else if ball.y + ball.h > FIELD_HEIGHT {
        ball.y = FIELD_HEIGHT - ball.h;
        ball.vy = -ball.vy.abs();
        true
    } else {
        false
    }
}

/// Axis-aligned bounding box overlap between the ball and a paddle.
pub fn overlaps(ball: &Ball, paddle: &Paddle) -> bool {
    ball.x < paddle.x + paddle.w
        && ball.x + ball.w > paddle.x
        && ball.y < paddle.y + paddle.h
        && ball.y + ball.h > paddle.y
}

/// Bounce the ball off `paddle` if they overlap and the ball is heading
/// toward that paddle's goal. The ball is placed flush against the paddle's
/// inner face, its horizontal speed grows by [`RALLY_SPEEDUP`], and the hit
/// offset from the paddle center steers its vertical velocity.
pub fn resolve_paddle_collision(ball: &mut Ball, paddle: &Paddle, side: Side) -> bool {
    if !overlaps(ball, paddle) {
        return false;
    }

    match side {
        Side::A => {
            if ball.vx >= 0.0 {
                return false;
            }
            ball.x = paddle.x + paddle.w;
            ball.vx = ball.vx.abs() * RALLY_SPEEDUP;
        },
        Side::B => {
            if ball.vx <= 0.0 {
                return false;
            }
            ball.x = paddle.x - ball.w;
            ball.vx = -ball.vx.abs() * RALLY_SPEEDUP;
        },
    }

    let offset = ball.center_y() - paddle.center_y();
    ball.vy += offset * DEFLECTION_PER_PX;
    true
}
