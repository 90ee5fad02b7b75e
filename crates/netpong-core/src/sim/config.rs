//! Field geometry and tuning constants shared by the server and the relay.

/// Field width in pixels.
pub const FIELD_WIDTH: f32 = 650.0;
/// Field height in pixels.
pub const FIELD_HEIGHT: f32 = 400.0;

pub const PADDLE_WIDTH: f32 = 10.0;
pub const PADDLE_HEIGHT: f32 = 60.0;
/// Gap between a paddle and its side wall.
pub const PADDLE_MARGIN: f32 = 10.0;
/// Paddle travel speed (px/s) while an intent flag is held.
pub const PADDLE_SPEED: f32 = 300.0;

pub const BALL_SIZE: f32 = 10.0;
/// Horizontal serve speed (px/s).
pub const SERVE_SPEED_X: f32 = 260.0;
/// Serve vertical speed is drawn uniformly from `[-SERVE_SPEED_Y_MAX, SERVE_SPEED_Y_MAX]`.
pub const SERVE_SPEED_Y_MAX: f32 = 180.0;

/// Horizontal speed multiplier applied on every paddle hit.
pub const RALLY_SPEEDUP: f32 = 1.05;
/// Vertical velocity added per pixel of offset between ball and paddle centers.
pub const DEFLECTION_PER_PX: f32 = 5.0;

/// Longest step the simulation will take in one call (seconds).
pub const MAX_DT: f32 = 0.05;

/// Left edge of paddle A.
pub const PADDLE_A_X: f32 = PADDLE_MARGIN;
/// Left edge of paddle B.
pub const PADDLE_B_X: f32 = FIELD_WIDTH - PADDLE_MARGIN - PADDLE_WIDTH;

/// Highest legal paddle `y`.
pub const PADDLE_Y_MAX: f32 = FIELD_HEIGHT - PADDLE_HEIGHT;

/// Clamp wall-clock elapsed seconds into a step the simulation accepts.
/// Non-finite or negative input becomes zero.
pub fn clamp_dt(elapsed: f32) -> f32 {
    if !elapsed.is_finite() || elapsed <= 0.0 {
        return 0.0;
    }
    elapsed.min(MAX_DT)
}
