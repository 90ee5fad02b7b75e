pub mod net;
pub mod sim;
pub mod time;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use crate::net::messages::{Intent, IntentUpdate};
    use crate::sim::{GameState, StepEvent};

    /// Deterministic RNG for tests that exercise serves and resets.
    pub fn seeded_rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    /// Intent update addressing only paddle A.
    pub fn intent_a(up: bool, down: bool) -> IntentUpdate {
        IntentUpdate {
            a: Some(Intent { up, down }),
            b: None,
        }
    }

    /// Run N fixed-size steps, returning all accumulated events.
    pub fn run_steps(state: &mut GameState, n: usize, dt: f32, seed: u64) -> Vec<StepEvent> {
        let mut rng = seeded_rng(seed);
        let mut events = Vec::new();
        for _ in 0..n {
            events.extend(state.step(dt, &mut rng));
        }
        events
    }
}
