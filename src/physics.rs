//! # Damped 2D integrator.
//!
//! Advances the position window one step per axis:
//!
//! ```text
//! next = current + force*T - M*(current - previous) / (M + K*T)
//! next = clamp(next, 0, BOARD_SIZE)
//! ```
//!
//! [`PhysicsEngine`] also owns the startup gate: nothing is integrated until the
//! first force vector arrives, and from then on every period integrates with the
//! most recent force (reused when no new one arrived).

use crate::state::{ForceVector, PositionSample, PositionState};

/// Integrator constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsParams {
    /// Drone mass (M).
    pub mass: f64,
    /// Damping stiffness (K).
    pub stiffness: f64,
    /// Timestep (T).
    pub timestep: f64,
}

impl Default for PhysicsParams {
    fn default() -> Self {
        Self {
            mass: 1.0,
            stiffness: 1.0,
            timestep: 0.5,
        }
    }
}

impl PhysicsParams {
    fn axis(&self, force: i8, current: f64, previous: f64) -> f64 {
        let m = self.mass;
        current + f64::from(force) * self.timestep
            - m * (current - previous) / (m + self.stiffness * self.timestep)
    }
}

/// Integrator plus the "latest force" memory.
#[derive(Debug, Clone, Default)]
pub struct PhysicsEngine {
    params: PhysicsParams,
    force: Option<ForceVector>,
}

impl PhysicsEngine {
    pub fn new(params: PhysicsParams) -> Self {
        Self {
            params,
            force: None,
        }
    }

    /// Computes the next window: drop the oldest sample, append the clamped next one.
    pub fn tick(&self, force: ForceVector, state: &PositionState) -> PositionState {
        let current = state.current();
        let previous = state.previous();
        let next = PositionSample::new(
            self.params.axis(force.x(), current.x(), previous.x()),
            self.params.axis(force.y(), current.y(), previous.y()),
        );
        state.shifted(next)
    }

    /// Feeds the result of one non-blocking poll and returns the force to apply now.
    ///
    /// - `None` before the first force has ever arrived (an empty poll is a no-op)
    /// - the newly received force when `incoming` is `Some`
    /// - the last received force otherwise
    pub fn observe(&mut self, incoming: Option<ForceVector>) -> Option<ForceVector> {
        if let Some(f) = incoming {
            self.force = Some(f);
        }
        self.force
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::state::BOARD_SIZE;

    fn window(previous: (f64, f64), current: (f64, f64)) -> PositionState {
        let p = PositionSample::new(previous.0, previous.1);
        PositionState::new(p, p, PositionSample::new(current.0, current.1))
    }

    #[test]
    fn pushes_along_the_force() {
        let engine = PhysicsEngine::default();
        let next = engine.tick(ForceVector::new(1, 0), &window((50.0, 50.0), (50.0, 50.0)));

        assert_eq!(next.current(), PositionSample::new(50.5, 50.0));
        assert_eq!(next.previous(), PositionSample::new(50.0, 50.0));
    }

    #[test]
    fn rest_without_force_stays_put() {
        let engine = PhysicsEngine::default();
        let state = window((12.25, 87.5), (12.25, 87.5));
        let next = engine.tick(ForceVector::ZERO, &state);
        assert_eq!(next.current(), state.current());
    }

    #[test]
    fn damping_pulls_toward_the_previous_sample() {
        let engine = PhysicsEngine::default();
        // current - previous = 3 → correction 3 / 1.5 = 2
        let next = engine.tick(ForceVector::ZERO, &window((10.0, 10.0), (13.0, 10.0)));
        assert_eq!(next.current().x(), 11.0);
    }

    #[test]
    fn edges_are_clamped() {
        let engine = PhysicsEngine::default();
        let at_max = engine.tick(ForceVector::new(1, 1), &window((BOARD_SIZE, BOARD_SIZE), (BOARD_SIZE, BOARD_SIZE)));
        assert_eq!(at_max.current(), PositionSample::new(BOARD_SIZE, BOARD_SIZE));

        let at_min = engine.tick(ForceVector::new(-1, -1), &window((0.0, 0.0), (0.0, 0.0)));
        assert_eq!(at_min.current(), PositionSample::new(0.0, 0.0));
    }

    #[test]
    fn no_force_until_first_input_then_reuse() {
        let mut engine = PhysicsEngine::default();
        assert_eq!(engine.observe(None), None);
        assert_eq!(engine.observe(None), None);

        let up = ForceVector::new(0, -1);
        assert_eq!(engine.observe(Some(up)), Some(up));
        assert_eq!(engine.observe(None), Some(up));
        assert_eq!(engine.observe(Some(ForceVector::ZERO)), Some(ForceVector::ZERO));
        assert_eq!(engine.observe(None), Some(ForceVector::ZERO));
    }

    proptest! {
        #[test]
        fn tick_stays_on_the_board(
            fx in -1i32..=1,
            fy in -1i32..=1,
            px in 0.0..=BOARD_SIZE,
            py in 0.0..=BOARD_SIZE,
            cx in 0.0..=BOARD_SIZE,
            cy in 0.0..=BOARD_SIZE,
        ) {
            let engine = PhysicsEngine::default();
            let next = engine.tick(ForceVector::new(fx, fy), &window((px, py), (cx, cy))).current();
            prop_assert!((0.0..=BOARD_SIZE).contains(&next.x()));
            prop_assert!((0.0..=BOARD_SIZE).contains(&next.y()));
        }

        #[test]
        fn equal_samples_and_no_force_are_a_fixed_point(
            x in 0.0..=BOARD_SIZE,
            y in 0.0..=BOARD_SIZE,
        ) {
            let engine = PhysicsEngine::default();
            let state = window((x, y), (x, y));
            prop_assert_eq!(engine.tick(ForceVector::ZERO, &state).current(), state.current());
        }
    }
}
