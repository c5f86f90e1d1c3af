//! Position samples, the three-sample window and force vectors.

use std::fmt;

/// Board extent on both axes; coordinates live in `[0, BOARD_SIZE]`.
pub const BOARD_SIZE: f64 = 100.0;

fn clamp_axis(v: f64) -> f64 {
    if v.is_nan() {
        return 0.0;
    }
    v.clamp(0.0, BOARD_SIZE)
}

/// One (x, y) coordinate pair, clamped to the board.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PositionSample {
    x: f64,
    y: f64,
}

impl PositionSample {
    /// Creates a sample, clamping both axes into `[0, BOARD_SIZE]` (NaN maps to 0).
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: clamp_axis(x),
            y: clamp_axis(y),
        }
    }

    /// Board centre.
    pub fn center() -> Self {
        Self::new(BOARD_SIZE / 2.0, BOARD_SIZE / 2.0)
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }
}

impl fmt::Display for PositionSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

/// Sliding window of the last three samples: `[oldest, previous, current]`.
///
/// Always holds exactly three clamped samples; the default window is all zeros,
/// which is what a freshly created store contains.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PositionState {
    samples: [PositionSample; 3],
}

impl PositionState {
    /// Size of the window when laid out as six `f64`s.
    pub const BYTES: usize = 6 * std::mem::size_of::<f64>();

    pub fn new(oldest: PositionSample, previous: PositionSample, current: PositionSample) -> Self {
        Self {
            samples: [oldest, previous, current],
        }
    }

    /// A window where all three samples are `sample` (a drone at rest).
    pub fn uniform(sample: PositionSample) -> Self {
        Self {
            samples: [sample; 3],
        }
    }

    pub fn oldest(&self) -> PositionSample {
        self.samples[0]
    }

    pub fn previous(&self) -> PositionSample {
        self.samples[1]
    }

    pub fn current(&self) -> PositionSample {
        self.samples[2]
    }

    /// Drops the oldest sample and appends `next` as the newest.
    #[must_use]
    pub fn shifted(&self, next: PositionSample) -> Self {
        Self {
            samples: [self.samples[1], self.samples[2], next],
        }
    }

    /// Flat `[x0, y0, x1, y1, x2, y2]` layout, oldest first.
    pub fn to_flat(&self) -> [f64; 6] {
        let [a, b, c] = self.samples;
        [a.x, a.y, b.x, b.y, c.x, c.y]
    }
}

/// Directional thrust, each axis in `{-1, 0, 1}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ForceVector {
    x: i8,
    y: i8,
}

impl ForceVector {
    pub const ZERO: ForceVector = ForceVector { x: 0, y: 0 };

    /// Creates a force vector; each component is reduced to its sign.
    pub fn new(x: i32, y: i32) -> Self {
        Self {
            x: x.signum() as i8,
            y: y.signum() as i8,
        }
    }

    pub fn x(&self) -> i8 {
        self.x
    }

    pub fn y(&self) -> i8 {
        self.y
    }

    /// Adds a delta per axis, saturating at the `{-1, 0, 1}` bounds.
    #[must_use]
    pub fn nudged(&self, dx: i32, dy: i32) -> Self {
        Self::new(
            (i32::from(self.x) + dx).clamp(-1, 1),
            (i32::from(self.y) + dy).clamp(-1, 1),
        )
    }
}

impl fmt::Display for ForceVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_are_clamped_to_the_board() {
        let s = PositionSample::new(-3.0, 250.0);
        assert_eq!((s.x(), s.y()), (0.0, BOARD_SIZE));

        let nan = PositionSample::new(f64::NAN, 10.0);
        assert_eq!((nan.x(), nan.y()), (0.0, 10.0));
    }

    #[test]
    fn shifting_drops_the_oldest_sample() {
        let a = PositionSample::new(1.0, 1.0);
        let b = PositionSample::new(2.0, 2.0);
        let c = PositionSample::new(3.0, 3.0);
        let d = PositionSample::new(4.0, 4.0);

        let shifted = PositionState::new(a, b, c).shifted(d);
        assert_eq!(shifted, PositionState::new(b, c, d));
    }

    #[test]
    fn flat_layout_is_oldest_first_and_48_bytes() {
        let state = PositionState::new(
            PositionSample::new(1.0, 2.0),
            PositionSample::new(3.0, 4.0),
            PositionSample::new(5.0, 6.0),
        );
        assert_eq!(state.to_flat(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(PositionState::BYTES, 48);
    }

    #[test]
    fn force_components_saturate() {
        let f = ForceVector::new(5, -9);
        assert_eq!((f.x(), f.y()), (1, -1));
        assert_eq!(f.nudged(1, -1), f);
        assert_eq!(f.nudged(-1, 1), ForceVector::ZERO);
    }
}
