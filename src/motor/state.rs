//! Motion state types.

use crate::ramp::MotionPhase;

/// Direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Position count increases.
    #[default]
    Positive,
    /// Position count decreases.
    Negative,
}

impl Direction {
    /// Direction of a signed displacement. Zero counts as positive.
    #[inline]
    pub fn from_steps(steps: i64) -> Self {
        if steps < 0 {
            Direction::Negative
        } else {
            Direction::Positive
        }
    }

    /// Position change per step.
    #[inline]
    pub fn sign(self) -> i32 {
        match self {
            Direction::Positive => 1,
            Direction::Negative => -1,
        }
    }
}

/// What ends the current motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunMode {
    /// Stop after a fixed number of steps.
    #[default]
    Position,
    /// Run until stopped.
    Velocity,
}

/// Snapshot of a stepper's motion state.
///
/// Taken inside the critical section, so all fields are consistent with
/// each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotionState {
    /// Direction of the current or last motion.
    pub direction: Direction,

    /// Run mode of the current or last motion.
    pub run_mode: RunMode,

    /// Position in microsteps.
    pub actual_position: i32,

    /// Signed steps left in a position move. Pinned at `±i32::MAX` in
    /// velocity mode.
    pub remaining_steps: i32,

    /// Cruise interval in nanoseconds.
    pub microstep_interval_ns: u64,

    /// Acceleration in microsteps per second squared.
    pub acceleration: u32,

    /// Level of the step line.
    pub step_pin_state: bool,

    /// Step ticks are being generated.
    pub moving: bool,

    /// Ramp phase of the next step.
    pub phase: MotionPhase,
}

impl MotionState {
    pub(crate) fn new(microstep_interval_ns: u64, acceleration: u32) -> Self {
        Self {
            microstep_interval_ns,
            acceleration,
            phase: MotionPhase::Complete,
            ..Self::default()
        }
    }
}
