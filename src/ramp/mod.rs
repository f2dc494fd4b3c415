//! Ramp module for stepper-pulse.
//!
//! Provides trapezoidal ramp planning and per-step interval generation.

mod cursor;
pub mod isqrt;
mod plan;

pub use cursor::RampCursor;
pub use plan::{
    base_time_ps, plan_move, plan_stop, plan_velocity, ramp_index_for, MotionPhase, RampPlan,
    NS_PER_SEC,
};
