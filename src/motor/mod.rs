//! Motor module for stepper-pulse.
//!
//! Provides the step/direction motion state machine, its pin abstraction and
//! a builder.

mod builder;
mod pins;
pub mod state;
mod stepper;

pub use builder::StepperBuilder;
pub use pins::{StepDirPins, StepPins};
pub use state::{Direction, MotionState, RunMode};
pub use stepper::{Stepper, DEFAULT_EVENT_QUEUE};
