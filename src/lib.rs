//! # stepper-pulse
//!
//! Step-pulse generation and trapezoidal motion profiles for step/direction
//! stepper drivers, with embedded-hal 1.0 support.
//!
//! ## Features
//!
//! - **Trapezoidal ramps**: integer-only planning and per-step intervals
//! - **Two timing back ends**: work-queue callbacks or a reloadable hardware
//!   counter
//! - **Interrupt safe**: all motion state behind a critical section, events
//!   from interrupt context deferred through a bounded queue
//! - **no_std compatible**: core library works without standard library
//! - **Configuration-driven**: define steppers in TOML files
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stepper_pulse::{CounterTiming, Direction, StepDirPins, StepperBuilder};
//!
//! let config = stepper_pulse::load_config("steppers.toml")?;
//!
//! let stepper = StepperBuilder::new()
//!     .from_config(&config, "x_axis")?
//!     .pins(StepDirPins::new(step_pin, dir_pin))
//!     .timing(CounterTiming::new(timer))
//!     .build()?;
//!
//! stepper.set_event_callback(Some(on_event));
//! stepper.move_by(3200)?;
//!
//! // In the timer interrupt:
//! stepper.on_tick();
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Enables file I/O and TOML parsing
//! - `defmt`: Enables defmt logging for embedded targets

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]
// Allow large error types - necessary for no_std with heapless strings
#![allow(clippy::result_large_err)]

#[cfg(all(test, not(feature = "std")))]
extern crate std;

// This must go first so the logging macros are visible everywhere.
mod fmt;

// Core modules
pub mod config;
pub mod error;
pub mod event;
pub mod motor;
pub mod ramp;
pub mod timing;

// Re-exports for ergonomic API
pub use config::{validate_config, StepperConfig, SystemConfig};
pub use error::{Error, Result};
pub use event::{Event, EventCallback, ExecContext, WorkNotifier};
pub use motor::{Direction, MotionState, RunMode, StepDirPins, StepPins, Stepper, StepperBuilder};
pub use ramp::{MotionPhase, RampPlan};
pub use timing::{
    CooperativeTiming, CounterTimer, CounterTiming, DeferredScheduler, TickKind, TimingEngine,
};

// Configuration loading (std only)
#[cfg(feature = "std")]
pub use config::{load_config, parse_config};
