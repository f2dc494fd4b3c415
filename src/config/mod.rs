//! Configuration module for stepper-pulse.
//!
//! Provides types for loading and validating stepper configurations from
//! TOML files (with `std` feature) or pre-parsed data.

mod stepper;
mod system;
#[cfg(feature = "std")]
mod loader;
mod validation;

pub use stepper::StepperConfig;
pub use system::SystemConfig;
pub use validation::{validate_config, validate_stepper, MAX_ROOT_FACTOR};

#[cfg(feature = "std")]
pub use loader::{load_config, parse_config};
