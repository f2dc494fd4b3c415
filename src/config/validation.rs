//! Configuration validation.

use crate::error::{ConfigError, Error, Result};

use super::{StepperConfig, SystemConfig};

/// Largest accepted square root scale factor.
pub const MAX_ROOT_FACTOR: u64 = 10_000;

/// Validate a system configuration.
///
/// Checks every stepper:
/// - Microstep interval is nonzero
/// - `accurate_steps` is at least 1
/// - `root_factor` is within `1..=10_000`
pub fn validate_config(config: &SystemConfig) -> Result<()> {
    for (_, stepper) in config.steppers.iter() {
        validate_stepper(stepper)?;
    }
    Ok(())
}

/// Validate a single stepper configuration.
pub fn validate_stepper(config: &StepperConfig) -> Result<()> {
    if config.microstep_interval_ns == 0 {
        return Err(Error::Config(ConfigError::InvalidInterval(
            config.microstep_interval_ns,
        )));
    }

    if config.accurate_steps == 0 {
        return Err(Error::Config(ConfigError::InvalidAccurateSteps(
            config.accurate_steps,
        )));
    }

    // Larger factors overflow the scaled square root for long ramps
    if config.root_factor == 0 || config.root_factor > MAX_ROOT_FACTOR {
        return Err(Error::Config(ConfigError::InvalidRootFactor(
            config.root_factor,
        )));
    }

    Ok(())
}
