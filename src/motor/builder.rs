//! Builder pattern for Stepper.

use crate::config::{StepperConfig, SystemConfig};
use crate::error::{ConfigError, Error, Result};
use crate::timing::TimingEngine;

use super::pins::StepPins;
use super::stepper::Stepper;

/// Builder for creating Stepper instances.
pub struct StepperBuilder<P, T>
where
    P: StepPins,
    T: TimingEngine,
{
    pins: Option<P>,
    timing: Option<T>,
    config: StepperConfig,
}

impl<P, T> Default for StepperBuilder<P, T>
where
    P: StepPins,
    T: TimingEngine,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P, T> StepperBuilder<P, T>
where
    P: StepPins,
    T: TimingEngine,
{
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            pins: None,
            timing: None,
            config: StepperConfig::default(),
        }
    }

    /// Set the step and direction lines.
    pub fn pins(mut self, pins: P) -> Self {
        self.pins = Some(pins);
        self
    }

    /// Set the timing engine.
    pub fn timing(mut self, timing: T) -> Self {
        self.timing = Some(timing);
        self
    }

    /// Set the stepper name.
    pub fn name(mut self, name: &str) -> Self {
        self.config.name = heapless::String::try_from(name).unwrap_or_default();
        self
    }

    /// Set the cruise interval in nanoseconds.
    pub fn microstep_interval_ns(mut self, interval_ns: u64) -> Self {
        self.config.microstep_interval_ns = interval_ns;
        self
    }

    /// Set the acceleration in microsteps per second squared.
    pub fn acceleration(mut self, acceleration: u32) -> Self {
        self.config.acceleration = acceleration;
        self
    }

    /// Count a step on both edges of the step line.
    pub fn dual_edge(mut self, dual_edge: bool) -> Self {
        self.config.dual_edge = dual_edge;
        self
    }

    /// Set direction inversion.
    pub fn invert_direction(mut self, invert: bool) -> Self {
        self.config.invert_direction = invert;
        self
    }

    /// Set the exact square root threshold and re-anchoring period.
    pub fn accurate_steps(mut self, steps: u32) -> Self {
        self.config.accurate_steps = steps;
        self
    }

    /// Set the integer square root scale factor.
    pub fn root_factor(mut self, factor: u64) -> Self {
        self.config.root_factor = factor;
        self
    }

    /// Configure from a StepperConfig.
    pub fn from_stepper_config(mut self, config: &StepperConfig) -> Self {
        self.config = config.clone();
        self
    }

    /// Configure from SystemConfig by stepper name.
    pub fn from_config(self, config: &SystemConfig, stepper_name: &str) -> Result<Self> {
        let stepper_config = config.stepper(stepper_name).ok_or_else(|| {
            Error::Config(ConfigError::StepperNotFound(
                heapless::String::try_from(stepper_name).unwrap_or_default(),
            ))
        })?;

        Ok(self.from_stepper_config(stepper_config))
    }

    /// Build the Stepper with the default event queue.
    ///
    /// # Errors
    ///
    /// Returns an error if pins or timing are missing, the configuration is
    /// invalid, or the timing engine fails to initialise.
    pub fn build(self) -> Result<Stepper<P, T>> {
        self.build_with_queue()
    }

    /// Build the Stepper with an event queue of `Q` entries.
    ///
    /// # Errors
    ///
    /// Same as [`build`](Self::build).
    pub fn build_with_queue<const Q: usize>(self) -> Result<Stepper<P, T, Q>> {
        let pins = self
            .pins
            .ok_or_else(|| Error::Config(ConfigError::MissingField("pins")))?;

        let timing = self
            .timing
            .ok_or_else(|| Error::Config(ConfigError::MissingField("timing")))?;

        Stepper::with_queue(pins, timing, &self.config)
    }
}
