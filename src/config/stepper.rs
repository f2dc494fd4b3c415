//! Stepper configuration from TOML.

use heapless::String;
use serde::Deserialize;

/// Complete stepper configuration from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StepperConfig {
    /// Human-readable name (max 32 chars).
    #[serde(default)]
    pub name: String<32>,

    /// Microstep interval at cruise speed in nanoseconds.
    #[serde(default = "default_microstep_interval_ns")]
    pub microstep_interval_ns: u64,

    /// Acceleration in microsteps per second squared (0 disables ramping).
    #[serde(default)]
    pub acceleration: u32,

    /// Count a step on both edges of the step line.
    #[serde(default)]
    pub dual_edge: bool,

    /// Invert direction pin logic.
    #[serde(default)]
    pub invert_direction: bool,

    /// Ramp indices computed with the exact square root before the
    /// recurrence takes over, and the re-anchoring period afterwards.
    #[serde(default = "default_accurate_steps")]
    pub accurate_steps: u32,

    /// Scale factor inside the integer square root.
    #[serde(default = "default_root_factor")]
    pub root_factor: u64,
}

fn default_microstep_interval_ns() -> u64 {
    1_000_000
}

fn default_accurate_steps() -> u32 {
    16
}

fn default_root_factor() -> u64 {
    1_000
}

impl StepperConfig {
    /// Configuration with every setting at its default.
    pub fn new(name: &str) -> Self {
        Self {
            name: String::try_from(name).unwrap_or_default(),
            ..Self::default()
        }
    }

    /// Cruise speed in microsteps per second.
    pub fn steps_per_second(&self) -> u64 {
        crate::ramp::NS_PER_SEC / self.microstep_interval_ns.max(1)
    }

    /// Check if moves ramp up and down.
    #[inline]
    pub fn has_ramp(&self) -> bool {
        self.acceleration > 0
    }
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            microstep_interval_ns: default_microstep_interval_ns(),
            acceleration: 0,
            dual_edge: false,
            invert_direction: false,
            accurate_steps: default_accurate_steps(),
            root_factor: default_root_factor(),
        }
    }
}
