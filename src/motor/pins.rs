//! Step and direction line access.

use embedded_hal::digital::OutputPin;

use crate::error::PinError;

/// Step and direction lines of a driver chip.
pub trait StepPins {
    /// Flip the step line. Returns the new level.
    fn toggle_step(&mut self) -> Result<bool, PinError>;

    /// Drive the direction line to the given level.
    fn set_direction(&mut self, high: bool) -> Result<(), PinError>;

    /// Current level of the step line.
    fn step_is_high(&self) -> bool;
}

/// [`StepPins`] over a pair of embedded-hal 1.0 output pins.
///
/// The step line starts low. Its level is tracked here rather than read back
/// so plain `OutputPin`s suffice.
pub struct StepDirPins<STEP, DIR>
where
    STEP: OutputPin,
    DIR: OutputPin,
{
    /// STEP pin (one edge per tick).
    step_pin: STEP,

    /// DIR pin.
    dir_pin: DIR,

    /// Last level written to the step pin.
    step_high: bool,

    /// Last level written to the direction pin, if any.
    dir_high: Option<bool>,
}

impl<STEP, DIR> StepDirPins<STEP, DIR>
where
    STEP: OutputPin,
    DIR: OutputPin,
{
    /// Wrap the step and direction pins.
    pub fn new(step_pin: STEP, dir_pin: DIR) -> Self {
        Self {
            step_pin,
            dir_pin,
            step_high: false,
            dir_high: None,
        }
    }

    /// Release the pins.
    pub fn release(self) -> (STEP, DIR) {
        (self.step_pin, self.dir_pin)
    }
}

impl<STEP, DIR> StepPins for StepDirPins<STEP, DIR>
where
    STEP: OutputPin,
    DIR: OutputPin,
{
    fn toggle_step(&mut self) -> Result<bool, PinError> {
        if self.step_high {
            self.step_pin.set_low().map_err(|_| PinError::Step)?;
        } else {
            self.step_pin.set_high().map_err(|_| PinError::Step)?;
        }
        self.step_high = !self.step_high;
        Ok(self.step_high)
    }

    fn set_direction(&mut self, high: bool) -> Result<(), PinError> {
        // Cached to avoid unnecessary pin writes
        if self.dir_high == Some(high) {
            return Ok(());
        }

        if high {
            self.dir_pin.set_high().map_err(|_| PinError::Direction)?;
        } else {
            self.dir_pin.set_low().map_err(|_| PinError::Direction)?;
        }

        self.dir_high = Some(high);
        Ok(())
    }

    #[inline]
    fn step_is_high(&self) -> bool {
        self.step_high
    }
}
