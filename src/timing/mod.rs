//! Timing module for stepper-pulse.
//!
//! A [`TimingEngine`] decides when the next step edge happens. Two engines
//! are provided and chosen at construction:
//!
//! - [`CooperativeTiming`]: deferred callbacks on a work queue, ticks in
//!   thread context
//! - [`CounterTiming`]: reloadable hardware counter, ticks in interrupt
//!   context
//!
//! The platform delivers each tick to [`Stepper::on_tick`], which asks the
//! engine for the tick kind and then drives the step line.
//!
//! [`Stepper::on_tick`]: crate::Stepper::on_tick

mod cooperative;
mod counter;

pub use cooperative::{CooperativeTiming, DeferredScheduler};
pub use counter::{CounterTimer, CounterTiming};

use crate::config::StepperConfig;
use crate::error::TimingError;
use crate::event::ExecContext;
use crate::ramp::{RampCursor, RampPlan};

/// What the step line does on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickKind {
    /// Edge that commits a step.
    Pulse,
    /// Edge that returns the line low without counting (single-edge only).
    Settle,
}

/// Numeric and pulse-shape settings shared by both engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingSettings {
    /// Count a step on both edges of the step line.
    pub dual_edge: bool,
    /// Exact square-root threshold and re-anchoring period.
    pub accurate_steps: u32,
    /// Scale factor inside the integer square root.
    pub root_factor: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            dual_edge: false,
            accurate_steps: 16,
            root_factor: 1_000,
        }
    }
}

impl From<&StepperConfig> for TimingSettings {
    fn from(config: &StepperConfig) -> Self {
        Self {
            dual_edge: config.dual_edge,
            accurate_steps: config.accurate_steps,
            root_factor: config.root_factor,
        }
    }
}

/// Pulse timing back end.
pub trait TimingEngine {
    /// Context ticks are delivered in.
    const CONTEXT: ExecContext;

    /// Apply settings and put the engine in a stopped state.
    fn init(&mut self, settings: TimingSettings) -> Result<(), TimingError>;

    /// Load a new plan. A running engine continues with the new timing.
    ///
    /// On error the previous plan stays in effect.
    fn update(&mut self, plan: &RampPlan) -> Result<(), TimingError>;

    /// Begin ticking with the loaded plan.
    fn start(&mut self) -> Result<(), TimingError>;

    /// Stop ticking.
    ///
    /// The engine is stopped afterwards even when the hardware reports an
    /// error, so later ticks are ignored.
    fn stop(&mut self) -> Result<(), TimingError>;

    /// Check if ticks are being generated.
    fn is_running(&self) -> bool;

    /// Interval of the next step in nanoseconds.
    fn current_interval_ns(&self) -> u64;

    /// Ramp position of the loaded plan.
    fn ramp(&self) -> &RampCursor;

    /// Handle one expired period and arm the next.
    ///
    /// Returns `None` for a tick that arrived after the engine was stopped.
    fn on_tick(&mut self) -> Result<Option<TickKind>, TimingError>;
}

/// Pulse train state shared by the engines.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StepClock {
    ramp: RampCursor,
    dual_edge: bool,
    /// Next tick is the settle edge.
    flip_state: bool,
}

impl StepClock {
    pub(crate) const fn new() -> Self {
        Self {
            ramp: RampCursor::new(16, 1_000),
            dual_edge: false,
            flip_state: false,
        }
    }

    pub(crate) fn configure(&mut self, settings: TimingSettings) {
        self.ramp
            .configure(settings.accurate_steps, settings.root_factor);
        self.dual_edge = settings.dual_edge;
        self.flip_state = false;
    }

    pub(crate) fn load(&mut self, plan: &RampPlan) {
        self.ramp.load(plan);
    }

    /// Start from a pulse edge.
    pub(crate) fn rearm(&mut self) {
        self.flip_state = false;
    }

    pub(crate) fn ramp(&self) -> &RampCursor {
        &self.ramp
    }

    /// Classify the tick and advance the ramp on committed steps.
    pub(crate) fn tick(&mut self) -> TickKind {
        if !self.dual_edge && self.flip_state {
            self.flip_state = false;
            return TickKind::Settle;
        }

        self.flip_state = !self.dual_edge;
        let phase = self.ramp.advance();
        trace!("step committed, next phase {}", phase);
        TickKind::Pulse
    }

    /// Time until the next tick. Single-edge stepping splits every interval
    /// into a high and a low half.
    pub(crate) fn period_ns(&self) -> u64 {
        let interval = self.ramp.interval_ns();
        let period = if self.dual_edge { interval } else { interval / 2 };
        period.max(1)
    }
}

impl Default for StepClock {
    fn default() -> Self {
        Self::new()
    }
}
