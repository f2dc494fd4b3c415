//! Event module for stepper-pulse.
//!
//! Motion events and the interrupt-safe path that delivers them.

mod dispatcher;

pub use dispatcher::EventDispatcher;

/// Notification raised by a stepper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// A position move finished all of its steps.
    StepsCompleted,
    /// Motion ended because of `stop()` or a fault.
    Stopped,
    /// The driver reported a stall.
    StallDetected,
    /// The left end stop triggered.
    LeftEndStopDetected,
    /// The right end stop triggered.
    RightEndStopDetected,
}

/// Execution context an event is raised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExecContext {
    /// Thread or work-queue context; callbacks may run directly.
    Thread,
    /// Interrupt context; callbacks are deferred.
    Interrupt,
}

/// User callback invoked for every event, always outside interrupt context.
pub type EventCallback = fn(Event);

/// Hook asking the platform to run [`EventDispatcher::process`] from a
/// non-interrupt context, e.g. by submitting a work item.
pub type WorkNotifier = fn();
