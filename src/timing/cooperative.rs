//! Work-queue timing.

use crate::error::TimingError;
use crate::event::ExecContext;
use crate::ramp::{RampCursor, RampPlan};

use super::{StepClock, TickKind, TimingEngine, TimingSettings};

/// Deferred work submission, e.g. a delayable work item on a system queue.
///
/// When the delay expires the platform calls [`Stepper::on_tick`] from the
/// work-queue thread.
///
/// [`Stepper::on_tick`]: crate::Stepper::on_tick
pub trait DeferredScheduler {
    /// Error reported by the scheduler.
    type Error;

    /// Submit the tick to run after `delay_ns`, replacing any pending
    /// submission.
    fn schedule(&mut self, delay_ns: u64) -> Result<(), Self::Error>;

    /// Cancel the pending submission, if any.
    fn cancel(&mut self) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkState {
    Idle,
    Scheduled,
}

/// Timing engine that reschedules itself on a work queue.
///
/// Ticks run in thread context, so events are delivered straight to the
/// callback.
pub struct CooperativeTiming<S> {
    scheduler: S,
    clock: StepClock,
    state: WorkState,
}

impl<S: DeferredScheduler> CooperativeTiming<S> {
    /// Wrap a deferred-work scheduler.
    pub fn new(scheduler: S) -> Self {
        Self {
            scheduler,
            clock: StepClock::new(),
            state: WorkState::Idle,
        }
    }

    /// Access the underlying scheduler.
    #[inline]
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Release the underlying scheduler.
    pub fn release(self) -> S {
        self.scheduler
    }

    fn submit(&mut self) -> Result<(), TimingError> {
        let delay_ns = self.clock.period_ns();
        self.scheduler.schedule(delay_ns).map_err(|_| {
            error!("work submission failed, delay {} ns", delay_ns);
            TimingError::Scheduler
        })
    }
}

impl<S: DeferredScheduler> TimingEngine for CooperativeTiming<S> {
    const CONTEXT: ExecContext = ExecContext::Thread;

    fn init(&mut self, settings: TimingSettings) -> Result<(), TimingError> {
        self.clock.configure(settings);
        self.scheduler
            .cancel()
            .map_err(|_| TimingError::Scheduler)?;
        self.state = WorkState::Idle;
        Ok(())
    }

    fn update(&mut self, plan: &RampPlan) -> Result<(), TimingError> {
        let previous = self.clock;
        self.clock.load(plan);

        if self.state == WorkState::Scheduled {
            if let Err(e) = self.submit() {
                self.clock = previous;
                return Err(e);
            }
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), TimingError> {
        if self.state == WorkState::Scheduled {
            return Ok(());
        }

        self.clock.rearm();
        self.submit()?;
        self.state = WorkState::Scheduled;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TimingError> {
        if self.state == WorkState::Idle {
            return Ok(());
        }

        self.state = WorkState::Idle;
        self.scheduler
            .cancel()
            .map_err(|_| TimingError::Scheduler)
    }

    #[inline]
    fn is_running(&self) -> bool {
        self.state == WorkState::Scheduled
    }

    #[inline]
    fn current_interval_ns(&self) -> u64 {
        self.clock.ramp().interval_ns()
    }

    #[inline]
    fn ramp(&self) -> &RampCursor {
        self.clock.ramp()
    }

    fn on_tick(&mut self) -> Result<Option<TickKind>, TimingError> {
        if self.state == WorkState::Idle {
            return Ok(None);
        }

        let kind = self.clock.tick();
        self.submit()?;
        Ok(Some(kind))
    }
}
