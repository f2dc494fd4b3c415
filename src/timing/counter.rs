//! Hardware counter timing.

use crate::error::TimingError;
use crate::event::ExecContext;
use crate::ramp::{RampCursor, RampPlan, NS_PER_SEC};

use super::{StepClock, TickKind, TimingEngine, TimingSettings};

/// Reloadable hardware counter.
///
/// The counter counts up at [`frequency`](CounterTimer::frequency) and raises
/// its interrupt when it reaches the top value, then restarts from zero. The
/// platform routes that interrupt to [`Stepper::on_tick`].
///
/// [`Stepper::on_tick`]: crate::Stepper::on_tick
pub trait CounterTimer {
    /// Error reported by the timer hardware.
    type Error;

    /// Counter frequency in Hz.
    fn frequency(&self) -> u32;

    /// Program the top value used from the next period on.
    fn set_top(&mut self, ticks: u32) -> Result<(), Self::Error>;

    /// Start counting.
    fn start(&mut self) -> Result<(), Self::Error>;

    /// Stop counting.
    fn stop(&mut self) -> Result<(), Self::Error>;

    /// Convert counter ticks to nanoseconds.
    fn ticks_to_ns(&self, ticks: u32) -> u64 {
        u64::from(ticks) * NS_PER_SEC / u64::from(self.frequency().max(1))
    }

    /// Convert nanoseconds to counter ticks, rounding down.
    fn ns_to_ticks(&self, ns: u64) -> u64 {
        let frequency = u64::from(self.frequency());
        (ns / NS_PER_SEC) * frequency + (ns % NS_PER_SEC) * frequency / NS_PER_SEC
    }
}

/// Timing engine on a reloadable hardware counter.
///
/// The top value for the next period is written while the current tick is
/// being handled, before the step line moves, so the reload never lags a
/// step behind. The stepper calls into this engine only inside its critical
/// section, which keeps reprogramming exclusive between the interrupt and
/// command paths.
pub struct CounterTiming<C> {
    timer: C,
    clock: StepClock,
    running: bool,
}

impl<C: CounterTimer> CounterTiming<C> {
    /// Wrap a hardware counter.
    pub fn new(timer: C) -> Self {
        Self {
            timer,
            clock: StepClock::new(),
            running: false,
        }
    }

    /// Access the underlying counter.
    #[inline]
    pub fn timer(&self) -> &C {
        &self.timer
    }

    /// Release the underlying counter.
    pub fn release(self) -> C {
        self.timer
    }

    fn program(&mut self) -> Result<(), TimingError> {
        let period_ns = self.clock.period_ns();
        let ticks = u32::try_from(self.timer.ns_to_ticks(period_ns))
            .map_err(|_| TimingError::IntervalOutOfRange { period_ns })?
            .max(1);

        self.timer.set_top(ticks).map_err(|_| {
            error!("timer rejected top value {}", ticks);
            TimingError::TimerConfig
        })
    }
}

impl<C: CounterTimer> TimingEngine for CounterTiming<C> {
    const CONTEXT: ExecContext = ExecContext::Interrupt;

    fn init(&mut self, settings: TimingSettings) -> Result<(), TimingError> {
        self.clock.configure(settings);
        self.timer.stop().map_err(|_| TimingError::TimerConfig)?;
        self.running = false;
        Ok(())
    }

    fn update(&mut self, plan: &RampPlan) -> Result<(), TimingError> {
        let previous = self.clock;
        self.clock.load(plan);

        if self.running {
            if let Err(e) = self.program() {
                self.clock = previous;
                return Err(e);
            }
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), TimingError> {
        if self.running {
            return Ok(());
        }

        self.clock.rearm();
        self.program()?;
        self.timer.start().map_err(|_| TimingError::TimerConfig)?;
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TimingError> {
        if !self.running {
            return Ok(());
        }

        self.running = false;
        self.timer.stop().map_err(|_| {
            error!("timer refused to stop");
            TimingError::TimerConfig
        })
    }

    #[inline]
    fn is_running(&self) -> bool {
        self.running
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
        if !self.running {
            return Ok(None);
        }

        let kind = self.clock.tick();
        if kind == TickKind::Pulse {
            // Settle ticks reuse the half period already loaded
            self.program()?;
        }
        Ok(Some(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ramp::plan_move;
    use std::vec::Vec;

    #[derive(Default)]
    struct FakeCounter {
        tops: Vec<u32>,
        running: bool,
        reject: bool,
        stuck: bool,
    }

    impl CounterTimer for FakeCounter {
        type Error = ();

        fn frequency(&self) -> u32 {
            1_000_000
        }

        fn set_top(&mut self, ticks: u32) -> Result<(), ()> {
            if self.reject {
                return Err(());
            }
            self.tops.push(ticks);
            Ok(())
        }

        fn start(&mut self) -> Result<(), ()> {
            self.running = true;
            Ok(())
        }

        fn stop(&mut self) -> Result<(), ()> {
            if self.stuck {
                return Err(());
            }
            self.running = false;
            Ok(())
        }
    }

    fn engine(dual_edge: bool) -> CounterTiming<FakeCounter> {
        let mut engine = CounterTiming::new(FakeCounter::default());
        engine
            .init(TimingSettings {
                dual_edge,
                ..TimingSettings::default()
            })
            .unwrap();
        engine
    }

    #[test]
    fn test_conversions() {
        let timer = FakeCounter::default();
        assert_eq!(timer.ns_to_ticks(1_000_000), 1_000);
        assert_eq!(timer.ns_to_ticks(2_500_000_000), 2_500_000);
        assert_eq!(timer.ticks_to_ns(1_000), 1_000_000);
    }

    #[test]
    fn test_start_programs_first_period() {
        let mut engine = engine(true);
        engine.update(&RampPlan::constant(10, 2_000_000)).unwrap();
        engine.start().unwrap();

        assert!(engine.is_running());
        assert!(engine.timer().running);
        assert_eq!(engine.timer().tops, [2_000]);
    }

    #[test]
    fn test_reprograms_on_pulse_only() {
        let mut engine = engine(false);
        engine.update(&RampPlan::constant(10, 2_000_000)).unwrap();
        engine.start().unwrap();

        assert_eq!(engine.on_tick(), Ok(Some(TickKind::Pulse)));
        assert_eq!(engine.on_tick(), Ok(Some(TickKind::Settle)));
        assert_eq!(engine.timer().tops, [1_000, 1_000]);
    }

    #[test]
    fn test_accelerating_tops_shrink() {
        let mut engine = engine(true);
        engine.update(&plan_move(200, 0, 1_000_000, 1000, 0).unwrap()).unwrap();
        engine.start().unwrap();
        for _ in 0..50 {
            engine.on_tick().unwrap();
        }

        let tops = &engine.timer().tops;
        assert!(tops.windows(2).all(|pair| pair[1] <= pair[0]));
        assert!(tops[0] > *tops.last().unwrap());
    }

    #[test]
    fn test_tick_after_stop_is_ignored() {
        let mut engine = engine(true);
        engine.update(&RampPlan::constant(10, 1_000_000)).unwrap();
        engine.start().unwrap();
        engine.stop().unwrap();

        assert_eq!(engine.on_tick(), Ok(None));
        assert!(!engine.timer().running);
    }

    #[test]
    fn test_failed_stop_still_ignores_ticks() {
        let mut engine = engine(false);
        engine.update(&RampPlan::constant(10, 1_000_000)).unwrap();
        engine.start().unwrap();

        engine.timer.stuck = true;
        assert_eq!(engine.stop(), Err(TimingError::TimerConfig));

        assert!(!engine.is_running());
        assert_eq!(engine.on_tick(), Ok(None));
    }

    #[test]
    fn test_rejected_update_keeps_previous_plan() {
        let mut engine = engine(true);
        engine.update(&RampPlan::constant(10, 1_000_000)).unwrap();
        engine.start().unwrap();

        engine.timer.reject = true;
        let result = engine.update(&RampPlan::constant(10, 5_000_000));

        assert_eq!(result, Err(TimingError::TimerConfig));
        assert_eq!(engine.current_interval_ns(), 1_000_000);
    }

    #[test]
    fn test_period_out_of_range() {
        struct FastCounter;
        impl CounterTimer for FastCounter {
            type Error = ();
            fn frequency(&self) -> u32 {
                u32::MAX
            }
            fn set_top(&mut self, _: u32) -> Result<(), ()> {
                Ok(())
            }
            fn start(&mut self) -> Result<(), ()> {
                Ok(())
            }
            fn stop(&mut self) -> Result<(), ()> {
                Ok(())
            }
        }

        let mut engine = CounterTiming::new(FastCounter);
        engine.init(TimingSettings::default()).unwrap();
        engine.update(&RampPlan::constant(1, 10 * NS_PER_SEC)).unwrap();

        assert_eq!(
            engine.start(),
            Err(TimingError::IntervalOutOfRange {
                period_ns: 5 * NS_PER_SEC
            })
        );
        assert!(!engine.is_running());
    }
}
