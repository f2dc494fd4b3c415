//! Stepper motion state machine.
//!
//! Generic over the step/direction lines and the timing back end.

use core::cell::RefCell;

use critical_section::Mutex;

use crate::config::{validate_stepper, StepperConfig};
use crate::error::{Error, MotionError, RampError, Result};
use crate::event::{Event, EventCallback, EventDispatcher, ExecContext, WorkNotifier};
use crate::ramp::{plan_move, plan_stop, plan_velocity, MotionPhase, RampPlan};
use crate::timing::{TickKind, TimingEngine, TimingSettings};

use super::pins::StepPins;
use super::state::{Direction, MotionState, RunMode};

/// Default capacity of the interrupt-context event queue.
pub const DEFAULT_EVENT_QUEUE: usize = 8;

/// Step/direction stepper with a trapezoidal velocity profile.
///
/// All motion state lives behind a critical-section mutex, so every method
/// takes `&self` and the same instance can be shared between thread code
/// and the timer interrupt. The platform routes its timer interrupt or
/// deferred callback to [`on_tick`](Self::on_tick).
///
/// Generic over:
/// - `P`: step and direction lines (must implement [`StepPins`])
/// - `T`: timing back end (must implement [`TimingEngine`])
/// - `Q`: capacity of the interrupt-context event queue
///
/// Commands are meant to be issued from thread context. Events they raise
/// are delivered to the callback before the command returns.
pub struct Stepper<P, T, const Q: usize = DEFAULT_EVENT_QUEUE>
where
    P: StepPins,
    T: TimingEngine,
{
    /// Stepper name for logging/debugging.
    name: heapless::String<32>,

    /// Mutable motion state, pins and timing engine.
    core: Mutex<RefCell<MotionCore<P, T>>>,

    /// Event routing to the user callback.
    events: EventDispatcher<Q>,
}

impl<P, T> Stepper<P, T>
where
    P: StepPins,
    T: TimingEngine,
{
    /// Create a stepper with the default event queue capacity.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the timing engine
    /// cannot be initialised.
    pub fn new(pins: P, timing: T, config: &StepperConfig) -> Result<Self> {
        Self::with_queue(pins, timing, config)
    }
}

impl<P, T, const Q: usize> Stepper<P, T, Q>
where
    P: StepPins,
    T: TimingEngine,
{
    /// Create a stepper with an event queue of `Q` entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the timing engine
    /// cannot be initialised.
    pub fn with_queue(pins: P, mut timing: T, config: &StepperConfig) -> Result<Self> {
        validate_stepper(config)?;
        timing.init(TimingSettings::from(config))?;

        let core = MotionCore {
            state: MotionState::new(config.microstep_interval_ns, config.acceleration),
            pins,
            timing,
            dual_edge: config.dual_edge,
            invert_direction: config.invert_direction,
            stopping: false,
            direction_set: false,
            active_acceleration: config.acceleration,
            aborted: None,
        };

        info!(
            "stepper {} ready, interval {} ns, acceleration {}",
            config.name.as_str(),
            config.microstep_interval_ns,
            config.acceleration
        );

        Ok(Self {
            name: config.name.clone(),
            core: Mutex::new(RefCell::new(core)),
            events: EventDispatcher::new(),
        })
    }

    /// Get the stepper name.
    #[inline]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Move by `steps` microsteps relative to the actual position.
    ///
    /// # Errors
    ///
    /// - `MotionError::DirectionConflict` when reversing while moving with
    ///   nonzero acceleration
    /// - `RampError::InsufficientSteps` when the move is too short to
    ///   decelerate from the current speed
    /// - timing or pin errors from starting the move
    pub fn move_by(&self, steps: i32) -> Result<()> {
        self.command(|core| core.move_by(steps))
    }

    /// Move to an absolute position in microsteps.
    ///
    /// # Errors
    ///
    /// Same as [`move_by`](Self::move_by).
    pub fn move_to(&self, position: i32) -> Result<()> {
        self.command(|core| {
            let delta = position.saturating_sub(core.state.actual_position);
            core.move_by(delta)
        })
    }

    /// Run in `direction` until [`stop`](Self::stop) is called.
    ///
    /// # Errors
    ///
    /// Same as [`move_by`](Self::move_by), except that a velocity run never
    /// reports `InsufficientSteps`.
    pub fn run(&self, direction: Direction) -> Result<()> {
        self.command(|core| {
            let interval_ns = core.state.microstep_interval_ns;
            core.start(RunMode::Velocity, direction, 0, interval_ns)
        })
    }

    /// Stop the current motion.
    ///
    /// Without acceleration the motor halts at once. Otherwise it ramps down
    /// from the current speed and `Stopped` fires when it comes to rest.
    /// Stopping an idle or already stopping motor does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the timing engine cannot be stopped or
    /// reprogrammed.
    pub fn stop(&self) -> Result<()> {
        self.command(MotionCore::stop)
    }

    /// Set the cruise interval in nanoseconds.
    ///
    /// A move in progress is re-planned from its current speed.
    ///
    /// # Errors
    ///
    /// - `RampError::InvalidInterval` if `interval_ns` is zero
    /// - planning or timing errors from re-planning the move in progress, in
    ///   which case the previous interval stays in effect
    pub fn set_microstep_interval(&self, interval_ns: u64) -> Result<()> {
        if interval_ns == 0 {
            return Err(Error::Ramp(RampError::InvalidInterval));
        }
        self.command(|core| core.set_interval(interval_ns))
    }

    /// Set the acceleration in microsteps per second squared.
    ///
    /// Takes effect from the next move or speed change. Zero disables
    /// ramping.
    pub fn set_acceleration(&self, acceleration: u32) {
        self.with_core(|core| core.state.acceleration = acceleration);
    }

    /// Redefine the actual position without moving.
    pub fn set_reference_position(&self, position: i32) {
        self.with_core(|core| core.state.actual_position = position);
    }

    /// Get the actual position in microsteps.
    pub fn get_actual_position(&self) -> i32 {
        self.with_core(|core| core.state.actual_position)
    }

    /// Check if step ticks are being generated.
    pub fn is_moving(&self) -> bool {
        self.with_core(|core| core.timing.is_running())
    }

    /// Take a consistent copy of the motion state.
    pub fn snapshot(&self) -> MotionState {
        self.with_core(|core| core.snapshot())
    }

    /// Set or clear the event callback.
    ///
    /// The callback always runs outside interrupt context and outside the
    /// stepper's lock, so it may issue new commands.
    pub fn set_event_callback(&self, callback: Option<EventCallback>) {
        self.events.set_callback(callback);
    }

    /// Set or clear the hook that schedules [`process_events`](Self::process_events).
    pub fn set_event_notifier(&self, notifier: Option<WorkNotifier>) {
        self.events.set_notifier(notifier);
    }

    /// Deliver events queued from interrupt context. Call from thread
    /// context. Returns the number of events delivered.
    pub fn process_events(&self) -> usize {
        self.events.process()
    }

    /// Feed an externally detected event (stall, end stop) through the
    /// stepper's dispatch path.
    pub fn report_event(&self, event: Event, context: ExecContext) {
        debug!("external event {}", event);
        self.events.raise(event, context);
    }

    /// Number of interrupt-context events lost to a full queue.
    pub fn dropped_events(&self) -> u32 {
        self.events.dropped()
    }

    /// Handle one timer tick.
    ///
    /// Drives exactly one edge of the step line. Failures are logged, stop
    /// the motor and raise `Stopped`.
    pub fn on_tick(&self) {
        let event = self.with_core(MotionCore::tick);
        if let Some(event) = event {
            self.events.raise(event, T::CONTEXT);
        }
    }

    fn with_core<R>(&self, f: impl FnOnce(&mut MotionCore<P, T>) -> R) -> R {
        critical_section::with(|cs| f(&mut self.core.borrow_ref_mut(cs)))
    }

    /// Run a command under the lock, then raise its events outside it.
    ///
    /// A command that fails after it already stopped the motor still reports
    /// `Stopped` before the error is returned.
    fn command(
        &self,
        f: impl FnOnce(&mut MotionCore<P, T>) -> Result<Option<Event>>,
    ) -> Result<()> {
        let (result, aborted) = self.with_core(|core| {
            let result = f(core);
            (result, core.aborted.take())
        });
        if let Some(event) = aborted {
            self.events.raise(event, ExecContext::Thread);
        }
        if let Some(event) = result? {
            self.events.raise(event, ExecContext::Thread);
        }
        Ok(())
    }
}

/// Everything guarded by the stepper's lock.
struct MotionCore<P, T> {
    /// Motion bookkeeping.
    state: MotionState,

    /// Step and direction lines.
    pins: P,

    /// Timing back end.
    timing: T,

    /// Count a step on both edges of the step line.
    dual_edge: bool,

    /// Whether direction pin logic is inverted.
    invert_direction: bool,

    /// Current motion is the ramp-down requested by `stop()`.
    stopping: bool,

    /// Direction line has been written at least once.
    direction_set: bool,

    /// Acceleration the loaded plan was computed with.
    active_acceleration: u32,

    /// Event owed by a command that gave up on the motion in progress.
    aborted: Option<Event>,
}

impl<P, T> MotionCore<P, T>
where
    P: StepPins,
    T: TimingEngine,
{
    fn snapshot(&self) -> MotionState {
        MotionState {
            step_pin_state: self.pins.step_is_high(),
            moving: self.timing.is_running(),
            phase: self.timing.ramp().phase(),
            ..self.state
        }
    }

    fn move_by(&mut self, steps: i32) -> Result<Option<Event>> {
        let direction = if steps == 0 {
            self.state.direction
        } else {
            Direction::from_steps(steps.into())
        };
        let interval_ns = self.state.microstep_interval_ns;
        self.start(RunMode::Position, direction, steps, interval_ns)
    }

    /// Plan and launch a motion, or re-plan the one in progress.
    fn start(
        &mut self,
        mode: RunMode,
        direction: Direction,
        steps: i32,
        interval_ns: u64,
    ) -> Result<Option<Event>> {
        let acceleration = self.state.acceleration;
        let running = self.timing.is_running();
        let reversing = running && direction != self.state.direction;

        if reversing && acceleration > 0 {
            warn!("reversal rejected while moving");
            return Err(Error::Motion(MotionError::DirectionConflict));
        }

        let (start_ns, resume_index) = if running && !reversing {
            self.resume_point()
        } else {
            (0, 0)
        };

        let plan = match mode {
            RunMode::Position => {
                plan_move(steps, start_ns, interval_ns, acceleration, resume_index)?
            }
            RunMode::Velocity => {
                plan_velocity(start_ns, interval_ns, acceleration, resume_index)?
            }
        };

        debug!(
            "plan {} accel {} const {} decel {} from index {}",
            mode,
            plan.accel_steps,
            plan.const_steps,
            plan.decel_steps,
            plan.step_index
        );

        if plan.is_empty() {
            self.halt()?;
            self.state.run_mode = RunMode::Position;
            self.state.remaining_steps = 0;
            self.state.microstep_interval_ns = interval_ns;
            self.stopping = false;
            return Ok(Some(Event::StepsCompleted));
        }

        if reversing {
            // Nothing has changed yet if the direction line cannot be written
            self.apply_direction(direction)?;
            if let Err(e) = self.halt().and_then(|()| self.launch(&plan, direction)) {
                warn!("restart after reversal failed: {}", e);
                self.abort();
                self.aborted = Some(Event::Stopped);
                return Err(e);
            }
        } else {
            self.launch(&plan, direction)?;
        }

        self.state.run_mode = mode;
        self.state.remaining_steps = match mode {
            RunMode::Position => steps,
            RunMode::Velocity => direction.sign() * i32::MAX,
        };
        self.state.microstep_interval_ns = interval_ns;
        self.active_acceleration = acceleration;
        self.stopping = false;
        Ok(None)
    }

    fn stop(&mut self) -> Result<Option<Event>> {
        if !self.timing.is_running() || self.stopping {
            return Ok(None);
        }

        let positional = self.state.run_mode == RunMode::Position;
        let remaining = self.state.remaining_steps.unsigned_abs();
        if positional && remaining == 0 {
            // Only the settle edge of the last step is left
            return Ok(None);
        }

        let (start_ns, resume_index) = self.resume_point();
        let mut plan = plan_stop(start_ns, self.state.acceleration, resume_index);
        if positional && plan.decel_steps > remaining {
            // Never run past the commanded target
            plan = plan_stop(start_ns, self.state.acceleration, remaining);
        }

        if plan.is_empty() {
            self.halt()?;
            self.state.run_mode = RunMode::Position;
            self.state.remaining_steps = 0;
            debug!("halted");
            return Ok(Some(Event::Stopped));
        }

        self.timing.update(&plan)?;

        debug!("ramping down over {} steps", plan.decel_steps);
        self.state.run_mode = RunMode::Position;
        let decel_steps = i32::try_from(plan.decel_steps).unwrap_or(i32::MAX);
        self.state.remaining_steps = self.state.direction.sign() * decel_steps;
        self.active_acceleration = self.state.acceleration;
        self.stopping = true;
        Ok(None)
    }

    fn set_interval(&mut self, interval_ns: u64) -> Result<Option<Event>> {
        if !self.timing.is_running() || self.stopping {
            self.state.microstep_interval_ns = interval_ns;
            return Ok(None);
        }

        let direction = self.state.direction;
        match self.state.run_mode {
            RunMode::Position => {
                let remaining = self.state.remaining_steps;
                self.start(RunMode::Position, direction, remaining, interval_ns)
            }
            RunMode::Velocity => self.start(RunMode::Velocity, direction, 0, interval_ns),
        }
    }

    /// Speed of the motion in progress as `(interval, ramp index)`.
    ///
    /// The ramp index only carries over while the acceleration is unchanged;
    /// otherwise it is derived from the interval.
    fn resume_point(&self) -> (u64, u32) {
        let interval_ns = self.timing.current_interval_ns();
        let index = if self.active_acceleration == self.state.acceleration {
            self.timing.ramp().index()
        } else {
            0
        };
        (interval_ns, index)
    }

    /// Set the direction if needed, load the plan and make sure ticks run.
    fn launch(&mut self, plan: &RampPlan, direction: Direction) -> Result<()> {
        if !self.timing.is_running() {
            self.apply_direction(direction)?;
            self.timing.update(plan)?;
            self.timing.start()?;
        } else {
            self.timing.update(plan)?;
        }
        Ok(())
    }

    fn apply_direction(&mut self, direction: Direction) -> Result<()> {
        if self.direction_set && self.state.direction == direction {
            return Ok(());
        }

        let high = (direction == Direction::Positive) != self.invert_direction;
        self.pins.set_direction(high)?;
        self.state.direction = direction;
        self.direction_set = true;
        Ok(())
    }

    /// Stop ticking and leave the step line low.
    fn halt(&mut self) -> Result<()> {
        let stopped = self.timing.stop();
        let lowered = if !self.dual_edge && self.pins.step_is_high() {
            self.pins.toggle_step().map(drop)
        } else {
            Ok(())
        };
        self.state.step_pin_state = self.pins.step_is_high();
        stopped?;
        lowered?;
        Ok(())
    }

    /// Give up on the motion in progress, leaving the motor at rest.
    fn abort(&mut self) {
        if let Err(e) = self.halt() {
            error!("halt failed: {}", e);
        }
        self.state.run_mode = RunMode::Position;
        self.state.remaining_steps = 0;
        self.state.phase = MotionPhase::Complete;
        self.stopping = false;
    }

    fn tick(&mut self) -> Option<Event> {
        match self.step() {
            Ok(event) => event,
            Err(e) => {
                error!("step tick failed: {}", e);
                self.abort();
                Some(Event::Stopped)
            }
        }
    }

    fn step(&mut self) -> Result<Option<Event>> {
        let Some(kind) = self.timing.on_tick()? else {
            return Ok(None);
        };

        self.state.step_pin_state = self.pins.toggle_step()?;

        if kind == TickKind::Pulse {
            self.state.actual_position = self
                .state
                .actual_position
                .wrapping_add(self.state.direction.sign());
            if self.state.run_mode == RunMode::Position {
                self.state.remaining_steps -= self.state.remaining_steps.signum();
            }

            let phase = self.timing.ramp().phase();
            if phase != self.state.phase {
                trace!("phase {} -> {}", self.state.phase, phase);
                self.state.phase = phase;
            }
        }

        let settled = self.dual_edge || !self.state.step_pin_state;
        if self.state.run_mode == RunMode::Position && self.state.remaining_steps == 0 && settled {
            self.timing.stop()?;
            self.state.phase = MotionPhase::Complete;

            let event = if self.stopping {
                Event::Stopped
            } else {
                Event::StepsCompleted
            };
            self.stopping = false;
            debug!("motion finished at {}", self.state.actual_position);
            return Ok(Some(event));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PinError, TimingError};
    use crate::ramp::RampCursor;
    use std::cell::RefCell;
    use std::vec::Vec;

    /// Pins that record the level after every write.
    #[derive(Default)]
    struct RecordingPins {
        step_high: bool,
        dir_writes: Vec<bool>,
        edges: usize,
    }

    impl StepPins for RecordingPins {
        fn toggle_step(&mut self) -> core::result::Result<bool, PinError> {
            self.step_high = !self.step_high;
            self.edges += 1;
            Ok(self.step_high)
        }

        fn set_direction(&mut self, high: bool) -> core::result::Result<(), PinError> {
            self.dir_writes.push(high);
            Ok(())
        }

        fn step_is_high(&self) -> bool {
            self.step_high
        }
    }

    /// Engine driven by hand, ticks in thread context.
    #[derive(Default)]
    struct ManualTiming {
        clock: crate::timing::StepClock,
        running: bool,
    }

    impl TimingEngine for ManualTiming {
        const CONTEXT: ExecContext = ExecContext::Thread;

        fn init(&mut self, settings: TimingSettings) -> core::result::Result<(), TimingError> {
            self.clock.configure(settings);
            Ok(())
        }

        fn update(&mut self, plan: &RampPlan) -> core::result::Result<(), TimingError> {
            self.clock.load(plan);
            Ok(())
        }

        fn start(&mut self) -> core::result::Result<(), TimingError> {
            self.clock.rearm();
            self.running = true;
            Ok(())
        }

        fn stop(&mut self) -> core::result::Result<(), TimingError> {
            self.running = false;
            Ok(())
        }

        fn is_running(&self) -> bool {
            self.running
        }

        fn current_interval_ns(&self) -> u64 {
            self.clock.ramp().interval_ns()
        }

        fn ramp(&self) -> &RampCursor {
            self.clock.ramp()
        }

        fn on_tick(&mut self) -> core::result::Result<Option<TickKind>, TimingError> {
            if !self.running {
                return Ok(None);
            }
            Ok(Some(self.clock.tick()))
        }
    }

    std::thread_local! {
        static EVENTS: RefCell<Vec<Event>> = RefCell::new(Vec::new());
    }

    fn record(event: Event) {
        EVENTS.with(|events| events.borrow_mut().push(event));
    }

    fn events() -> Vec<Event> {
        EVENTS.with(|events| events.borrow().clone())
    }

    fn stepper(config: StepperConfig) -> Stepper<RecordingPins, ManualTiming> {
        let stepper =
            Stepper::new(RecordingPins::default(), ManualTiming::default(), &config).unwrap();
        stepper.set_event_callback(Some(record));
        stepper
    }

    fn run_to_rest(stepper: &Stepper<RecordingPins, ManualTiming>) -> usize {
        let mut ticks = 0;
        while stepper.is_moving() && ticks < 1_000_000 {
            stepper.on_tick();
            ticks += 1;
        }
        ticks
    }

    #[test]
    fn test_single_edge_move() {
        let stepper = stepper(StepperConfig::default());
        stepper.move_by(3).unwrap();

        // three pulses and three settles
        assert_eq!(run_to_rest(&stepper), 6);
        assert_eq!(stepper.get_actual_position(), 3);
        assert_eq!(events(), [Event::StepsCompleted]);
        assert!(!stepper.snapshot().step_pin_state);
    }

    #[test]
    fn test_dual_edge_move() {
        let stepper = stepper(StepperConfig {
            dual_edge: true,
            ..StepperConfig::default()
        });
        stepper.move_by(-4).unwrap();

        assert_eq!(run_to_rest(&stepper), 4);
        assert_eq!(stepper.get_actual_position(), -4);
    }

    #[test]
    fn test_inverted_direction_level() {
        let stepper = stepper(StepperConfig {
            invert_direction: true,
            ..StepperConfig::default()
        });
        stepper.move_by(1).unwrap();
        run_to_rest(&stepper);
        stepper.move_by(-1).unwrap();
        run_to_rest(&stepper);

        let writes = stepper.with_core(|core| core.pins.dir_writes.clone());
        assert_eq!(writes, [false, true]);
    }

    #[test]
    fn test_stop_with_ramp_reports_stopped() {
        let stepper = stepper(StepperConfig {
            acceleration: 1000,
            ..StepperConfig::default()
        });
        stepper.run(Direction::Positive).unwrap();
        for _ in 0..100 {
            stepper.on_tick();
        }

        stepper.stop().unwrap();
        let snapshot = stepper.snapshot();
        assert_eq!(snapshot.run_mode, RunMode::Position);
        assert_eq!(snapshot.remaining_steps, 50);

        run_to_rest(&stepper);
        assert_eq!(events(), [Event::Stopped]);
        assert_eq!(stepper.get_actual_position(), 100);
    }

    #[test]
    fn test_interval_change_keeps_mode() {
        let stepper = stepper(StepperConfig::default());
        stepper.run(Direction::Negative).unwrap();
        stepper.set_microstep_interval(500_000).unwrap();

        let snapshot = stepper.snapshot();
        assert_eq!(snapshot.run_mode, RunMode::Velocity);
        assert_eq!(snapshot.microstep_interval_ns, 500_000);
        assert_eq!(snapshot.remaining_steps, -i32::MAX);
        assert!(stepper.is_moving());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let stepper = stepper(StepperConfig::default());

        assert_eq!(
            stepper.set_microstep_interval(0),
            Err(Error::Ramp(RampError::InvalidInterval))
        );
        assert_eq!(stepper.snapshot().microstep_interval_ns, 1_000_000);
    }
}
