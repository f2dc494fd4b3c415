//! Capability fakes shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};
use stepper_pulse::{
    CooperativeTiming, CounterTimer, CounterTiming, DeferredScheduler, Event, StepDirPins,
    Stepper, StepperConfig,
};

// =============================================================================
// Pins
// =============================================================================

/// Writes seen by a [`FakePin`].
#[derive(Debug, Default)]
pub struct PinLog {
    pub high: bool,
    pub writes: Vec<bool>,
    /// Fail the write with this zero-based number.
    pub fail_at: Option<usize>,
}

/// Output pin backed by a shared log.
#[derive(Clone, Default)]
pub struct FakePin(pub Rc<RefCell<PinLog>>);

impl FakePin {
    pub fn writes(&self) -> Vec<bool> {
        self.0.borrow().writes.clone()
    }

    pub fn is_high(&self) -> bool {
        self.0.borrow().high
    }

    pub fn fail_at(&self, write: usize) {
        self.0.borrow_mut().fail_at = Some(write);
    }

    fn write(&mut self, level: bool) -> Result<(), ErrorKind> {
        let mut log = self.0.borrow_mut();
        if log.fail_at == Some(log.writes.len()) {
            return Err(ErrorKind::Other);
        }
        log.writes.push(level);
        log.high = level;
        Ok(())
    }
}

impl ErrorType for FakePin {
    type Error = ErrorKind;
}

impl OutputPin for FakePin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(true)
    }
}

pub type Pins = StepDirPins<FakePin, FakePin>;

// =============================================================================
// Timing capabilities
// =============================================================================

/// Programming history of a [`FakeCounter`].
#[derive(Debug, Default)]
pub struct CounterLog {
    pub tops: Vec<u32>,
    pub running: bool,
    /// Refuse to stop.
    pub stuck: bool,
}

/// 1 MHz counter: one tick per microsecond.
#[derive(Clone, Default)]
pub struct FakeCounter(pub Rc<RefCell<CounterLog>>);

impl FakeCounter {
    pub fn tops(&self) -> Vec<u32> {
        self.0.borrow().tops.clone()
    }

    pub fn jam(&self) {
        self.0.borrow_mut().stuck = true;
    }
}

impl CounterTimer for FakeCounter {
    type Error = ();

    fn frequency(&self) -> u32 {
        1_000_000
    }

    fn set_top(&mut self, ticks: u32) -> Result<(), ()> {
        self.0.borrow_mut().tops.push(ticks);
        Ok(())
    }

    fn start(&mut self) -> Result<(), ()> {
        self.0.borrow_mut().running = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ()> {
        let mut log = self.0.borrow_mut();
        if log.stuck {
            return Err(());
        }
        log.running = false;
        Ok(())
    }
}

/// Submission history of a [`FakeScheduler`].
#[derive(Debug, Default)]
pub struct SchedulerLog {
    pub delays: Vec<u64>,
    pub pending: bool,
    /// Reject every submission.
    pub refuse: bool,
}

#[derive(Clone, Default)]
pub struct FakeScheduler(pub Rc<RefCell<SchedulerLog>>);

impl FakeScheduler {
    pub fn delays(&self) -> Vec<u64> {
        self.0.borrow().delays.clone()
    }

    pub fn refuse(&self) {
        self.0.borrow_mut().refuse = true;
    }
}

impl DeferredScheduler for FakeScheduler {
    type Error = ();

    fn schedule(&mut self, delay_ns: u64) -> Result<(), ()> {
        let mut log = self.0.borrow_mut();
        if log.refuse {
            return Err(());
        }
        log.delays.push(delay_ns);
        log.pending = true;
        Ok(())
    }

    fn cancel(&mut self) -> Result<(), ()> {
        self.0.borrow_mut().pending = false;
        Ok(())
    }
}

// =============================================================================
// Event recording
// =============================================================================

thread_local! {
    static EVENTS: RefCell<Vec<Event>> = RefCell::new(Vec::new());
    static NOTIFICATIONS: RefCell<usize> = RefCell::new(0);
}

pub fn record(event: Event) {
    EVENTS.with(|events| events.borrow_mut().push(event));
}

pub fn recorded() -> Vec<Event> {
    EVENTS.with(|events| events.borrow().clone())
}

pub fn notify() {
    NOTIFICATIONS.with(|count| *count.borrow_mut() += 1);
}

pub fn notifications() -> usize {
    NOTIFICATIONS.with(|count| *count.borrow())
}

// =============================================================================
// Fixtures
// =============================================================================

pub struct Rig<T> {
    pub step: FakePin,
    pub dir: FakePin,
    pub timer: T,
}

pub fn cooperative(
    config: &StepperConfig,
) -> (Stepper<Pins, CooperativeTiming<FakeScheduler>>, Rig<FakeScheduler>) {
    let rig = Rig {
        step: FakePin::default(),
        dir: FakePin::default(),
        timer: FakeScheduler::default(),
    };
    let stepper = Stepper::new(
        StepDirPins::new(rig.step.clone(), rig.dir.clone()),
        CooperativeTiming::new(rig.timer.clone()),
        config,
    )
    .expect("valid configuration");
    stepper.set_event_callback(Some(record));
    (stepper, rig)
}

pub fn counter(config: &StepperConfig) -> (Stepper<Pins, CounterTiming<FakeCounter>>, Rig<FakeCounter>) {
    let rig = Rig {
        step: FakePin::default(),
        dir: FakePin::default(),
        timer: FakeCounter::default(),
    };
    let stepper = Stepper::new(
        StepDirPins::new(rig.step.clone(), rig.dir.clone()),
        CounterTiming::new(rig.timer.clone()),
        config,
    )
    .expect("valid configuration");
    stepper.set_event_callback(Some(record));
    stepper.set_event_notifier(Some(notify));
    (stepper, rig)
}

/// Deliver ticks until the stepper stops. Returns the number of ticks.
pub fn run_to_rest<P, T, const Q: usize>(stepper: &Stepper<P, T, Q>) -> usize
where
    P: stepper_pulse::StepPins,
    T: stepper_pulse::TimingEngine,
{
    let mut ticks = 0;
    while stepper.is_moving() {
        assert!(ticks < 10_000_000, "motion never finished");
        stepper.on_tick();
        ticks += 1;
    }
    ticks
}

pub fn ticks<P, T, const Q: usize>(stepper: &Stepper<P, T, Q>, count: usize)
where
    P: stepper_pulse::StepPins,
    T: stepper_pulse::TimingEngine,
{
    for _ in 0..count {
        stepper.on_tick();
    }
}

pub fn ramped(acceleration: u32) -> StepperConfig {
    StepperConfig {
        acceleration,
        ..StepperConfig::new("test")
    }
}
