//! Error types for stepper-pulse.
//!
//! Provides unified error handling across configuration, ramp planning,
//! pulse timing and pin access.

use core::fmt;

/// Result type alias using the library's Error type.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for all stepper-pulse operations.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Configuration parsing or validation error
    Config(ConfigError),
    /// Ramp planning error
    Ramp(RampError),
    /// Motion command rejected by the state machine
    Motion(MotionError),
    /// Timing engine error
    Timing(TimingError),
    /// Step or direction line failure
    Pin(PinError),
}

/// Configuration-related errors.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Failed to parse TOML configuration
    ParseError(heapless::String<128>),
    /// Stepper name not found in configuration
    StepperNotFound(heapless::String<32>),
    /// Microstep interval must be nonzero
    InvalidInterval(u64),
    /// Exact-mode step threshold must be at least 1
    InvalidAccurateSteps(u32),
    /// Square root scale factor must be within 1..=10_000
    InvalidRootFactor(u64),
    /// A required builder field was not provided
    MissingField(&'static str),
    /// File I/O error (std only)
    #[cfg(feature = "std")]
    IoError(heapless::String<128>),
}

/// Ramp calculator errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RampError {
    /// A zero step interval was requested
    InvalidInterval,
    /// The move cannot decelerate to a stop within the requested distance
    InsufficientSteps {
        /// Requested move length in steps
        requested: u32,
        /// Steps needed to come to rest from the current speed
        required: u32,
    },
}

/// Motion command errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionError {
    /// Direction change requested while moving with nonzero acceleration
    DirectionConflict,
}

/// Timing engine errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimingError {
    /// Hardware timer rejected its configuration
    TimerConfig,
    /// Deferred callback could not be submitted or cancelled
    Scheduler,
    /// Interval does not fit the timer's counter
    IntervalOutOfRange {
        /// Requested tick period in nanoseconds
        period_ns: u64,
    },
}

/// GPIO failure on the step or direction line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinError {
    /// Step line could not be driven
    Step,
    /// Direction line could not be driven
    Direction,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Ramp(e) => write!(f, "Ramp error: {}", e),
            Error::Motion(e) => write!(f, "Motion error: {}", e),
            Error::Timing(e) => write!(f, "Timing error: {}", e),
            Error::Pin(e) => write!(f, "Pin error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::StepperNotFound(name) => write!(f, "Stepper '{}' not found", name),
            ConfigError::InvalidInterval(v) => {
                write!(f, "Invalid microstep interval: {} ns. Must be > 0", v)
            }
            ConfigError::InvalidAccurateSteps(v) => {
                write!(f, "Invalid accurate_steps: {}. Must be >= 1", v)
            }
            ConfigError::InvalidRootFactor(v) => {
                write!(f, "Invalid root_factor: {}. Must be 1-10000", v)
            }
            ConfigError::MissingField(field) => write!(f, "{} is required", field),
            #[cfg(feature = "std")]
            ConfigError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for RampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RampError::InvalidInterval => write!(f, "Step interval must be nonzero"),
            RampError::InsufficientSteps { requested, required } => write!(
                f,
                "Move of {} steps too short to stop, at least {} needed",
                requested, required
            ),
        }
    }
}

impl fmt::Display for MotionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionError::DirectionConflict => {
                write!(f, "Cannot reverse while moving, stop first")
            }
        }
    }
}

impl fmt::Display for TimingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimingError::TimerConfig => write!(f, "Timer rejected configuration"),
            TimingError::Scheduler => write!(f, "Deferred callback submission failed"),
            TimingError::IntervalOutOfRange { period_ns } => {
                write!(f, "Period of {} ns does not fit the timer", period_ns)
            }
        }
    }
}

impl fmt::Display for PinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinError::Step => write!(f, "STEP pin operation failed"),
            PinError::Direction => write!(f, "DIR pin operation failed"),
        }
    }
}

// Conversion impls
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<RampError> for Error {
    fn from(e: RampError) -> Self {
        Error::Ramp(e)
    }
}

impl From<MotionError> for Error {
    fn from(e: MotionError) -> Self {
        Error::Motion(e)
    }
}

impl From<TimingError> for Error {
    fn from(e: TimingError) -> Self {
        Error::Timing(e)
    }
}

impl From<PinError> for Error {
    fn from(e: PinError) -> Self {
        Error::Pin(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

#[cfg(feature = "std")]
impl std::error::Error for RampError {}

#[cfg(feature = "std")]
impl std::error::Error for MotionError {}

#[cfg(feature = "std")]
impl std::error::Error for TimingError {}

#[cfg(feature = "std")]
impl std::error::Error for PinError {}
