//! Ramp calculation.
//!
//! Partitions a move into acceleration, constant-velocity and deceleration
//! step counts for a trapezoidal profile. Everything here is pure integer
//! math so it can run inside a critical section and be property-tested.
//!
//! Speeds are expressed as a *ramp index*: index `n` is the speed reached
//! after `n` steps of constant acceleration from rest. The interval of the
//! step leaving index `n` is `sqrt(2/a) * (sqrt(n + 1) - sqrt(n))`.

use crate::error::RampError;

use super::isqrt::{exact_interval_ps, isqrt};

/// Nanoseconds per second.
pub const NS_PER_SEC: u64 = 1_000_000_000;

/// Scale factor used for the first interval of a plan.
pub const PLAN_ROOT_FACTOR: u64 = 10_000;

/// Current phase of motion execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionPhase {
    /// Ramp index increasing, intervals shrinking.
    Accelerating,
    /// Moving at the cruise interval.
    Cruising,
    /// Ramp index decreasing, intervals growing.
    Decelerating,
    /// Motion complete.
    #[default]
    Complete,
}

/// Computed step partition for a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampPlan {
    /// Steps in the first ramp phase (toward cruise speed).
    pub accel_steps: u32,

    /// Steps at the cruise interval.
    pub const_steps: u32,

    /// Steps in the final deceleration phase.
    pub decel_steps: u32,

    /// Ramp index the plan starts from (nonzero when resuming mid-ramp).
    pub step_index: u32,

    /// Ramp index of the cruise phase.
    pub peak_index: u32,

    /// `sqrt(2 / acceleration)` in picoseconds, zero without a ramp.
    pub base_time_ps: u64,

    /// Interval of the first step of the plan.
    pub current_interval_ns: u64,

    /// Cruise interval.
    pub target_interval_ns: u64,

    /// Cruise phase never ends (velocity mode).
    pub continuous: bool,
}

impl RampPlan {
    /// Create a constant-velocity plan.
    pub fn constant(steps: u32, interval_ns: u64) -> Self {
        Self {
            accel_steps: 0,
            const_steps: steps,
            decel_steps: 0,
            step_index: 0,
            peak_index: 0,
            base_time_ps: 0,
            current_interval_ns: interval_ns,
            target_interval_ns: interval_ns,
            continuous: false,
        }
    }

    /// Create a zero-length plan (no motion).
    pub fn empty() -> Self {
        Self::constant(0, 0)
    }

    /// Total number of steps, saturating for continuous plans.
    #[inline]
    pub fn total_steps(&self) -> u32 {
        if self.continuous {
            return u32::MAX;
        }
        self.accel_steps
            .saturating_add(self.const_steps)
            .saturating_add(self.decel_steps)
    }

    /// Check if this plan moves at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.continuous && self.total_steps() == 0
    }

    /// Phase of the step with the given zero-based number.
    pub fn phase_at(&self, step: u32) -> MotionPhase {
        let step = u64::from(step);
        let accel_end = u64::from(self.accel_steps);
        let const_end = accel_end + u64::from(self.const_steps);
        let total = const_end + u64::from(self.decel_steps);

        if step < accel_end {
            // The first phase slows down when resuming above cruise speed
            if self.step_index > self.peak_index {
                MotionPhase::Decelerating
            } else {
                MotionPhase::Accelerating
            }
        } else if self.continuous || step < const_end {
            MotionPhase::Cruising
        } else if step < total {
            MotionPhase::Decelerating
        } else {
            MotionPhase::Complete
        }
    }
}

/// `sqrt(2 / acceleration)` in picoseconds.
pub fn base_time_ps(acceleration: u32) -> u64 {
    // sqrt(2 / a) s == sqrt(2e18 / a) * 1e3 ps
    const TWO_E18: u64 = 2_000_000_000_000_000_000;
    isqrt(TWO_E18 / u64::from(acceleration.max(1))) * 1_000
}

/// Ramp index at which the step interval reaches `interval_ns`.
///
/// `v = 1e9 / T`, `n = v² / (2a)`.
pub fn ramp_index_for(interval_ns: u64, acceleration: u32) -> u32 {
    if interval_ns == 0 || acceleration == 0 {
        return 0;
    }
    // Divided in two stages so that `2a·T²` never has to fit in a u128
    let t = u128::from(interval_ns);
    let n = 1_000_000_000_000_000_000u128 / (2 * u128::from(acceleration) * t) / t;
    n.min(u128::from(u32::MAX)) as u32
}

fn start_index(start_interval_ns: u64, acceleration: u32, resume_index: u32) -> u32 {
    if start_interval_ns == 0 {
        0
    } else if resume_index > 0 {
        resume_index
    } else {
        ramp_index_for(start_interval_ns, acceleration)
    }
}

/// First interval of a plan, derived from its first phase.
fn first_interval_ns(plan: &RampPlan) -> u64 {
    let target_ps = plan.target_interval_ns.saturating_mul(1_000);
    let ps = match plan.phase_at(0) {
        MotionPhase::Accelerating => {
            exact_interval_ps(plan.base_time_ps, plan.step_index, PLAN_ROOT_FACTOR).max(target_ps)
        }
        MotionPhase::Decelerating => {
            let t = exact_interval_ps(
                plan.base_time_ps,
                plan.step_index.saturating_sub(1),
                PLAN_ROOT_FACTOR,
            );
            if plan.accel_steps > 0 {
                t.min(target_ps)
            } else {
                t.max(target_ps)
            }
        }
        MotionPhase::Cruising | MotionPhase::Complete => target_ps,
    };
    ps / 1_000
}

/// Plan a position move of `requested_steps` (sign gives the direction).
///
/// `start_interval_ns` is the interval currently in effect (0 when at rest)
/// and `resume_index` the ramp index the timing engine is at, if known.
///
/// # Errors
///
/// - `RampError::InvalidInterval` if `target_interval_ns` is zero
/// - `RampError::InsufficientSteps` if the motor is already moving too fast
///   to come to rest within the requested distance
pub fn plan_move(
    requested_steps: i32,
    start_interval_ns: u64,
    target_interval_ns: u64,
    acceleration: u32,
    resume_index: u32,
) -> Result<RampPlan, RampError> {
    if target_interval_ns == 0 {
        return Err(RampError::InvalidInterval);
    }

    let total = requested_steps.unsigned_abs();

    if acceleration == 0 {
        return Ok(RampPlan::constant(total, target_interval_ns));
    }

    let cruise = ramp_index_for(target_interval_ns, acceleration);
    let start = start_index(start_interval_ns, acceleration, resume_index);

    if total < start {
        return Err(RampError::InsufficientSteps {
            requested: total,
            required: start,
        });
    }

    if cruise == 0 && start == 0 {
        // Cruise speed is below the first ramp step
        return Ok(RampPlan::constant(total, target_interval_ns));
    }

    let (peak, accel_steps, const_steps, decel_steps) = if start > cruise {
        // Already faster than cruise: slow down first
        (cruise, start - cruise, total - start, cruise)
    } else if u64::from(cruise - start) + u64::from(cruise) <= u64::from(total) {
        // Full trapezoid
        let accel = cruise - start;
        (cruise, accel, total - accel - cruise, cruise)
    } else {
        // Triangle: cruise speed is never reached
        let peak = ((u64::from(total) + u64::from(start) + 1) / 2) as u32;
        let accel = peak - start;
        (peak, accel, 0, total - accel)
    };

    let mut plan = RampPlan {
        accel_steps,
        const_steps,
        decel_steps,
        step_index: start,
        peak_index: peak,
        base_time_ps: base_time_ps(acceleration),
        current_interval_ns: 0,
        target_interval_ns,
        continuous: false,
    };
    plan.current_interval_ns = first_interval_ns(&plan);

    Ok(plan)
}

/// Plan a velocity-mode run: ramp to the cruise interval and stay there.
///
/// # Errors
///
/// Returns `RampError::InvalidInterval` if `target_interval_ns` is zero.
pub fn plan_velocity(
    start_interval_ns: u64,
    target_interval_ns: u64,
    acceleration: u32,
    resume_index: u32,
) -> Result<RampPlan, RampError> {
    if target_interval_ns == 0 {
        return Err(RampError::InvalidInterval);
    }

    let mut plan = RampPlan::constant(0, target_interval_ns);
    plan.continuous = true;

    if acceleration == 0 {
        return Ok(plan);
    }

    let cruise = ramp_index_for(target_interval_ns, acceleration);
    let start = start_index(start_interval_ns, acceleration, resume_index);

    plan.accel_steps = cruise.abs_diff(start);
    plan.step_index = start;
    plan.peak_index = cruise;
    plan.base_time_ps = base_time_ps(acceleration);
    plan.current_interval_ns = first_interval_ns(&plan);

    Ok(plan)
}

/// Plan a deceleration to rest from the current speed.
///
/// The deceleration length equals the current ramp index: the ramp is
/// symmetric, so coming to rest takes as many steps as reaching the speed.
/// Returns an empty plan when there is no ramp to unwind.
pub fn plan_stop(start_interval_ns: u64, acceleration: u32, resume_index: u32) -> RampPlan {
    if acceleration == 0 {
        return RampPlan::empty();
    }

    let start = start_index(start_interval_ns, acceleration, resume_index);
    if start == 0 {
        return RampPlan::empty();
    }

    let mut plan = RampPlan {
        accel_steps: 0,
        const_steps: 0,
        decel_steps: start,
        step_index: start,
        peak_index: start,
        base_time_ps: base_time_ps(acceleration),
        current_interval_ns: 0,
        target_interval_ns: start_interval_ns,
        continuous: false,
    };
    plan.current_interval_ns = first_interval_ns(&plan);

    plan
}
