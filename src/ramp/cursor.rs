//! Per-step interval generation.

use super::isqrt::exact_interval_ps;
use super::plan::{MotionPhase, RampPlan};

/// Runtime position along a [`RampPlan`].
///
/// Produces the interval of every step in O(1). Ramp indices below
/// `accurate_steps`, and every `accurate_steps`-th index after that, are
/// computed exactly with the integer square root. All other steps use
/// Austin's recurrence:
///
/// - accelerating: `t' = t - 2t / (4n + 3)`
/// - decelerating: `t' = t + 2t / (4n + 1)`
///
/// where `n` is the ramp index reached by the step just taken. The periodic
/// exact steps re-anchor the recurrence so its error cannot accumulate.
#[derive(Debug, Clone, Copy)]
pub struct RampCursor {
    /// Plan being executed.
    plan: RampPlan,

    /// Steps committed since the plan was loaded.
    steps_done: u32,

    /// Current ramp index (speed).
    index: u32,

    /// Interval of the next step, in picoseconds.
    interval_ps: u64,

    /// Phase of the next step.
    phase: MotionPhase,

    /// Exact computation threshold and period.
    accurate_steps: u32,

    /// Scale factor applied inside the integer square root.
    root_factor: u64,
}

impl RampCursor {
    /// Create an idle cursor.
    pub const fn new(accurate_steps: u32, root_factor: u64) -> Self {
        Self {
            plan: RampPlan {
                accel_steps: 0,
                const_steps: 0,
                decel_steps: 0,
                step_index: 0,
                peak_index: 0,
                base_time_ps: 0,
                current_interval_ns: 0,
                target_interval_ns: 0,
                continuous: false,
            },
            steps_done: 0,
            index: 0,
            interval_ps: 0,
            phase: MotionPhase::Complete,
            accurate_steps,
            root_factor,
        }
    }

    /// Change the numeric settings. Takes effect on the next step.
    pub fn configure(&mut self, accurate_steps: u32, root_factor: u64) {
        self.accurate_steps = accurate_steps.max(1);
        self.root_factor = root_factor.max(1);
    }

    /// Start executing a new plan from its first step.
    pub fn load(&mut self, plan: &RampPlan) {
        self.plan = *plan;
        self.steps_done = 0;
        self.index = plan.step_index;
        self.interval_ps = plan.current_interval_ns.saturating_mul(1_000);
        self.phase = plan.phase_at(0);
    }

    /// The plan being executed.
    #[inline]
    pub fn plan(&self) -> &RampPlan {
        &self.plan
    }

    /// Phase of the next step.
    #[inline]
    pub fn phase(&self) -> MotionPhase {
        self.phase
    }

    /// Current ramp index.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Steps committed since the plan was loaded.
    #[inline]
    pub fn steps_done(&self) -> u32 {
        self.steps_done
    }

    /// Check if every step of the plan has been taken.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.phase == MotionPhase::Complete
    }

    /// Interval of the next step in nanoseconds.
    ///
    /// After the last step the final interval is kept so a trailing
    /// half-period can still be timed.
    #[inline]
    pub fn interval_ns(&self) -> u64 {
        self.interval_ps / 1_000
    }

    /// Commit one step and compute the interval of the next one.
    ///
    /// Returns the phase of the next step.
    pub fn advance(&mut self) -> MotionPhase {
        let taken = self.phase;

        match taken {
            MotionPhase::Complete => return MotionPhase::Complete,
            MotionPhase::Accelerating => self.index = self.index.saturating_add(1),
            MotionPhase::Decelerating => self.index = self.index.saturating_sub(1),
            MotionPhase::Cruising => {}
        }

        self.steps_done = self.steps_done.saturating_add(1);
        let next = self.plan.phase_at(self.steps_done);
        let previous = self.interval_ps;
        let target = self.plan.target_interval_ns.saturating_mul(1_000);

        self.interval_ps = match next {
            MotionPhase::Complete => previous,
            MotionPhase::Cruising => target,
            MotionPhase::Accelerating => {
                let t = if taken == MotionPhase::Accelerating && !self.needs_exact() {
                    previous - previous.saturating_mul(2) / (4 * u64::from(self.index) + 3)
                } else {
                    self.exact(self.index)
                };
                let t = if taken == MotionPhase::Accelerating {
                    t.min(previous)
                } else {
                    t
                };
                t.max(target)
            }
            MotionPhase::Decelerating => {
                let t = if taken == MotionPhase::Decelerating && !self.needs_exact() {
                    previous.saturating_add(previous.saturating_mul(2) / (4 * u64::from(self.index) + 1))
                } else {
                    self.exact(self.index.saturating_sub(1))
                };
                let t = if taken == MotionPhase::Decelerating {
                    t.max(previous)
                } else {
                    t
                };
                if self.steps_done < self.plan.accel_steps {
                    // Slowing down toward cruise, never past it
                    t.min(target)
                } else {
                    t.max(target)
                }
            }
        };

        self.phase = next;
        next
    }

    fn needs_exact(&self) -> bool {
        self.index < self.accurate_steps || self.index % self.accurate_steps == 0
    }

    fn exact(&self, n: u32) -> u64 {
        exact_interval_ps(self.plan.base_time_ps, n, self.root_factor)
    }
}

impl Default for RampCursor {
    fn default() -> Self {
        Self::new(16, 1_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ramp::plan::{plan_move, plan_stop, plan_velocity};

    fn run(plan: &RampPlan) -> ([u64; 4096], usize, RampCursor) {
        let mut cursor = RampCursor::default();
        cursor.load(plan);
        let mut intervals = [0u64; 4096];
        let mut count = 0;
        while !cursor.is_complete() && count < intervals.len() {
            intervals[count] = cursor.interval_ns();
            count += 1;
            cursor.advance();
        }
        (intervals, count, cursor)
    }

    #[test]
    fn test_runs_every_planned_step() {
        let plan = plan_move(2000, 0, 1_000_000, 1000, 0).unwrap();
        let (_, count, cursor) = run(&plan);

        assert_eq!(count, 2000);
        assert_eq!(cursor.steps_done(), 2000);
        assert_eq!(cursor.index(), 0);
    }

    #[test]
    fn test_monotonic_phases() {
        let plan = plan_move(2000, 0, 1_000_000, 1000, 0).unwrap();
        let (intervals, count, _) = run(&plan);
        let accel = plan.accel_steps as usize;
        let decel_start = (plan.accel_steps + plan.const_steps) as usize;

        for pair in intervals[..accel].windows(2) {
            assert!(pair[1] <= pair[0], "accel interval grew: {:?}", pair);
        }
        for interval in &intervals[accel..decel_start] {
            assert_eq!(*interval, 1_000_000);
        }
        for pair in intervals[decel_start..count].windows(2) {
            assert!(pair[1] >= pair[0], "decel interval shrank: {:?}", pair);
        }
    }

    #[test]
    fn test_recurrence_tracks_exact() {
        let plan = plan_move(4000, 0, 100_000, 100, 0).unwrap();
        let mut cursor = RampCursor::default();
        cursor.load(&plan);

        for _ in 0..plan.accel_steps - 1 {
            cursor.advance();
            let exact = exact_interval_ps(plan.base_time_ps, cursor.index(), 1_000) / 1_000;
            let error = cursor.interval_ns().abs_diff(exact);
            // within 1% of the closed form
            assert!(error * 100 <= exact, "n={} got {} exact {}", cursor.index(), cursor.interval_ns(), exact);
        }
    }

    #[test]
    fn test_reaches_cruise_interval() {
        let plan = plan_move(2000, 0, 1_000_000, 1000, 0).unwrap();
        let mut cursor = RampCursor::default();
        cursor.load(&plan);

        for _ in 0..plan.accel_steps {
            cursor.advance();
        }

        assert_eq!(cursor.phase(), MotionPhase::Cruising);
        assert_eq!(cursor.interval_ns(), 1_000_000);
        assert_eq!(cursor.index(), 500);
    }

    #[test]
    fn test_velocity_never_completes() {
        let plan = plan_velocity(0, 1_000_000, 1000, 0).unwrap();
        let mut cursor = RampCursor::default();
        cursor.load(&plan);

        for _ in 0..10_000 {
            cursor.advance();
        }

        assert_eq!(cursor.phase(), MotionPhase::Cruising);
        assert_eq!(cursor.interval_ns(), 1_000_000);
    }

    #[test]
    fn test_stop_from_cruise() {
        let plan = plan_stop(1_000_000, 1000, 500);
        let (intervals, count, cursor) = run(&plan);

        assert_eq!(count, 500);
        assert_eq!(cursor.index(), 0);
        assert!(intervals[0] >= 1_000_000);
        assert!(intervals[count - 1] > intervals[0]);
    }

    #[test]
    fn test_complete_keeps_last_interval() {
        let plan = plan_move(1, 0, 1_000_000, 1000, 0).unwrap();
        let mut cursor = RampCursor::default();
        cursor.load(&plan);
        let first = cursor.interval_ns();

        assert_eq!(cursor.advance(), MotionPhase::Complete);
        assert_eq!(cursor.interval_ns(), first);
        assert_eq!(cursor.advance(), MotionPhase::Complete);
        assert_eq!(cursor.steps_done(), 1);
    }
}
