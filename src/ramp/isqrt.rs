//! Integer square roots for the ramp math.
//!
//! The ramp never touches floating point: square roots are taken on
//! integers scaled by a fixed `root_factor` so the fractional part survives.

/// Integer square root, rounded down.
///
/// Binary digit-by-digit method: one compare, one subtraction and two
/// shifts per result bit, no division.
pub fn isqrt(value: u64) -> u64 {
    let mut rem = value;
    let mut root = 0u64;
    let mut bit = 1u64 << 62;

    while bit > rem {
        bit >>= 2;
    }

    while bit != 0 {
        if rem >= root + bit {
            rem -= root + bit;
            root = (root >> 1) + bit;
        } else {
            root >>= 1;
        }
        bit >>= 2;
    }

    root
}

/// `sqrt(n) * root_factor`, rounded down.
#[inline]
pub fn scaled_sqrt(n: u64, root_factor: u64) -> u64 {
    isqrt(n.saturating_mul(root_factor * root_factor))
}

/// Exact interval of the step leaving ramp index `n`, in picoseconds.
///
/// `t_n = base * (sqrt(n + 1) - sqrt(n))`, evaluated as
/// `base / (sqrt(n + 1) + sqrt(n))` so the scaled roots are added instead of
/// subtracted and the truncation error stays relative to the sum.
pub fn exact_interval_ps(base_time_ps: u64, n: u32, root_factor: u64) -> u64 {
    let n = u64::from(n);
    let denominator = scaled_sqrt(n + 1, root_factor) + scaled_sqrt(n, root_factor);
    base_time_ps.saturating_mul(root_factor) / denominator.max(1)
}
