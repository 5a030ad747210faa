//! Differential-privacy noisy COUNT (C9).

use rand::Rng;

/// Draws a sample from a Laplace(0, b) distribution using the inverse-CDF
/// method: `u` uniform in `(-0.5, 0.5)`, result `= -b * sign(u) * ln(1 -
/// 2|u|)`. The RNG is not required to be deterministic or seedable; any
/// reasonable OS-seeded PRNG suffices.
pub fn laplace_sample(b: f64) -> f64 {
    let u: f64 = rand::thread_rng().gen_range(-0.5..0.5);
    -b * u.signum() * (1.0 - 2.0 * u.abs()).ln()
}

/// `SELECT DP_COUNT(*)`: the true count, with Laplace noise of scale
/// `1 / max(epsilon, 1e-9)` added so a caller can never set epsilon to
/// zero and get an exact answer.
pub fn noisy_count(true_count: u64, epsilon: f64) -> f64 {
    let b = 1.0 / epsilon.max(1e-9);
    true_count as f64 + laplace_sample(b)
}

/// Session-level differential-privacy parameter, defaulting to 1.0 per
/// `spec.md` §6.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DpSettings {
    pub epsilon: f64,
}

impl Default for DpSettings {
    fn default() -> Self {
        DpSettings { epsilon: 1.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noisy_count_is_centered_on_true_count() {
        let samples: f64 = (0..2000).map(|_| noisy_count(100, 0.5)).sum();
        let mean = samples / 2000.0;
        assert!((mean - 100.0).abs() < 5.0, "mean {mean} too far from 100");
    }

    #[test]
    fn tiny_epsilon_does_not_panic_or_divide_by_zero() {
        let v = noisy_count(10, 0.0);
        assert!(v.is_finite());
    }
}
