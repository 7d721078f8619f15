//! Seeded randomness for team selection.
//!
//! The scheduling RNG is a plain seedable PRNG owned by one manager for one
//! run: same seed and same call sequence means the same draws. System
//! entropy never feeds scheduling decisions.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Open01;

#[derive(Debug, Clone)]
pub struct ScheduleRng {
    rng: StdRng,
}

impl ScheduleRng {
    pub fn seed_from(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniform draw on the open interval `(0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.rng.sample(Open01)
    }

    /// Standard Gumbel(0, 1) draw: `-ln(-ln(u))` for `u ∈ (0, 1)`.
    pub fn gumbel(&mut self) -> f64 {
        -(-self.uniform().ln()).ln()
    }
}
