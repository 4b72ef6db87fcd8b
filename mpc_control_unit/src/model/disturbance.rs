//! Measurement disturbance.
//!
//! Perturbs a plant output by a uniformly distributed relative error in
//! `[-amplitude%, +amplitude%]`. The random source is seeded explicitly so
//! plant simulations are reproducible; prediction rollouts never touch it.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seeded uniform relative disturbance.
#[derive(Debug, Clone)]
pub struct Disturbance {
    amplitude_pct: f64,
    rng: StdRng,
}

impl Disturbance {
    /// No perturbation.
    pub fn none() -> Self {
        Self::uniform(0.0, 0)
    }

    /// Uniform relative perturbation of `amplitude_pct` percent.
    pub fn uniform(amplitude_pct: f64, seed: u64) -> Self {
        Self {
            amplitude_pct: amplitude_pct.max(0.0),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn amplitude_pct(&self) -> f64 {
        self.amplitude_pct
    }

    /// Apply one draw to `value`. Amplitude 0 returns `value` unchanged and
    /// does not advance the random source.
    pub fn apply(&mut self, value: f64) -> f64 {
        if self.amplitude_pct == 0.0 {
            return value;
        }
        let unit: f64 = self.rng.gen_range(-1.0..=1.0);
        value * (1.0 + self.amplitude_pct * unit / 100.0)
    }
}

impl Default for Disturbance {
    fn default() -> Self {
        Self::none()
    }
}
