//! Move-rate limiter.
//!
//! Each filtered move stays within `max_move` of its predecessor; the first
//! one is measured against the last applied MV. Clamp-based, so a zero
//! delta passes straight through.

use mpc_common::mpc::config::MpcConfig;

use crate::error::ControlError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveLimiter {
    max_move: f64,
}

impl MoveLimiter {
    /// `max_move` must be `>= 0`; `f64::INFINITY` disables limiting.
    pub fn new(max_move: f64) -> Result<Self, ControlError> {
        if max_move.is_nan() || max_move < 0.0 {
            return Err(ControlError::InvalidParameter(format!(
                "max_move must be >= 0, got {max_move}"
            )));
        }
        Ok(Self { max_move })
    }

    pub fn from_config(config: &MpcConfig) -> Result<Self, ControlError> {
        Self::new(config.max_move)
    }

    pub fn max_move(&self) -> f64 {
        self.max_move
    }

    /// Limit a single move from `prev` toward `target`.
    ///
    /// Returns `target` unchanged when it is already within reach.
    #[inline]
    pub fn limit_move(&self, prev: f64, target: f64) -> f64 {
        let delta = target - prev;
        if delta > self.max_move {
            prev + self.max_move
        } else if delta < -self.max_move {
            prev - self.max_move
        } else {
            target
        }
    }

    /// Filter a whole trajectory in place, starting from `uv0`.
    pub fn apply_in_place(&self, uv0: f64, trajectory: &mut [f64]) {
        let mut prev = uv0;
        for mv in trajectory.iter_mut() {
            *mv = self.limit_move(prev, *mv);
            prev = *mv;
        }
    }

    /// Filtered copy of `trajectory`.
    pub fn apply(&self, uv0: f64, trajectory: &[f64]) -> Vec<f64> {
        let mut filtered = trajectory.to_vec();
        self.apply_in_place(uv0, &mut filtered);
        filtered
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
