//! Setpoint sources.
//!
//! The control loop asks for one setpoint per tick; it holds across the
//! whole prediction window of that tick.

use mpc_common::mpc::config::SetpointProfile;

use crate::error::ControlError;

/// Supplies the setpoint for a tick index.
pub trait SetpointSource {
    fn setpoint(&self, tick: u64) -> f64;
}

/// Fixed setpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantSetpoint(pub f64);

impl SetpointSource for ConstantSetpoint {
    #[inline]
    fn setpoint(&self, _tick: u64) -> f64 {
        self.0
    }
}

/// Piecewise-constant step profile.
///
/// `values[0]` holds until `change_ticks[0]`, `values[k]` from
/// `change_ticks[k-1]` on; the last value holds forever.
#[derive(Debug, Clone, PartialEq)]
pub struct SetpointSchedule {
    change_ticks: Vec<u64>,
    values: Vec<f64>,
}

impl SetpointSchedule {
    /// Checked by [`SetpointProfile::validate`], the same rules the
    /// configuration loader applies.
    pub fn new(change_ticks: Vec<u64>, values: Vec<f64>) -> Result<Self, ControlError> {
        let profile = SetpointProfile {
            change_ticks,
            values,
        };
        profile
            .validate()
            .map_err(|e| ControlError::InvalidParameter(e.to_string()))?;
        let SetpointProfile {
            change_ticks,
            values,
        } = profile;
        Ok(Self {
            change_ticks,
            values,
        })
    }

    pub fn from_profile(profile: &SetpointProfile) -> Result<Self, ControlError> {
        Self::new(profile.change_ticks.clone(), profile.values.clone())
    }

    pub fn change_ticks(&self) -> &[u64] {
        &self.change_ticks
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

impl SetpointSource for SetpointSchedule {
    fn setpoint(&self, tick: u64) -> f64 {
        let segment = self.change_ticks.partition_point(|&c| c <= tick);
        self.values[segment]
    }
}

impl<S: SetpointSource + ?Sized> SetpointSource for &S {
    fn setpoint(&self, tick: u64) -> f64 {
        (**self).setpoint(tick)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
