//! Workspace-wide constants.
//!
//! Single source of truth for numeric defaults and limits used by the
//! configuration layer and the control unit.

/// Upper bound on the prediction horizon [ticks].
///
/// Every cost evaluation integrates `ph` intervals and one solve runs
/// `2·ch` evaluations per gradient plus the line search, all inside one
/// control period. The cap rejects configurations whose per-tick work could
/// never fit a real-time period instead of letting every tick miss its
/// deadline at run time.
pub const MAX_PREDICTION_HORIZON: usize = 256;

/// Upper bound on the dead time [ticks].
pub const MAX_DEAD_TIME: u32 = 10_000;

/// Default optimizer iteration cap per tick.
pub const DEFAULT_MAX_ITERATIONS: usize = 200;

/// Default gradient tolerance (relative to `max(1, |cost|)`).
pub const DEFAULT_GRADIENT_TOLERANCE: f64 = 1e-6;

/// Default cost-change tolerance (relative to `max(1, |cost|)`).
pub const DEFAULT_COST_TOLERANCE: f64 = 1e-10;

/// Default fixed sub-steps per interval for the RK4 integrator.
pub const DEFAULT_RK4_SUBSTEPS: usize = 20;

/// Default absolute tolerance of the adaptive RKF45 integrator.
pub const DEFAULT_RKF45_TOL_ABS: f64 = 1e-12;

/// Default relative tolerance of the adaptive RKF45 integrator.
pub const DEFAULT_RKF45_TOL_REL: f64 = 1e-10;

/// Default simulated tick count.
pub const DEFAULT_SIMULATION_TICKS: u64 = 60;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "config/mpc.toml";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_consistent() {
        assert!(MAX_PREDICTION_HORIZON > 0);
        assert!(DEFAULT_MAX_ITERATIONS > 0);
        assert!(DEFAULT_RK4_SUBSTEPS > 0);
        assert!(DEFAULT_RKF45_TOL_ABS > 0.0 && DEFAULT_RKF45_TOL_REL > 0.0);
        assert!(DEFAULT_GRADIENT_TOLERANCE > DEFAULT_COST_TOLERANCE);
    }
}
