//! Configuration structures for the MPC control unit.
//!
//! `[mpc]` enumerates exactly the controller's recognized options and has no
//! defaults: a missing or unknown field fails at load time. `[solver]` and
//! `[simulation]` are optional and fall back to defaults.

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, SharedConfig};
use crate::consts::{
    DEFAULT_COST_TOLERANCE, DEFAULT_GRADIENT_TOLERANCE, DEFAULT_MAX_ITERATIONS,
    DEFAULT_RK4_SUBSTEPS, DEFAULT_SIMULATION_TICKS, MAX_DEAD_TIME, MAX_PREDICTION_HORIZON,
};

// ─── Controller Config ──────────────────────────────────────────────

/// Core controller configuration (`[mpc]`).
///
/// Immutable once the control loop is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MpcConfig {
    /// Process gain K.
    pub gain: f64,
    /// Process time constant tau (> 0).
    pub time_constant: f64,
    /// Process dead time theta [ticks].
    pub dead_time: u32,
    /// Prediction horizon ph [ticks] (>= 1).
    pub prediction_horizon: usize,
    /// Control horizon ch [ticks] (1 <= ch <= ph).
    pub control_horizon: usize,
    /// Control period `circle` (> 0), in the time unit of `time_constant`.
    pub control_period: f64,
    /// Weight on squared setpoint error.
    pub tracking_weight: f64,
    /// Weight on squared MV moves.
    pub move_weight: f64,
    /// Maximum MV change per tick (`inf` disables limiting).
    pub max_move: f64,
    /// Relative measurement disturbance amplitude [%] (0 disables).
    pub disturbance_amplitude: f64,
}

impl MpcConfig {
    /// Validate parameter bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_finite("gain", self.gain)?;
        require_positive("time_constant", self.time_constant)?;
        if self.dead_time > MAX_DEAD_TIME {
            return Err(invalid(format!(
                "dead_time {} out of range [0, {}]",
                self.dead_time, MAX_DEAD_TIME
            )));
        }
        if self.prediction_horizon == 0 || self.prediction_horizon > MAX_PREDICTION_HORIZON {
            return Err(invalid(format!(
                "prediction_horizon {} out of range [1, {}]",
                self.prediction_horizon, MAX_PREDICTION_HORIZON
            )));
        }
        if self.control_horizon == 0 || self.control_horizon > self.prediction_horizon {
            return Err(invalid(format!(
                "control_horizon {} out of range [1, {}]",
                self.control_horizon, self.prediction_horizon
            )));
        }
        require_positive("control_period", self.control_period)?;
        require_non_negative("tracking_weight", self.tracking_weight)?;
        require_non_negative("move_weight", self.move_weight)?;
        // `inf` is a legal max_move; NaN and negatives are not.
        if !(self.max_move >= 0.0) {
            return Err(invalid(format!("max_move {} must be >= 0", self.max_move)));
        }
        require_non_negative("disturbance_amplitude", self.disturbance_amplitude)?;
        Ok(())
    }
}

// ─── Solver Config ──────────────────────────────────────────────────

/// ODE integrator selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IntegratorKind {
    /// Adaptive Runge-Kutta-Fehlberg 4(5).
    #[default]
    Rkf45,
    /// Classic RK4 with a fixed number of sub-steps per interval.
    Rk4,
}

/// Optimizer and integrator settings (`[solver]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SolverConfig {
    /// Iteration cap per solve.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Stop when `|grad|_inf <= gradient_tolerance * max(1, |cost|)`.
    #[serde(default = "default_gradient_tolerance")]
    pub gradient_tolerance: f64,
    /// Stop when an accepted step lowers the cost by less than
    /// `cost_tolerance * max(1, |cost|)`.
    #[serde(default = "default_cost_tolerance")]
    pub cost_tolerance: f64,
    /// Optional compute budget per tick [ms]. Exceeding it counts as a
    /// missed deadline and the previous MV is held.
    #[serde(default)]
    pub tick_budget_ms: Option<u64>,
    /// Integrator used by both plant and prediction model.
    #[serde(default)]
    pub integrator: IntegratorKind,
    /// Sub-steps per interval when `integrator = "rk4"`.
    #[serde(default = "default_rk4_substeps")]
    pub rk4_substeps: usize,
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}
fn default_gradient_tolerance() -> f64 {
    DEFAULT_GRADIENT_TOLERANCE
}
fn default_cost_tolerance() -> f64 {
    DEFAULT_COST_TOLERANCE
}
fn default_rk4_substeps() -> usize {
    DEFAULT_RK4_SUBSTEPS
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            gradient_tolerance: DEFAULT_GRADIENT_TOLERANCE,
            cost_tolerance: DEFAULT_COST_TOLERANCE,
            tick_budget_ms: None,
            integrator: IntegratorKind::default(),
            rk4_substeps: DEFAULT_RK4_SUBSTEPS,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(invalid("max_iterations must be >= 1".to_string()));
        }
        require_positive("gradient_tolerance", self.gradient_tolerance)?;
        require_non_negative("cost_tolerance", self.cost_tolerance)?;
        if self.rk4_substeps == 0 {
            return Err(invalid("rk4_substeps must be >= 1".to_string()));
        }
        Ok(())
    }
}

// ─── Simulation Config ──────────────────────────────────────────────

/// Plant parameters that differ from the prediction model
/// (`[simulation.plant]`). Omitted fields inherit from `[mpc]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlantOverride {
    #[serde(default)]
    pub gain: Option<f64>,
    #[serde(default)]
    pub time_constant: Option<f64>,
    #[serde(default)]
    pub dead_time: Option<u32>,
}

/// Step setpoint profile (`[simulation.setpoints]`).
///
/// `values[0]` holds until `change_ticks[0]`, `values[1]` until
/// `change_ticks[1]`, and so on; the last value holds forever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetpointProfile {
    #[serde(default)]
    pub change_ticks: Vec<u64>,
    pub values: Vec<f64>,
}

impl Default for SetpointProfile {
    fn default() -> Self {
        Self {
            change_ticks: Vec::new(),
            values: vec![0.0],
        }
    }
}

impl SetpointProfile {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.values.len() != self.change_ticks.len() + 1 {
            return Err(invalid(format!(
                "setpoints: expected {} values for {} change ticks, got {}",
                self.change_ticks.len() + 1,
                self.change_ticks.len(),
                self.values.len()
            )));
        }
        if self.change_ticks.windows(2).any(|w| w[0] >= w[1]) {
            return Err(invalid(
                "setpoints: change_ticks must be strictly increasing".to_string(),
            ));
        }
        for &v in &self.values {
            require_finite("setpoint value", v)?;
        }
        Ok(())
    }
}

/// Closed-loop simulation settings (`[simulation]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    /// Ticks to run.
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    /// Plant output at t = 0.
    #[serde(default)]
    pub initial_cv: f64,
    /// MV applied before the first tick.
    #[serde(default)]
    pub initial_mv: f64,
    /// Seed of the plant disturbance source.
    #[serde(default)]
    pub seed: u64,
    /// Pace ticks to wall-clock `control_period` seconds.
    #[serde(default)]
    pub realtime: bool,
    #[serde(default)]
    pub plant: PlantOverride,
    #[serde(default)]
    pub setpoints: SetpointProfile,
}

fn default_ticks() -> u64 {
    DEFAULT_SIMULATION_TICKS
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            ticks: DEFAULT_SIMULATION_TICKS,
            initial_cv: 0.0,
            initial_mv: 0.0,
            seed: 0,
            realtime: false,
            plant: PlantOverride::default(),
            setpoints: SetpointProfile::default(),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_finite("initial_cv", self.initial_cv)?;
        require_finite("initial_mv", self.initial_mv)?;
        if let Some(gain) = self.plant.gain {
            require_finite("plant.gain", gain)?;
        }
        if let Some(tau) = self.plant.time_constant {
            require_positive("plant.time_constant", tau)?;
        }
        if let Some(theta) = self.plant.dead_time {
            if theta > MAX_DEAD_TIME {
                return Err(invalid(format!(
                    "plant.dead_time {} out of range [0, {}]",
                    theta, MAX_DEAD_TIME
                )));
            }
        }
        self.setpoints.validate()
    }
}

// ─── File Bundle ────────────────────────────────────────────────────

/// Complete configuration file.
///
/// ```toml
/// [mpc]
/// gain = 3.0
/// time_constant = 5.0
/// dead_time = 0
/// prediction_horizon = 6
/// control_horizon = 3
/// control_period = 1.0
/// tracking_weight = 20.0
/// move_weight = 20.0
/// max_move = 2.0
/// disturbance_amplitude = 0.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MpcFileConfig {
    #[serde(default)]
    pub shared: SharedConfig,
    pub mpc: MpcConfig,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl MpcFileConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.mpc.validate()?;
        self.solver.validate()?;
        self.simulation.validate()
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn invalid(msg: String) -> ConfigError {
    ConfigError::ValidationError(msg)
}

fn require_finite(name: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(invalid(format!("{name} must be finite, got {value}")));
    }
    Ok(())
}

fn require_positive(name: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(format!("{name} must be finite and > 0, got {value}")));
    }
    Ok(())
}

fn require_non_negative(name: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(format!("{name} must be finite and >= 0, got {value}")));
    }
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────
