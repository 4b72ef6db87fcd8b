//! Per-tick telemetry record.
//!
//! One record is produced per control tick. Sinks decide where it goes
//! (log line, JSON lines, nowhere).

use serde::{Deserialize, Serialize};

/// Why a tick held the previous MV instead of applying the optimizer's move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    NonConvergence,
    MissedDeadline,
}

/// Snapshot emitted once per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickTelemetry {
    /// Tick index (0-based).
    pub tick: u64,
    /// Measured CV at the start of the tick.
    pub measured_cv: f64,
    /// Setpoint used for this tick's prediction window.
    pub setpoint: f64,
    /// MV applied for this tick.
    pub applied_mv: f64,
    /// Predicted CV over the horizon under the applied plan.
    pub predicted_cv: Vec<f64>,
    /// Set when the previous MV was held.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<FaultKind>,
}
