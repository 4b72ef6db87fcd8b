//! Common re-exports.
//!
//! ```rust
//! use mpc_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::mpc::config::{
    IntegratorKind, MpcConfig, MpcFileConfig, PlantOverride, SetpointProfile, SimulationConfig,
    SolverConfig,
};

// ─── Telemetry ──────────────────────────────────────────────────────
pub use crate::mpc::telemetry::{FaultKind, TickTelemetry};

// ─── Constants ──────────────────────────────────────────────────────
pub use crate::consts::{DEFAULT_CONFIG_PATH, MAX_PREDICTION_HORIZON};
