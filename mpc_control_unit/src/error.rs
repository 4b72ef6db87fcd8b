//! Error taxonomy.
//!
//! Integration, interval and dimension errors are fatal to the call that
//! raised them and propagate with `?`. Optimizer non-convergence and missed
//! deadlines are expected operating conditions: they are reported as
//! [`TickFault`](crate::cycle::TickFault) values, never as errors.

use thiserror::Error;

/// Failure inside an ODE integrator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrationError {
    /// Adaptive stepping needed more steps than allowed.
    #[error("step limit of {max_steps} reached at t = {t_reached}")]
    StepLimit { max_steps: usize, t_reached: f64 },

    /// The derivative or state became NaN/inf.
    #[error("non-finite state at t = {t}")]
    NonFinite { t: f64 },
}

/// Failure of a process-model operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// `end_t <= start_t` passed to a step.
    #[error("invalid interval: end_t ({end_t}) must be greater than start_t ({start_t})")]
    InvalidInterval { start_t: f64, end_t: f64 },

    /// Time and MV sequences differ in length.
    #[error("dimension mismatch: {times} time points vs {mvs} MV values")]
    DimensionMismatch { times: usize, mvs: usize },

    /// A model parameter is out of range.
    #[error("invalid model parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Integration(#[from] IntegrationError),
}

/// Failure of a control-layer operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Candidate trajectory length differs from the prediction horizon.
    #[error("trajectory has {actual} moves, prediction horizon is {expected}")]
    HorizonMismatch { expected: usize, actual: usize },

    /// A controller parameter is out of range.
    #[error("invalid controller parameter: {0}")]
    InvalidParameter(String),

    /// A telemetry sink failed to record a tick.
    #[error("telemetry sink error: {0}")]
    Telemetry(String),
}
