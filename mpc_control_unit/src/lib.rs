//! # MPC Control Unit Library
//!
//! Single-input/single-output model predictive controller for processes
//! modeled as first-order-plus-dead-time (FOPDT) systems. Every tick it
//! measures the CV, searches the MV moves that best track the setpoint
//! over a finite horizon, rate-limits them and applies the first one.
//!
//! ## Layers
//!
//! 1. **model**: FOPDT prediction/plant models, dead-time buffer,
//!    disturbance, ODE integrators
//! 2. **control**: cost function, minimizer, move limiter
//! 3. **cycle**: the per-tick state machine and run loop
//!
//! Setpoints come in through [`setpoint::SetpointSource`]; per-tick records
//! go out through [`telemetry::TelemetrySink`].

pub mod config;
pub mod control;
pub mod cycle;
pub mod error;
pub mod model;
pub mod setpoint;
pub mod telemetry;
