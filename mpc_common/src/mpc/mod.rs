//! Controller-facing shared types.
//!
//! - [`config`] - `[mpc]`, `[solver]` and `[simulation]` sections
//! - [`telemetry`] - Per-tick record emitted to telemetry sinks

pub mod config;
pub mod telemetry;
