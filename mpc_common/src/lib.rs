//! MPC Common Library
//!
//! This crate provides shared constants, configuration types and the
//! configuration loader for the MPC workspace crates.
//!
//! # Module Structure
//!
//! - [`config`] - Configuration loading trait, shared fields, errors
//! - [`consts`] - Numeric defaults and limits
//! - [`mpc`] - Controller, solver and simulation configuration, telemetry record
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use mpc_common::prelude::*;
//! ```

pub mod config;
pub mod consts;
pub mod mpc;
pub mod prelude;
