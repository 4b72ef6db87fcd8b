//! Control engine root.
//!
//! Receding-horizon solve: cost rollout over the prediction horizon, the
//! quasi-Newton minimizer it is handed to, and the move-rate limiter
//! applied to the winning trajectory.

pub mod cost;
pub mod limiter;
pub mod optimizer;

pub use cost::{CostFunction, CostWeights, Horizon, PredictionWindow};
pub use limiter::MoveLimiter;
pub use optimizer::{Bfgs, Minimizer, SolveStatus, Solution};
