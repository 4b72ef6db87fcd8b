//! Process model root.
//!
//! FOPDT process model, its dead-time buffer, the measurement disturbance
//! and the ODE integrators they run on. [`Plant`] is the seam between the
//! control loop and whatever produces the measured CV: a simulated
//! [`ProcessModel`] or a real sensor wrapped in [`Sensor`].

pub mod dead_time;
pub mod disturbance;
pub mod fopdt;
pub mod integrator;

pub use dead_time::DeadTimeBuffer;
pub use disturbance::Disturbance;
pub use fopdt::{FopdtParams, PredictionModel, ProcessModel};
pub use integrator::{ConfiguredIntegrator, Integrator, Rk4, Rkf45};

use crate::error::ModelError;

/// Source of the measured CV.
pub trait Plant {
    /// Hold `mv` for one control period and return the measured CV.
    fn measure(&mut self, mv: f64) -> Result<f64, ModelError>;
}

impl<I: Integrator> Plant for ProcessModel<I> {
    fn measure(&mut self, mv: f64) -> Result<f64, ModelError> {
        self.next(mv)
    }
}

/// Adapter for a real sensor/actuator pair.
///
/// The closure writes `mv` to the actuator, waits out the period and
/// returns the sampled CV.
pub struct Sensor<F>(pub F);

impl<F> Plant for Sensor<F>
where
    F: FnMut(f64) -> Result<f64, ModelError>,
{
    fn measure(&mut self, mv: f64) -> Result<f64, ModelError> {
        (self.0)(mv)
    }
}
