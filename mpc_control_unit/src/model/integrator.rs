//! Scalar ODE integrators.
//!
//! `dy/dt = f(t, y)` from `(t0, y0)` to `t1`. Both integrators are pure
//! functions of their inputs: the same call always yields the same bits,
//! which the optimizer relies on when it evaluates a cost many times.

use mpc_common::consts::{DEFAULT_RK4_SUBSTEPS, DEFAULT_RKF45_TOL_ABS, DEFAULT_RKF45_TOL_REL};
use mpc_common::mpc::config::{IntegratorKind, SolverConfig};

use crate::error::IntegrationError;

/// ODE integration capability.
///
/// Callers guarantee `t1 > t0`.
pub trait Integrator {
    fn integrate<F>(&self, derivative: F, y0: f64, t0: f64, t1: f64) -> Result<f64, IntegrationError>
    where
        F: Fn(f64, f64) -> f64;
}

// ─── RKF45 ──────────────────────────────────────────────────────────

/// Runge-Kutta-Fehlberg 4(5) with adaptive step size.
///
/// The 5th-order solution is propagated (local extrapolation); the
/// embedded 4th-order solution only drives step-size control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rkf45 {
    /// Absolute error tolerance.
    pub tol_abs: f64,
    /// Relative error tolerance.
    pub tol_rel: f64,
    /// Attempted steps (accepted + rejected) before giving up.
    pub max_steps: usize,
}

impl Default for Rkf45 {
    fn default() -> Self {
        Self {
            tol_abs: DEFAULT_RKF45_TOL_ABS,
            tol_rel: DEFAULT_RKF45_TOL_REL,
            max_steps: 10_000,
        }
    }
}

/// Step-size safety factor.
const SAFETY: f64 = 0.9;

impl Rkf45 {
    /// One Fehlberg step. Returns `(y5, local_error)`.
    #[inline]
    fn fehlberg_step<F>(f: &F, t: f64, y: f64, h: f64) -> (f64, f64)
    where
        F: Fn(f64, f64) -> f64,
    {
        let k1 = f(t, y);
        let k2 = f(t + h / 4.0, y + h * (k1 / 4.0));
        let k3 = f(t + 3.0 * h / 8.0, y + h * (3.0 / 32.0 * k1 + 9.0 / 32.0 * k2));
        let k4 = f(
            t + 12.0 * h / 13.0,
            y + h * (1932.0 / 2197.0 * k1 - 7200.0 / 2197.0 * k2 + 7296.0 / 2197.0 * k3),
        );
        let k5 = f(
            t + h,
            y + h * (439.0 / 216.0 * k1 - 8.0 * k2 + 3680.0 / 513.0 * k3 - 845.0 / 4104.0 * k4),
        );
        let k6 = f(
            t + h / 2.0,
            y + h
                * (-8.0 / 27.0 * k1 + 2.0 * k2 - 3544.0 / 2565.0 * k3 + 1859.0 / 4104.0 * k4
                    - 11.0 / 40.0 * k5),
        );

        let y5 = y + h
            * (16.0 / 135.0 * k1 + 6656.0 / 12825.0 * k3 + 28561.0 / 56430.0 * k4
                - 9.0 / 50.0 * k5
                + 2.0 / 55.0 * k6);
        let err = h
            * (1.0 / 360.0 * k1 - 128.0 / 4275.0 * k3 - 2197.0 / 75240.0 * k4 + 1.0 / 50.0 * k5
                + 2.0 / 55.0 * k6);
        (y5, err)
    }
}

impl Integrator for Rkf45 {
    fn integrate<F>(&self, derivative: F, y0: f64, t0: f64, t1: f64) -> Result<f64, IntegrationError>
    where
        F: Fn(f64, f64) -> f64,
    {
        let mut t = t0;
        let mut y = y0;
        let mut h = t1 - t0;
        let mut attempts = 0usize;

        while t < t1 {
            if attempts >= self.max_steps {
                return Err(IntegrationError::StepLimit {
                    max_steps: self.max_steps,
                    t_reached: t,
                });
            }
            attempts += 1;

            let remaining = t1 - t;
            let last = h >= remaining;
            if last {
                h = remaining;
            }

            let (y_next, err) = Self::fehlberg_step(&derivative, t, y, h);
            if !y_next.is_finite() || !err.is_finite() {
                return Err(IntegrationError::NonFinite { t });
            }

            let scale = self.tol_abs + self.tol_rel * y.abs().max(y_next.abs());
            let err_norm = (err.abs() / scale).max(1e-16);

            if err_norm <= 1.0 {
                t = if last { t1 } else { t + h };
                y = y_next;
            }

            h *= (SAFETY * err_norm.powf(-0.2)).clamp(0.1, 5.0);
        }

        Ok(y)
    }
}

// ─── RK4 ────────────────────────────────────────────────────────────

/// Classic 4th-order Runge-Kutta with `substeps` equal steps per call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rk4 {
    pub substeps: usize,
}

impl Default for Rk4 {
    fn default() -> Self {
        Self {
            substeps: DEFAULT_RK4_SUBSTEPS,
        }
    }
}

impl Integrator for Rk4 {
    fn integrate<F>(&self, derivative: F, y0: f64, t0: f64, t1: f64) -> Result<f64, IntegrationError>
    where
        F: Fn(f64, f64) -> f64,
    {
        let n = self.substeps.max(1);
        let h = (t1 - t0) / n as f64;
        let mut y = y0;

        for i in 0..n {
            let t = t0 + i as f64 * h;
            let k1 = derivative(t, y);
            let k2 = derivative(t + 0.5 * h, y + 0.5 * h * k1);
            let k3 = derivative(t + 0.5 * h, y + 0.5 * h * k2);
            let k4 = derivative(t + h, y + h * k3);
            y += h / 6.0 * (k1 + 2.0 * k2 + 2.0 * k3 + k4);
            if !y.is_finite() {
                return Err(IntegrationError::NonFinite { t: t + h });
            }
        }

        Ok(y)
    }
}

// ─── Runtime selection ──────────────────────────────────────────────

/// Integrator chosen from `[solver]` at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfiguredIntegrator {
    Rkf45(Rkf45),
    Rk4(Rk4),
}

impl ConfiguredIntegrator {
    pub fn from_config(solver: &SolverConfig) -> Self {
        match solver.integrator {
            IntegratorKind::Rkf45 => Self::Rkf45(Rkf45::default()),
            IntegratorKind::Rk4 => Self::Rk4(Rk4 {
                substeps: solver.rk4_substeps,
            }),
        }
    }
}

impl Default for ConfiguredIntegrator {
    fn default() -> Self {
        Self::Rkf45(Rkf45::default())
    }
}

impl Integrator for ConfiguredIntegrator {
    fn integrate<F>(&self, derivative: F, y0: f64, t0: f64, t1: f64) -> Result<f64, IntegrationError>
    where
        F: Fn(f64, f64) -> f64,
    {
        match self {
            Self::Rkf45(i) => i.integrate(derivative, y0, t0, t1),
            Self::Rk4(i) => i.integrate(derivative, y0, t0, t1),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
