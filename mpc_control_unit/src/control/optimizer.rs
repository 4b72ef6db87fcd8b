//! Black-box nonlinear minimizer behind the [`Minimizer`] seam.
//!
//! [`Bfgs`] is a quasi-Newton method on an inverse-Hessian estimate with
//! central finite-difference gradients and Armijo backtracking. No box or
//! rate constraints are enforced here; move limiting is a post-processing
//! step (see [`MoveLimiter`](super::limiter::MoveLimiter)).
//!
//! The cost closure is fallible: a model error inside any evaluation aborts
//! the solve and propagates unchanged. Running out of iterations, stalling
//! or passing the deadline are not errors; they come back as a
//! [`SolveStatus`] on the [`Solution`].

use std::time::Instant;

use mpc_common::mpc::config::SolverConfig;
use nalgebra::{DMatrix, DVector};

/// Why the minimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Gradient or cost-change tolerance met.
    Converged,
    /// Line search found no decrease away from a stationary point.
    Stalled,
    /// Iteration cap reached.
    MaxIterations,
    /// Deadline passed before convergence.
    TimedOut,
    /// Cost or gradient became NaN/inf.
    NonFinite,
}

impl SolveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Converged => "converged",
            Self::Stalled => "stalled",
            Self::MaxIterations => "max_iterations",
            Self::TimedOut => "timed_out",
            Self::NonFinite => "non_finite",
        }
    }
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one minimization. `trajectory` is only trustworthy when
/// [`success`](Self::success) is true.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub trajectory: Vec<f64>,
    pub status: SolveStatus,
    /// Cost at `trajectory`.
    pub cost: f64,
    pub iterations: usize,
    /// Cost evaluations, including those spent on gradients.
    pub evaluations: usize,
}

impl Solution {
    #[inline]
    pub fn success(&self) -> bool {
        self.status == SolveStatus::Converged
    }
}

/// Nonlinear minimization capability.
pub trait Minimizer {
    /// Minimize `cost` starting from `initial`.
    ///
    /// # Errors
    /// The first error returned by `cost`.
    fn minimize<F, E>(&self, cost: F, initial: &[f64], deadline: Option<Instant>) -> Result<Solution, E>
    where
        F: FnMut(&[f64]) -> Result<f64, E>;
}

// ─── BFGS ───────────────────────────────────────────────────────────

/// Armijo sufficient-decrease constant.
const ARMIJO_C1: f64 = 1e-4;

/// Backtracking halvings before the line search gives up.
const MAX_BACKTRACKS: usize = 40;

/// Relative central-difference step.
const FD_STEP: f64 = 1e-5;

/// Gradient level (relative to `max(1, |cost|)`) below which a failed line
/// search still counts as convergence: the remaining slope is numerical noise.
const STATIONARY_TOLERANCE: f64 = 1e-3;

/// BFGS minimizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bfgs {
    pub max_iterations: usize,
    /// Stop when `‖g‖∞ ≤ gradient_tolerance · max(1, |f|)`.
    pub gradient_tolerance: f64,
    /// Stop when an accepted step lowers the cost by at most
    /// `cost_tolerance · max(1, |f|)`.
    pub cost_tolerance: f64,
}

impl Default for Bfgs {
    fn default() -> Self {
        Self::from_config(&SolverConfig::default())
    }
}

impl Bfgs {
    pub fn from_config(solver: &SolverConfig) -> Self {
        Self {
            max_iterations: solver.max_iterations,
            gradient_tolerance: solver.gradient_tolerance,
            cost_tolerance: solver.cost_tolerance,
        }
    }
}

impl Minimizer for Bfgs {
    fn minimize<F, E>(&self, mut cost: F, initial: &[f64], deadline: Option<Instant>) -> Result<Solution, E>
    where
        F: FnMut(&[f64]) -> Result<f64, E>,
    {
        let n = initial.len();
        let mut evaluations = 0usize;
        let mut eval = |x: &DVector<f64>, count: &mut usize| -> Result<f64, E> {
            *count += 1;
            cost(x.as_slice())
        };

        let mut x = DVector::from_column_slice(initial);
        let mut f = eval(&x, &mut evaluations)?;
        let finish = |x: DVector<f64>, status, f, iterations, evaluations| Solution {
            trajectory: x.as_slice().to_vec(),
            status,
            cost: f,
            iterations,
            evaluations,
        };

        if !f.is_finite() {
            return Ok(finish(x, SolveStatus::NonFinite, f, 0, evaluations));
        }
        if n == 0 {
            return Ok(finish(x, SolveStatus::Converged, f, 0, evaluations));
        }

        let mut g = gradient(&mut eval, &x, &mut evaluations)?;
        let mut h = DMatrix::<f64>::identity(n, n);
        let mut scaled = false;
        let mut iterations = 0usize;
        let mut status = SolveStatus::MaxIterations;

        while iterations < self.max_iterations {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                status = SolveStatus::TimedOut;
                break;
            }
            if !g.iter().all(|v| v.is_finite()) {
                status = SolveStatus::NonFinite;
                break;
            }
            let scale = f.abs().max(1.0);
            let g_norm = g.amax();
            if g_norm <= self.gradient_tolerance * scale {
                status = SolveStatus::Converged;
                break;
            }

            let mut d = -(&h * &g);
            let mut slope = g.dot(&d);
            if !(slope < 0.0) {
                // Lost positive definiteness; restart from steepest descent.
                h = DMatrix::identity(n, n);
                scaled = false;
                d = -&g;
                slope = -g.norm_squared();
            }

            // Armijo backtracking
            let mut alpha = 1.0;
            let mut accepted = None;
            for _ in 0..MAX_BACKTRACKS {
                let trial = &x + &d * alpha;
                let f_trial = eval(&trial, &mut evaluations)?;
                if f_trial.is_finite() && f_trial <= f + ARMIJO_C1 * alpha * slope {
                    accepted = Some((trial, f_trial));
                    break;
                }
                alpha *= 0.5;
            }
            iterations += 1;

            let Some((x_next, f_next)) = accepted else {
                status = if g_norm <= STATIONARY_TOLERANCE * scale {
                    SolveStatus::Converged
                } else {
                    SolveStatus::Stalled
                };
                break;
            };

            let g_next = gradient(&mut eval, &x_next, &mut evaluations)?;
            let s = &x_next - &x;
            let y = &g_next - &g;
            let sy = s.dot(&y);
            let yy = y.norm_squared();
            // Curvature condition; skip the update otherwise.
            if sy > 1e-12 * s.norm() * yy.sqrt() && yy > 0.0 {
                if !scaled {
                    h *= sy / yy;
                    scaled = true;
                }
                bfgs_update(&mut h, &s, &y, sy);
            }

            let decrease = f - f_next;
            x = x_next;
            f = f_next;
            g = g_next;

            if decrease <= self.cost_tolerance * f.abs().max(1.0) {
                status = SolveStatus::Converged;
                break;
            }
        }

        tracing::trace!(
            status = %status,
            iterations,
            evaluations,
            cost = f,
            "bfgs finished"
        );
        Ok(finish(x, status, f, iterations, evaluations))
    }
}

/// Central-difference gradient.
fn gradient<E>(
    eval: &mut impl FnMut(&DVector<f64>, &mut usize) -> Result<f64, E>,
    x: &DVector<f64>,
    evaluations: &mut usize,
) -> Result<DVector<f64>, E> {
    let mut probe = x.clone();
    let mut g = DVector::zeros(x.len());
    for i in 0..x.len() {
        let step = FD_STEP * x[i].abs().max(1.0);
        probe[i] = x[i] + step;
        let f_plus = eval(&probe, evaluations)?;
        probe[i] = x[i] - step;
        let f_minus = eval(&probe, evaluations)?;
        probe[i] = x[i];
        g[i] = (f_plus - f_minus) / (2.0 * step);
    }
    Ok(g)
}

/// `H ← (I − ρ s yᵀ) H (I − ρ y sᵀ) + ρ s sᵀ`, with `ρ = 1 / sᵀy`.
///
/// Expanded for symmetric `H` into three rank-one updates:
/// `H − ρ (s (Hy)ᵀ + (Hy) sᵀ) + (ρ² yᵀHy + ρ) s sᵀ`.
fn bfgs_update(h: &mut DMatrix<f64>, s: &DVector<f64>, y: &DVector<f64>, sy: f64) {
    let rho = 1.0 / sy;
    let hy = &*h * y;
    let coeff = rho * rho * y.dot(&hy) + rho;
    h.ger(-rho, s, &hy, 1.0);
    h.ger(-rho, &hy, s, 1.0);
    h.ger(coeff, s, s, 1.0);
}

// ─── Tests ──────────────────────────────────────────────────────────
