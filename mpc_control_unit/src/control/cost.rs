//! Tracking + move-suppression cost over the prediction horizon.
//!
//! `J(u) = Σ_{i<ph} wt·(sp − ŷ_i)² + wm·(u_i − u_{i−1})²`
//!
//! with `u_{−1}` the last applied MV and `u_i = u_{ch−1}` for `i ≥ ch`.
//! Every evaluation rolls the immutable [`PredictionModel`] forward from the
//! measured CV, so repeated evaluations of the same input are bit-identical
//! and can never touch the plant.

use mpc_common::consts::MAX_PREDICTION_HORIZON;
use mpc_common::mpc::config::MpcConfig;

use crate::error::ControlError;
use crate::model::fopdt::PredictionModel;
use crate::model::integrator::Integrator;

// ─── Horizon ────────────────────────────────────────────────────────

/// Prediction and control horizons, `1 ≤ ch ≤ ph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Horizon {
    prediction: usize,
    control: usize,
}

impl Horizon {
    pub fn new(prediction: usize, control: usize) -> Result<Self, ControlError> {
        if prediction == 0 || prediction > MAX_PREDICTION_HORIZON {
            return Err(ControlError::InvalidParameter(format!(
                "prediction horizon must be in 1..={MAX_PREDICTION_HORIZON}, got {prediction}"
            )));
        }
        if control == 0 || control > prediction {
            return Err(ControlError::InvalidParameter(format!(
                "control horizon must be in 1..={prediction}, got {control}"
            )));
        }
        Ok(Self {
            prediction,
            control,
        })
    }

    pub fn from_config(config: &MpcConfig) -> Result<Self, ControlError> {
        Self::new(config.prediction_horizon, config.control_horizon)
    }

    #[inline]
    pub fn prediction(&self) -> usize {
        self.prediction
    }

    #[inline]
    pub fn control(&self) -> usize {
        self.control
    }

    /// Index of the move in effect at prediction step `i`.
    #[inline]
    fn move_index(&self, i: usize) -> usize {
        i.min(self.control - 1)
    }

    /// Full-length trajectory from the first `ch` moves (or a full
    /// trajectory), holding the last controlled move to the end.
    ///
    /// # Panics
    /// If `moves` is empty.
    pub fn expand(&self, moves: &[f64]) -> Vec<f64> {
        (0..self.prediction)
            .map(|i| moves[self.move_index(i).min(moves.len().saturating_sub(1))])
            .collect()
    }
}

// ─── Weights / window ───────────────────────────────────────────────

/// Cost weights. Both non-negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostWeights {
    tracking: f64,
    moves: f64,
}

impl CostWeights {
    pub fn new(tracking: f64, moves: f64) -> Result<Self, ControlError> {
        for (name, w) in [("tracking_weight", tracking), ("move_weight", moves)] {
            if !w.is_finite() || w < 0.0 {
                return Err(ControlError::InvalidParameter(format!(
                    "{name} must be finite and >= 0, got {w}"
                )));
            }
        }
        Ok(Self { tracking, moves })
    }

    pub fn from_config(config: &MpcConfig) -> Result<Self, ControlError> {
        Self::new(config.tracking_weight, config.move_weight)
    }

    pub fn tracking(&self) -> f64 {
        self.tracking
    }

    pub fn moves(&self) -> f64 {
        self.moves
    }
}

/// State the horizon starts from, fixed for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionWindow {
    /// Measured CV at the start of the window.
    pub cv0: f64,
    /// Last applied MV.
    pub uv0: f64,
    /// Setpoint over the window.
    pub setpoint: f64,
}

// ─── Cost function ──────────────────────────────────────────────────

/// Cost of a candidate MV trajectory for one tick.
#[derive(Debug, Clone, Copy)]
pub struct CostFunction<'a, I> {
    model: &'a PredictionModel<I>,
    horizon: Horizon,
    weights: CostWeights,
    period: f64,
    window: PredictionWindow,
}

impl<'a, I: Integrator> CostFunction<'a, I> {
    pub fn new(
        model: &'a PredictionModel<I>,
        horizon: Horizon,
        weights: CostWeights,
        period: f64,
        window: PredictionWindow,
    ) -> Self {
        Self {
            model,
            horizon,
            weights,
            period,
            window,
        }
    }

    pub fn horizon(&self) -> Horizon {
        self.horizon
    }

    pub fn window(&self) -> PredictionWindow {
        self.window
    }

    /// Cost of a full trajectory of length `ph`.
    ///
    /// Entries at `ch..` are ignored: the last controlled move is held
    /// instead. The slice is not modified.
    ///
    /// # Errors
    /// `HorizonMismatch` on wrong length; model errors from the rollout.
    pub fn evaluate(&self, trajectory: &[f64]) -> Result<f64, ControlError> {
        self.check_len(trajectory, self.horizon.prediction)?;
        self.rollout(trajectory, |_, _| {})
    }

    /// Cost of the `ch` free moves alone. Same value as [`evaluate`] on the
    /// expanded trajectory; this is what the optimizer searches over.
    ///
    /// [`evaluate`]: Self::evaluate
    pub fn evaluate_moves(&self, moves: &[f64]) -> Result<f64, ControlError> {
        self.check_len(moves, self.horizon.control)?;
        self.rollout(moves, |_, _| {})
    }

    /// Predicted CV after each of the `ph` steps under `trajectory`.
    pub fn predict(&self, trajectory: &[f64]) -> Result<Vec<f64>, ControlError> {
        self.check_len(trajectory, self.horizon.prediction)?;
        let mut predicted = Vec::with_capacity(self.horizon.prediction);
        self.rollout(trajectory, |_, y| predicted.push(y))?;
        Ok(predicted)
    }

    fn check_len(&self, values: &[f64], expected: usize) -> Result<(), ControlError> {
        if values.len() != expected {
            return Err(ControlError::HorizonMismatch {
                expected,
                actual: values.len(),
            });
        }
        Ok(())
    }

    /// Shared rollout. `moves` is indexed through `Horizon::move_index`, so
    /// it may be either the `ch` free moves or a full `ph` trajectory.
    fn rollout<F>(&self, moves: &[f64], mut observe: F) -> Result<f64, ControlError>
    where
        F: FnMut(usize, f64),
    {
        let PredictionWindow {
            cv0,
            uv0,
            setpoint,
        } = self.window;
        let mut cv = cv0;
        let mut prev_mv = uv0;
        let mut cost = 0.0;

        for i in 0..self.horizon.prediction {
            let mv = moves[self.horizon.move_index(i)];
            let start_t = i as f64 * self.period;
            let end_t = (i + 1) as f64 * self.period;
            cv = self.model.step(start_t, end_t, cv, mv)?;
            observe(i, cv);

            let error = setpoint - cv;
            let delta = mv - prev_mv;
            cost += self.weights.tracking * error * error + self.weights.moves * delta * delta;
            prev_mv = mv;
        }
        Ok(cost)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
