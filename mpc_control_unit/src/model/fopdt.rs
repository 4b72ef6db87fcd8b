//! First-order-plus-dead-time process model.
//!
//! `dy/dt = (-y + K·u(t - θ)) / τ`
//!
//! Split in two so the optimizer can never disturb the plant:
//! - [`PredictionModel`]: immutable parameters + integrator. `step` and
//!   `predict_sequence` are pure; used by the cost function.
//! - [`ProcessModel`]: the simulated plant. Owns its output, clock,
//!   disturbance source and dead-time buffer; advanced by `next` and
//!   `solve_sequence`.

use crate::error::ModelError;

use super::dead_time::DeadTimeBuffer;
use super::disturbance::Disturbance;
use super::integrator::{Integrator, Rkf45};

// ─── Parameters ─────────────────────────────────────────────────────

/// FOPDT gain and time constant. `time_constant > 0` by construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FopdtParams {
    gain: f64,
    time_constant: f64,
}

impl FopdtParams {
    pub fn new(gain: f64, time_constant: f64) -> Result<Self, ModelError> {
        if !gain.is_finite() {
            return Err(ModelError::InvalidParameter(format!(
                "gain must be finite, got {gain}"
            )));
        }
        if !time_constant.is_finite() || time_constant <= 0.0 {
            return Err(ModelError::InvalidParameter(format!(
                "time_constant must be finite and > 0, got {time_constant}"
            )));
        }
        Ok(Self {
            gain,
            time_constant,
        })
    }

    #[inline]
    pub fn gain(&self) -> f64 {
        self.gain
    }

    #[inline]
    pub fn time_constant(&self) -> f64 {
        self.time_constant
    }

    /// `dy/dt` for output `y` under input `mv`.
    #[inline]
    pub fn derivative(&self, y: f64, mv: f64) -> f64 {
        (-y + self.gain * mv) / self.time_constant
    }

    /// Closed-form output after holding `mv` for `dt` from `y0`.
    #[inline]
    pub fn step_response(&self, y0: f64, mv: f64, dt: f64) -> f64 {
        let steady = self.gain * mv;
        steady + (y0 - steady) * (-dt / self.time_constant).exp()
    }
}

// ─── Prediction model (stateless) ───────────────────────────────────

/// Immutable FOPDT model used for prediction rollouts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionModel<I = Rkf45> {
    params: FopdtParams,
    integrator: I,
}

impl PredictionModel<Rkf45> {
    /// Model integrated with the default adaptive RKF45.
    pub fn with_default_integrator(params: FopdtParams) -> Self {
        Self::new(params, Rkf45::default())
    }
}

impl<I: Integrator> PredictionModel<I> {
    pub fn new(params: FopdtParams, integrator: I) -> Self {
        Self { params, integrator }
    }

    pub fn params(&self) -> &FopdtParams {
        &self.params
    }

    pub fn integrator(&self) -> &I {
        &self.integrator
    }

    /// Integrate from `y_start` at `start_t` to `end_t` holding `mv`.
    ///
    /// # Errors
    /// `InvalidInterval` unless `end_t > start_t`.
    pub fn step(&self, start_t: f64, end_t: f64, y_start: f64, mv: f64) -> Result<f64, ModelError> {
        // Also rejects NaN bounds.
        if !(end_t > start_t) {
            return Err(ModelError::InvalidInterval { start_t, end_t });
        }
        let params = self.params;
        let y = self
            .integrator
            .integrate(move |_t, y| params.derivative(y, mv), y_start, start_t, end_t)?;
        Ok(y)
    }

    /// Pure rollout over consecutive time pairs.
    ///
    /// `mvs[i]` acts over `[times[i-1], times[i]]`, so `result[i]` is the
    /// response to `mvs[i]`. `result[0] == y0` and `mvs[0]` is not used.
    ///
    /// # Errors
    /// `DimensionMismatch` if `times.len() != mvs.len()`.
    pub fn predict_sequence(&self, times: &[f64], mvs: &[f64], y0: f64) -> Result<Vec<f64>, ModelError> {
        check_dimensions(times, mvs)?;
        let mut out = Vec::with_capacity(times.len());
        if times.is_empty() {
            return Ok(out);
        }
        let mut y = y0;
        out.push(y);
        for i in 1..times.len() {
            y = self.step(times[i - 1], times[i], y, mvs[i])?;
            out.push(y);
        }
        Ok(out)
    }
}

fn check_dimensions(times: &[f64], mvs: &[f64]) -> Result<(), ModelError> {
    if times.len() != mvs.len() {
        return Err(ModelError::DimensionMismatch {
            times: times.len(),
            mvs: mvs.len(),
        });
    }
    Ok(())
}

// ─── Process model (stateful plant) ─────────────────────────────────

/// Simulated plant.
///
/// Owned by exactly one simulator. `t` only moves forward, one control
/// period per [`next`](Self::next).
#[derive(Debug, Clone)]
pub struct ProcessModel<I = Rkf45> {
    model: PredictionModel<I>,
    /// Current (undisturbed) output.
    y: f64,
    /// Current time.
    t: f64,
    /// Control period.
    period: f64,
    disturbance: Disturbance,
    /// Present only when dead time > 0.
    dead_time: Option<DeadTimeBuffer>,
}

impl<I: Integrator> ProcessModel<I> {
    /// Plant at `t = 0` with output `y0`, no dead time and no disturbance.
    pub fn new(model: PredictionModel<I>, y0: f64, period: f64) -> Result<Self, ModelError> {
        if !period.is_finite() || period <= 0.0 {
            return Err(ModelError::InvalidParameter(format!(
                "control period must be finite and > 0, got {period}"
            )));
        }
        if !y0.is_finite() {
            return Err(ModelError::InvalidParameter(format!(
                "initial output must be finite, got {y0}"
            )));
        }
        Ok(Self {
            model,
            y: y0,
            t: 0.0,
            period,
            disturbance: Disturbance::none(),
            dead_time: None,
        })
    }

    /// Delay every applied MV by `theta` ticks. `theta == 0` detaches the buffer.
    pub fn with_dead_time(mut self, theta: usize) -> Self {
        self.dead_time = (theta > 0).then(|| DeadTimeBuffer::new(theta));
        self
    }

    pub fn with_disturbance(mut self, disturbance: Disturbance) -> Self {
        self.disturbance = disturbance;
        self
    }

    /// See [`PredictionModel::step`]. Does not touch plant state.
    #[inline]
    pub fn step(&self, start_t: f64, end_t: f64, y_start: f64, mv: f64) -> Result<f64, ModelError> {
        self.model.step(start_t, end_t, y_start, mv)
    }

    /// Advance one control period under `mv` and return the measured CV.
    ///
    /// The stored output stays undisturbed; only the returned measurement
    /// carries the disturbance.
    pub fn next(&mut self, mv: f64) -> Result<f64, ModelError> {
        let t_next = self.t + self.period;
        let applied = self.delay(t_next, mv);
        let y = self.model.step(self.t, t_next, self.y, applied)?;
        self.y = y;
        self.t = t_next;
        Ok(self.disturbance.apply(y))
    }

    /// Rollout over consecutive time pairs routed through the dead-time
    /// buffer.
    ///
    /// Same hold convention as [`PredictionModel::predict_sequence`], but
    /// each MV is exchanged through the attached buffer first, so the
    /// interval sees the MV from `theta` ticks earlier. The buffer's
    /// contents carry over to later calls; the plant's own output and clock
    /// are not modified.
    ///
    /// # Errors
    /// `DimensionMismatch` if `times.len() != mvs.len()`.
    pub fn solve_sequence(&mut self, times: &[f64], mvs: &[f64], y0: f64) -> Result<Vec<f64>, ModelError> {
        check_dimensions(times, mvs)?;
        let mut out = Vec::with_capacity(times.len());
        if times.is_empty() {
            return Ok(out);
        }
        let mut y = y0;
        out.push(y);
        for i in 1..times.len() {
            let applied = self.delay(times[i], mvs[i]);
            y = self.model.step(times[i - 1], times[i], y, applied)?;
            out.push(y);
        }
        Ok(out)
    }

    /// Exchange `mv` through the dead-time buffer, if any.
    fn delay(&mut self, time: f64, mv: f64) -> f64 {
        match self.dead_time.as_mut() {
            Some(buffer) => {
                let delayed = buffer.pop();
                buffer.push(time, mv);
                delayed
            }
            None => mv,
        }
    }

    /// Current undisturbed output.
    pub fn output(&self) -> f64 {
        self.y
    }

    pub fn time(&self) -> f64 {
        self.t
    }

    pub fn period(&self) -> f64 {
        self.period
    }

    pub fn dead_time(&self) -> Option<&DeadTimeBuffer> {
        self.dead_time.as_ref()
    }

    pub fn prediction_model(&self) -> &PredictionModel<I> {
        &self.model
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::integrator::Rk4;
    use approx::assert_relative_eq;

    fn params(k: f64, tau: f64) -> FopdtParams {
        FopdtParams::new(k, tau).unwrap()
    }

    fn model(k: f64, tau: f64) -> PredictionModel {
        PredictionModel::with_default_integrator(params(k, tau))
    }

    #[test]
    fn step_matches_closed_form_response() {
        let m = model(3.0, 5.0);
        for &t in &[0.05, 0.5, 1.0, 2.0, 5.0, 12.0, 40.0] {
            let y = m.step(0.0, t, 0.0, 1.0).unwrap();
            let exact = 3.0 * (1.0 - (-t / 5.0f64).exp());
            assert_relative_eq!(y, exact, max_relative = 1e-4);
        }
    }

    #[test]
    fn one_period_step_from_rest() {
        let y = model(3.0, 5.0).step(0.0, 1.0, 0.0, 1.0).unwrap();
        assert_relative_eq!(y, 0.543_808, max_relative = 1e-4);
    }

    #[test]
    fn rk4_model_matches_closed_form() {
        let m = PredictionModel::new(params(2.5, 3.0), Rk4 { substeps: 20 });
        let y = m.step(4.0, 6.0, 1.0, 2.0).unwrap();
        assert_relative_eq!(y, params(2.5, 3.0).step_response(1.0, 2.0, 2.0), max_relative = 1e-6);
    }

    #[test]
    fn step_rejects_non_increasing_interval() {
        let m = model(1.0, 1.0);
        assert!(matches!(
            m.step(1.0, 1.0, 0.0, 1.0),
            Err(ModelError::InvalidInterval { .. })
        ));
        assert!(matches!(
            m.step(2.0, 1.0, 0.0, 1.0),
            Err(ModelError::InvalidInterval { .. })
        ));
        assert!(matches!(
            m.step(0.0, f64::NAN, 0.0, 1.0),
            Err(ModelError::InvalidInterval { .. })
        ));
    }

    #[test]
    fn params_reject_non_positive_time_constant() {
        assert!(FopdtParams::new(1.0, 0.0).is_err());
        assert!(FopdtParams::new(1.0, -2.0).is_err());
        assert!(FopdtParams::new(f64::INFINITY, 1.0).is_err());
    }

    #[test]
    fn next_advances_one_period() {
        let mut plant = ProcessModel::new(model(3.0, 5.0), 20.0, 0.5).unwrap();
        let expected = plant.step(0.0, 0.5, 20.0, 2.0).unwrap();
        let measured = plant.next(2.0).unwrap();
        assert_eq!(measured, expected);
        assert_eq!(plant.time(), 0.5);
        assert_eq!(plant.output(), expected);
        plant.next(2.0).unwrap();
        assert_eq!(plant.time(), 1.0);
    }

    #[test]
    fn next_disturbance_is_bounded_and_seeded() {
        let build = || {
            ProcessModel::new(model(1.0, 2.0), 10.0, 1.0)
                .unwrap()
                .with_disturbance(Disturbance::uniform(5.0, 11))
        };
        let mut a = build();
        let mut b = build();
        for _ in 0..30 {
            let ma = a.next(10.0).unwrap();
            let mb = b.next(10.0).unwrap();
            assert_eq!(ma.to_bits(), mb.to_bits());
            let truth = a.output();
            assert!((ma - truth).abs() <= 0.05 * truth.abs() + 1e-12);
        }
    }

    #[test]
    fn predict_sequence_applies_each_mv_over_the_interval_ending_at_it() {
        let m = model(2.0, 4.0);
        let times = [0.0, 1.0, 2.0, 3.0];
        let mvs = [99.0, 1.0, 1.0, 1.0];
        let ys = m.predict_sequence(&times, &mvs, 0.0).unwrap();
        assert_eq!(ys.len(), 4);
        assert_eq!(ys[0], 0.0);
        for (i, &t) in times.iter().enumerate().skip(1) {
            assert_relative_eq!(ys[i], 2.0 * (1.0 - (-t / 4.0f64).exp()), max_relative = 1e-6);
        }
    }

    #[test]
    fn sequence_dimension_mismatch() {
        let m = model(1.0, 1.0);
        assert!(matches!(
            m.predict_sequence(&[0.0, 1.0], &[1.0], 0.0),
            Err(ModelError::DimensionMismatch { times: 2, mvs: 1 })
        ));
        let mut plant = ProcessModel::new(m, 0.0, 1.0).unwrap();
        assert!(matches!(
            plant.solve_sequence(&[0.0], &[1.0, 2.0], 0.0),
            Err(ModelError::DimensionMismatch { times: 1, mvs: 2 })
        ));
    }

    #[test]
    fn dead_time_delays_plant_response() {
        let mut plant = ProcessModel::new(model(1.0, 1.0), 0.0, 1.0)
            .unwrap()
            .with_dead_time(2);
        let y0 = plant.next(1.0).unwrap();
        let y1 = plant.next(1.0).unwrap();
        let y2 = plant.next(1.0).unwrap();
        assert_eq!(y0, 0.0);
        assert_eq!(y1, 0.0);
        assert!(y2 > 0.6);
        assert_eq!(plant.dead_time().map(|b| b.empty_pops()), Some(2));
    }

    #[test]
    fn solve_sequence_equals_shifted_prediction() {
        let m = model(1.5, 2.0);
        let mut plant = ProcessModel::new(m, 0.0, 1.0).unwrap().with_dead_time(1);
        let times = [0.0, 1.0, 2.0, 3.0, 4.0];
        let mvs = [1.0, 2.0, 3.0, 4.0, 5.0];
        let delayed = plant.solve_sequence(&times, &mvs, 0.5).unwrap();

        // Interval 1 sees the empty buffer; each later one the MV before it.
        let shifted = [0.0, 0.0, 2.0, 3.0, 4.0];
        let direct = m.predict_sequence(&times, &shifted, 0.5).unwrap();
        assert_eq!(delayed, direct);
        assert_eq!(plant.time(), 0.0);
        assert_eq!(plant.output(), 0.0);
    }

    #[test]
    fn solve_sequence_uses_mv_stamped_at_interval_end() {
        let mut plant = ProcessModel::new(model(1.0, 1.0), 0.0, 1.0).unwrap();
        let ys = plant.solve_sequence(&[0.0, 1.0], &[0.0, 5.0], 0.0).unwrap();
        assert_eq!(ys[0], 0.0);
        assert_relative_eq!(ys[1], 5.0 * (1.0 - (-1.0f64).exp()), max_relative = 1e-6);
    }

    #[test]
    fn next_stamps_buffered_mv_with_period_end() {
        let mut plant = ProcessModel::new(model(1.0, 1.0), 0.0, 0.5)
            .unwrap()
            .with_dead_time(2);
        plant.next(3.0).unwrap();
        let newest = plant.dead_time().and_then(|b| b.get_back(0)).copied();
        assert_eq!(newest.map(|s| (s.time, s.value)), Some((0.5, 3.0)));
    }

    #[test]
    fn prediction_is_deterministic() {
        let m = model(3.0, 5.0);
        let times = [0.0, 1.0, 2.0];
        let mvs = [0.3, -1.2, 4.0];
        let a = m.predict_sequence(&times, &mvs, 7.0).unwrap();
        let b = m.predict_sequence(&times, &mvs, 7.0).unwrap();
        assert!(a.iter().zip(&b).all(|(x, y)| x.to_bits() == y.to_bits()));
    }
}
