//! Receding-horizon control loop: measure → optimize → limit → apply.
//!
//! ## Tick
//! 1. **Measuring**: the plant holds the last applied MV for one period
//!    and returns the measured CV.
//! 2. **Optimizing**: the minimizer searches the `ch` free moves of a cost
//!    rolled out from `(cv, last_mv)` against this tick's setpoint. The
//!    initial guess holds `last_mv` over the whole horizon.
//! 3. **Limiting**: the held-out trajectory goes through the move limiter.
//! 4. **Applying**: the first limited move becomes the new `last_mv`.
//!
//! ## Fallback
//! A solve that does not converge, or finishes after the tick budget,
//! is never applied: the tick holds `last_mv`, records a [`TickFault`] and
//! counts it in [`CycleStats`]. Model errors abort the tick with `Err`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use mpc_common::mpc::config::{MpcConfig, SolverConfig};
use mpc_common::mpc::telemetry::{FaultKind, TickTelemetry};
use tracing::{debug, info, warn};

use crate::config::LoadedConfig;
use crate::control::cost::{CostFunction, CostWeights, Horizon, PredictionWindow};
use crate::control::limiter::MoveLimiter;
use crate::control::optimizer::{Bfgs, Minimizer, SolveStatus};
use crate::error::ControlError;
use crate::model::disturbance::Disturbance;
use crate::model::fopdt::{FopdtParams, PredictionModel, ProcessModel};
use crate::model::integrator::{ConfiguredIntegrator, Integrator};
use crate::model::Plant;
use crate::setpoint::{SetpointSchedule, SetpointSource};
use crate::telemetry::TelemetrySink;

// ─── Tick State ─────────────────────────────────────────────────────

/// Phase of the tick in progress. `Idle` between ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TickPhase {
    #[default]
    Idle,
    Measuring,
    Optimizing,
    Limiting,
    Applying,
}

/// Reason a tick held the previous MV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickFault {
    /// Solver stopped without converging.
    NonConvergence(SolveStatus),
    /// Solver ran past the tick budget.
    MissedDeadline,
}

impl TickFault {
    pub fn kind(&self) -> FaultKind {
        match self {
            Self::NonConvergence(_) => FaultKind::NonConvergence,
            Self::MissedDeadline => FaultKind::MissedDeadline,
        }
    }
}

impl std::fmt::Display for TickFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonConvergence(status) => write!(f, "optimizer did not converge ({status})"),
            Self::MissedDeadline => f.write_str("optimizer missed the tick deadline"),
        }
    }
}

/// State carried from one tick to the next.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerState {
    /// Last measured CV.
    pub cv: f64,
    /// MV applied by the previous tick (or the initial MV).
    pub last_mv: f64,
    /// Index of the next tick.
    pub tick: u64,
    pub phase: TickPhase,
}

impl ControllerState {
    pub fn new(initial_cv: f64, initial_mv: f64) -> Self {
        Self {
            cv: initial_cv,
            last_mv: initial_mv,
            tick: 0,
            phase: TickPhase::Idle,
        }
    }
}

/// Everything one tick decided.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub tick: u64,
    pub measured_cv: f64,
    pub setpoint: f64,
    pub applied_mv: f64,
    /// Limited MV plan over the prediction horizon; `planned_mv[0]` is applied.
    pub planned_mv: Vec<f64>,
    /// Predicted CV after each step of `planned_mv`.
    pub predicted_cv: Vec<f64>,
    pub status: SolveStatus,
    pub cost: f64,
    pub iterations: usize,
    pub evaluations: usize,
    pub fault: Option<TickFault>,
    /// Wall time spent in the tick.
    pub duration: Duration,
}

impl TickOutcome {
    #[inline]
    pub fn held(&self) -> bool {
        self.fault.is_some()
    }

    pub fn telemetry(&self) -> TickTelemetry {
        TickTelemetry {
            tick: self.tick,
            measured_cv: self.measured_cv,
            setpoint: self.setpoint,
            applied_mv: self.applied_mv,
            predicted_cv: self.predicted_cv.clone(),
            fault: self.fault.map(|f| f.kind()),
        }
    }
}

// ─── Cycle Statistics ───────────────────────────────────────────────

/// Per-tick timing and fault counters.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleStats {
    pub tick_count: u64,
    /// Ticks that held the previous MV.
    pub held_ticks: u64,
    pub non_convergences: u64,
    pub missed_deadlines: u64,
    /// Last tick duration [ns].
    pub last_tick_ns: u64,
    pub min_tick_ns: u64,
    pub max_tick_ns: u64,
    /// Running sum for the average.
    pub sum_tick_ns: u128,
    pub total_iterations: u64,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            tick_count: 0,
            held_ticks: 0,
            non_convergences: 0,
            missed_deadlines: 0,
            last_tick_ns: 0,
            min_tick_ns: u64::MAX,
            max_tick_ns: 0,
            sum_tick_ns: 0,
            total_iterations: 0,
        }
    }

    /// Record one tick.
    pub fn record(&mut self, outcome: &TickOutcome) {
        let ns = u64::try_from(outcome.duration.as_nanos()).unwrap_or(u64::MAX);
        self.tick_count += 1;
        self.last_tick_ns = ns;
        self.min_tick_ns = self.min_tick_ns.min(ns);
        self.max_tick_ns = self.max_tick_ns.max(ns);
        self.sum_tick_ns += u128::from(ns);
        self.total_iterations += outcome.iterations as u64;
        match outcome.fault {
            Some(TickFault::NonConvergence(_)) => {
                self.held_ticks += 1;
                self.non_convergences += 1;
            }
            Some(TickFault::MissedDeadline) => {
                self.held_ticks += 1;
                self.missed_deadlines += 1;
            }
            None => {}
        }
    }

    /// Average tick time [ns] (0 if no ticks).
    pub fn avg_tick_ns(&self) -> u64 {
        if self.tick_count == 0 {
            0
        } else {
            u64::try_from(self.sum_tick_ns / u128::from(self.tick_count)).unwrap_or(u64::MAX)
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Loop Settings ──────────────────────────────────────────────────

/// Fixed per-run controller settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopSettings {
    horizon: Horizon,
    weights: CostWeights,
    limiter: MoveLimiter,
    /// Control period [s].
    period: f64,
    tick_budget: Option<Duration>,
}

impl LoopSettings {
    pub fn new(
        horizon: Horizon,
        weights: CostWeights,
        limiter: MoveLimiter,
        period: f64,
        tick_budget: Option<Duration>,
    ) -> Result<Self, ControlError> {
        if Duration::try_from_secs_f64(period).map_or(true, |d| d.is_zero()) {
            return Err(ControlError::InvalidParameter(format!(
                "control period must be finite and > 0, got {period}"
            )));
        }
        Ok(Self {
            horizon,
            weights,
            limiter,
            period,
            tick_budget,
        })
    }

    pub fn from_config(mpc: &MpcConfig, solver: &SolverConfig) -> Result<Self, ControlError> {
        Self::new(
            Horizon::from_config(mpc)?,
            CostWeights::from_config(mpc)?,
            MoveLimiter::from_config(mpc)?,
            mpc.control_period,
            solver.tick_budget_ms.map(Duration::from_millis),
        )
    }

    pub fn horizon(&self) -> Horizon {
        self.horizon
    }

    pub fn weights(&self) -> CostWeights {
        self.weights
    }

    pub fn limiter(&self) -> MoveLimiter {
        self.limiter
    }

    pub fn period(&self) -> f64 {
        self.period
    }

    pub fn tick_budget(&self) -> Option<Duration> {
        self.tick_budget
    }
}

// ─── Control Loop ───────────────────────────────────────────────────

/// Loop over a simulated plant, as built from a configuration file.
pub type SimulatedLoop = ControlLoop<ProcessModel<ConfiguredIntegrator>, SetpointSchedule>;

/// Receding-horizon controller bound to a plant and a setpoint source.
///
/// Owns its [`ControllerState`]; the prediction model is immutable and
/// shared by every cost evaluation of a tick.
#[derive(Debug)]
pub struct ControlLoop<P, S, M = Bfgs, I = ConfiguredIntegrator> {
    plant: P,
    setpoints: S,
    minimizer: M,
    model: PredictionModel<I>,
    settings: LoopSettings,
    state: ControllerState,
    stats: CycleStats,
}

impl SimulatedLoop {
    /// Build the simulated plant, prediction model, setpoint schedule and
    /// solver from a loaded configuration.
    pub fn from_config(config: &LoadedConfig) -> Result<Self, ControlError> {
        let integrator = ConfiguredIntegrator::from_config(&config.solver);
        let model = PredictionModel::new(
            FopdtParams::new(config.mpc.gain, config.mpc.time_constant)?,
            integrator,
        );

        let plant_cfg = config.plant();
        let sim = &config.simulation;
        let plant = ProcessModel::new(
            PredictionModel::new(
                FopdtParams::new(plant_cfg.gain, plant_cfg.time_constant)?,
                integrator,
            ),
            sim.initial_cv,
            config.mpc.control_period,
        )?
        .with_dead_time(plant_cfg.dead_time as usize)
        .with_disturbance(Disturbance::uniform(config.mpc.disturbance_amplitude, sim.seed));

        Ok(ControlLoop::new(
            plant,
            SetpointSchedule::from_profile(&sim.setpoints)?,
            Bfgs::from_config(&config.solver),
            model,
            LoopSettings::from_config(&config.mpc, &config.solver)?,
            ControllerState::new(sim.initial_cv, sim.initial_mv),
        ))
    }
}

impl<P, S, M, I> ControlLoop<P, S, M, I>
where
    P: Plant,
    S: SetpointSource,
    M: Minimizer,
    I: Integrator,
{
    pub fn new(
        plant: P,
        setpoints: S,
        minimizer: M,
        model: PredictionModel<I>,
        settings: LoopSettings,
        state: ControllerState,
    ) -> Self {
        Self {
            plant,
            setpoints,
            minimizer,
            model,
            settings,
            state,
            stats: CycleStats::new(),
        }
    }

    /// Run one tick.
    ///
    /// # Errors
    /// Plant and prediction-model failures. Solver failures are not errors;
    /// they show up as [`TickOutcome::fault`].
    pub fn tick(&mut self) -> Result<TickOutcome, ControlError> {
        let result = self.run_tick();
        self.state.phase = TickPhase::Idle;
        result
    }

    fn run_tick(&mut self) -> Result<TickOutcome, ControlError> {
        let started = Instant::now();
        let deadline = self.settings.tick_budget.map(|budget| started + budget);
        let tick = self.state.tick;
        let uv0 = self.state.last_mv;

        // ═══ MEASURE ═══
        self.state.phase = TickPhase::Measuring;
        let cv = self.plant.measure(uv0)?;
        self.state.cv = cv;
        let setpoint = self.setpoints.setpoint(tick);

        // ═══ OPTIMIZE ═══
        self.state.phase = TickPhase::Optimizing;
        let horizon = self.settings.horizon;
        let cost = CostFunction::new(
            &self.model,
            horizon,
            self.settings.weights,
            self.settings.period,
            PredictionWindow {
                cv0: cv,
                uv0,
                setpoint,
            },
        );
        let initial = vec![uv0; horizon.control()];
        let solution = self
            .minimizer
            .minimize(|moves| cost.evaluate_moves(moves), &initial, deadline)?;

        let overran = deadline.is_some_and(|d| Instant::now() > d);
        let fault = match solution.status {
            SolveStatus::Converged if !overran => None,
            SolveStatus::Converged | SolveStatus::TimedOut => Some(TickFault::MissedDeadline),
            status => Some(TickFault::NonConvergence(status)),
        };

        // ═══ LIMIT ═══
        self.state.phase = TickPhase::Limiting;
        let planned_mv = match fault {
            None => self
                .settings
                .limiter
                .apply(uv0, &horizon.expand(&solution.trajectory)),
            Some(_) => vec![uv0; horizon.prediction()],
        };
        let predicted_cv = cost.predict(&planned_mv)?;

        // ═══ APPLY ═══
        self.state.phase = TickPhase::Applying;
        let applied_mv = planned_mv.first().copied().unwrap_or(uv0);
        self.state.last_mv = applied_mv;
        self.state.tick += 1;

        match fault {
            Some(f) => warn!(tick, cv, held_mv = uv0, "{f}; holding previous MV"),
            None => debug!(
                tick,
                cv,
                setpoint,
                mv = applied_mv,
                cost = solution.cost,
                iterations = solution.iterations,
                "tick applied"
            ),
        }

        let outcome = TickOutcome {
            tick,
            measured_cv: cv,
            setpoint,
            applied_mv,
            planned_mv,
            predicted_cv,
            status: solution.status,
            cost: solution.cost,
            iterations: solution.iterations,
            evaluations: solution.evaluations,
            fault,
            duration: started.elapsed(),
        };
        self.stats.record(&outcome);
        Ok(outcome)
    }

    /// Tick until `ticks` have run (forever if `None`) or `running` is
    /// cleared, sending every tick to `sink`.
    ///
    /// With `realtime`, each tick is padded out to the control period.
    pub fn run<T: TelemetrySink>(
        &mut self,
        ticks: Option<u64>,
        running: &AtomicBool,
        realtime: bool,
        sink: &mut T,
    ) -> Result<(), ControlError> {
        let period = Duration::try_from_secs_f64(self.settings.period)
            .map_err(|e| ControlError::InvalidParameter(e.to_string()))?;
        info!(?ticks, realtime, period_s = self.settings.period, "control loop starting");

        let mut done = 0u64;
        while running.load(Ordering::SeqCst) && ticks.is_none_or(|n| done < n) {
            let outcome = self.tick()?;
            sink.record(&outcome.telemetry())?;
            done += 1;

            if realtime {
                if let Some(remaining) = period.checked_sub(outcome.duration) {
                    std::thread::sleep(remaining);
                }
            }
        }
        sink.flush()?;

        info!(
            ticks = self.stats.tick_count,
            held = self.stats.held_ticks,
            non_convergences = self.stats.non_convergences,
            missed_deadlines = self.stats.missed_deadlines,
            avg_tick_us = self.stats.avg_tick_ns() / 1000,
            "control loop stopped"
        );
        Ok(())
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    pub fn model(&self) -> &PredictionModel<I> {
        &self.model
    }

    pub fn plant(&self) -> &P {
        &self.plant
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
