//! Closed-loop behaviour against a simulated plant.
//!
//! With an exact model and no disturbance the controller must settle on
//! the setpoint with zero offset, respect the move limit on every tick and
//! never fall back to holding.

use approx::assert_relative_eq;
use mpc_control_unit::config::load_config_from_str;
use mpc_control_unit::control::{
    Bfgs, CostFunction, CostWeights, Horizon, Minimizer, PredictionWindow,
};
use mpc_control_unit::cycle::SimulatedLoop;
use mpc_control_unit::model::{FopdtParams, PredictionModel};

use super::reference_config;

fn run_ticks(control: &mut SimulatedLoop, n: usize) -> Vec<(f64, f64)> {
    (0..n)
        .map(|_| {
            let out = control.tick().unwrap();
            (out.measured_cv, out.applied_mv)
        })
        .collect()
}

#[test]
fn settles_on_setpoint_without_offset() {
    let cfg = load_config_from_str(&reference_config("")).unwrap();
    let mut control = SimulatedLoop::from_config(&cfg).unwrap();
    let trace = run_ticks(&mut control, 60);

    let (cv, mv) = *trace.last().unwrap();
    assert!((cv - 10.0).abs() < 0.01, "cv = {cv}");
    assert!((mv - 10.0 / 3.0).abs() < 0.01, "mv = {mv}");
    assert_eq!(control.stats().held_ticks, 0);
}

#[test]
fn every_applied_move_respects_max_move() {
    let text = reference_config("").replace("max_move = 2.0", "max_move = 0.25");
    let cfg = load_config_from_str(&text).unwrap();
    let mut control = SimulatedLoop::from_config(&cfg).unwrap();

    let mut prev = cfg.simulation.initial_mv;
    for _ in 0..40 {
        let out = control.tick().unwrap();
        assert!(
            (out.applied_mv - prev).abs() <= 0.25 + 1e-12,
            "tick {}: {} -> {}",
            out.tick,
            prev,
            out.applied_mv
        );
        prev = out.applied_mv;
    }
}

#[test]
fn follows_setpoint_schedule() {
    let text = super::REFERENCE_MPC.to_string()
        + r#"
[simulation]
ticks = 60
initial_cv = 20.0
initial_mv = 2.0

[simulation.setpoints]
change_ticks = [15, 40]
values = [6.0, 10.0, 4.0]
"#;
    let cfg = load_config_from_str(&text).unwrap();
    let mut control = SimulatedLoop::from_config(&cfg).unwrap();
    let trace = run_ticks(&mut control, 60);

    assert!((trace[14].0 - 6.0).abs() < 0.05, "cv[14] = {}", trace[14].0);
    assert!((trace[39].0 - 10.0).abs() < 0.01, "cv[39] = {}", trace[39].0);
    assert!((trace[59].0 - 4.0).abs() < 0.01, "cv[59] = {}", trace[59].0);
}

#[test]
fn rk4_and_rkf45_loops_agree() {
    let base = load_config_from_str(&reference_config("")).unwrap();
    let rk4 = load_config_from_str(&reference_config("\n[solver]\nintegrator = \"rk4\"\n")).unwrap();
    let mut a = SimulatedLoop::from_config(&base).unwrap();
    let mut b = SimulatedLoop::from_config(&rk4).unwrap();

    let ta = run_ticks(&mut a, 30);
    let tb = run_ticks(&mut b, 30);
    for ((cv_a, _), (cv_b, _)) in ta.iter().zip(&tb) {
        assert!((cv_a - cv_b).abs() < 1e-3, "{cv_a} vs {cv_b}");
    }
}

#[test]
fn disturbed_plant_stays_near_setpoint() {
    let text = reference_config("").replace("disturbance_amplitude = 0.0", "disturbance_amplitude = 1.0");
    let cfg = load_config_from_str(&text).unwrap();
    let mut control = SimulatedLoop::from_config(&cfg).unwrap();
    let trace = run_ticks(&mut control, 80);

    for (cv, _) in &trace[40..] {
        assert!((cv - 10.0).abs() < 0.5, "cv = {cv}");
    }
}

#[test]
fn optimum_improves_on_initial_guess() {
    let model = PredictionModel::with_default_integrator(FopdtParams::new(1.0, 1.0).unwrap());
    let cost = CostFunction::new(
        &model,
        Horizon::new(4, 1).unwrap(),
        CostWeights::new(1.0, 0.0).unwrap(),
        1.0,
        PredictionWindow {
            cv0: 0.0,
            uv0: 0.0,
            setpoint: 10.0,
        },
    );

    let initial = [0.0];
    let sol = Bfgs::default()
        .minimize(|m| cost.evaluate_moves(m), &initial, None)
        .unwrap();
    assert!(sol.success());
    assert!(sol.cost <= cost.evaluate_moves(&initial).unwrap());

    // Single free move: least squares against the step-response factors.
    let factors: Vec<f64> = (1..=4).map(|i| 1.0 - (-(i as f64)).exp()).collect();
    let expected = 10.0 * factors.iter().sum::<f64>() / factors.iter().map(|a| a * a).sum::<f64>();
    assert_relative_eq!(sol.trajectory[0], expected, max_relative = 1e-4);
}
