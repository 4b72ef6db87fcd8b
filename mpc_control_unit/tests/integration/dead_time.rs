//! Dead-time handling in the simulated plant.

use approx::assert_relative_eq;
use mpc_control_unit::config::load_config_from_str;
use mpc_control_unit::cycle::SimulatedLoop;
use mpc_control_unit::model::{DeadTimeBuffer, FopdtParams, PredictionModel, ProcessModel};

use super::reference_config;

#[test]
fn buffer_fifo_with_eviction() {
    let mut buf = DeadTimeBuffer::new(2);
    buf.push(0.0, 5.0);
    buf.push(1.0, 7.0);
    assert_eq!(buf.pop(), 5.0);
    buf.push(2.0, 9.0);
    assert_eq!(buf.pop(), 7.0);
    assert_eq!(buf.len(), 2);
}

#[test]
fn plant_sees_nothing_until_dead_time_elapses() {
    let cfg = load_config_from_str(&reference_config("\n[simulation.plant]\ndead_time = 2\n")).unwrap();
    let mut control = SimulatedLoop::from_config(&cfg).unwrap();

    let cv: Vec<f64> = (0..3).map(|_| control.tick().unwrap().measured_cv).collect();
    let decay = (-0.2f64).exp();

    // Empty buffer feeds 0 for the first two periods.
    assert_relative_eq!(cv[0], 20.0 * decay, max_relative = 1e-6);
    assert_relative_eq!(cv[1], 20.0 * decay * decay, max_relative = 1e-6);
    // Third period sees the initial MV pushed on the first tick.
    assert_relative_eq!(cv[2], 6.0 + (cv[1] - 6.0) * decay, max_relative = 1e-6);

    let buffer = control.plant().dead_time().unwrap();
    assert_eq!(buffer.empty_pops(), 2);
    assert_eq!(buffer.len(), 2);
}

#[test]
fn controller_settles_despite_unmodelled_dead_time() {
    let cfg = load_config_from_str(&reference_config("\n[simulation.plant]\ndead_time = 2\n")).unwrap();
    assert!(cfg.has_model_mismatch());
    let mut control = SimulatedLoop::from_config(&cfg).unwrap();

    let mut last = 0.0;
    for _ in 0..150 {
        last = control.tick().unwrap().measured_cv;
    }
    assert!((last - 10.0).abs() < 0.01, "cv = {last}");
}

#[test]
fn solve_sequence_shifts_by_dead_time() {
    let model = PredictionModel::with_default_integrator(FopdtParams::new(2.0, 4.0).unwrap());
    let mut plant = ProcessModel::new(model, 0.0, 1.0).unwrap().with_dead_time(3);

    let times: Vec<f64> = (0..8).map(f64::from).collect();
    let mvs = [1.0; 8];
    let ys = plant.solve_sequence(&times, &mvs, 0.0).unwrap();

    // Three delayed intervals at MV 0, then the step response starts.
    assert_eq!(&ys[..4], &[0.0; 4]);
    let undelayed = model.predict_sequence(&times[..5], &[1.0; 5], 0.0).unwrap();
    assert_relative_eq!(ys[7], undelayed[4], max_relative = 1e-12);
}
