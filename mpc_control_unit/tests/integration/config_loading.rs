//! Shipped configuration file and loader error paths.

use std::fs;
use std::path::PathBuf;

use mpc_common::config::ConfigError;
use mpc_control_unit::config::{load_config, load_config_from_str};
use mpc_control_unit::cycle::SimulatedLoop;
use tempfile::TempDir;

use super::{REFERENCE_MPC, reference_config};

fn shipped_config() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../config/mpc.toml")
}

#[test]
fn shipped_config_loads_and_runs() {
    let cfg = load_config(&shipped_config()).unwrap();
    assert_eq!(cfg.mpc.prediction_horizon, 6);
    assert_eq!(cfg.simulation.setpoints.values, vec![6.0, 10.0, 4.0]);

    let mut control = SimulatedLoop::from_config(&cfg).unwrap();
    for _ in 0..5 {
        control.tick().unwrap();
    }
    assert_eq!(control.state().tick, 5);
}

#[test]
fn load_from_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mpc.toml");
    fs::write(&path, reference_config("")).unwrap();
    let cfg = load_config(&path).unwrap();
    assert_eq!(cfg.simulation.initial_cv, 20.0);
}

#[test]
fn every_mpc_field_is_required() {
    for field in [
        "gain",
        "time_constant",
        "dead_time",
        "prediction_horizon",
        "control_horizon",
        "control_period",
        "tracking_weight",
        "move_weight",
        "max_move",
        "disturbance_amplitude",
    ] {
        let text: String = REFERENCE_MPC
            .lines()
            .filter(|l| !l.starts_with(&format!("{field} =")))
            .collect::<Vec<_>>()
            .join("\n");
        match load_config_from_str(&text) {
            Err(ConfigError::ParseError(msg)) => assert!(msg.contains(field), "{field}: {msg}"),
            other => panic!("{field}: expected parse error, got {other:?}"),
        }
    }
}

#[test]
fn unknown_mpc_field_is_rejected() {
    let text = REFERENCE_MPC.replace("gain = 3.0", "gain = 3.0\nintegral_gain = 1.0");
    assert!(matches!(
        load_config_from_str(&text),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
fn out_of_range_values_fail_validation() {
    for (from, to) in [
        ("time_constant = 5.0", "time_constant = 0.0"),
        ("control_horizon = 3", "control_horizon = 0"),
        ("control_period = 1.0", "control_period = -1.0"),
        ("move_weight = 20.0", "move_weight = -1.0"),
        ("max_move = 2.0", "max_move = -0.5"),
        ("disturbance_amplitude = 0.0", "disturbance_amplitude = -2.0"),
    ] {
        let text = REFERENCE_MPC.replace(from, to);
        assert!(
            matches!(load_config_from_str(&text), Err(ConfigError::ValidationError(_))),
            "{to} accepted"
        );
    }
}
