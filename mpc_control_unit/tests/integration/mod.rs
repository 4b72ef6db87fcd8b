mod closed_loop;
mod config_loading;
mod dead_time;
mod telemetry;

/// `[mpc]` section of the reference process: K = 3, tau = 5 s, 1 s period.
pub const REFERENCE_MPC: &str = r#"
[mpc]
gain = 3.0
time_constant = 5.0
dead_time = 0
prediction_horizon = 6
control_horizon = 3
control_period = 1.0
tracking_weight = 20.0
move_weight = 20.0
max_move = 2.0
disturbance_amplitude = 0.0
"#;

/// Reference config with `[simulation]` starting at CV 20 / MV 2 and a
/// constant setpoint of 10, plus any extra sections.
pub fn reference_config(extra: &str) -> String {
    format!(
        "{REFERENCE_MPC}\n[simulation]\ninitial_cv = 20.0\ninitial_mv = 2.0\n\n[simulation.setpoints]\nvalues = [10.0]\n{extra}"
    )
}
