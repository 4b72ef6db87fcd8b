//! Telemetry emitted by the run loop.

use std::sync::atomic::AtomicBool;

use mpc_common::mpc::telemetry::{FaultKind, TickTelemetry};
use mpc_control_unit::config::load_config_from_str;
use mpc_control_unit::cycle::SimulatedLoop;
use mpc_control_unit::telemetry::{JsonLinesSink, TelemetrySink};

use super::reference_config;

#[test]
fn json_lines_per_tick() {
    let cfg = load_config_from_str(&reference_config("")).unwrap();
    let mut control = SimulatedLoop::from_config(&cfg).unwrap();
    let running = AtomicBool::new(true);
    let mut sink = JsonLinesSink::new(Vec::new());

    control.run(Some(8), &running, false, &mut sink).unwrap();
    sink.flush().unwrap();

    let text = String::from_utf8(sink.into_inner()).unwrap();
    let records: Vec<TickTelemetry> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(records.len(), 8);
    for (i, r) in records.iter().enumerate() {
        assert_eq!(r.tick, i as u64);
        assert_eq!(r.setpoint, 10.0);
        assert_eq!(r.predicted_cv.len(), 6);
        assert_eq!(r.fault, None);
    }
}

#[test]
fn missed_deadlines_are_reported() {
    let cfg = load_config_from_str(&reference_config("\n[solver]\ntick_budget_ms = 0\n")).unwrap();
    let mut control = SimulatedLoop::from_config(&cfg).unwrap();
    let running = AtomicBool::new(true);
    let mut records: Vec<TickTelemetry> = Vec::new();

    control.run(Some(3), &running, false, &mut records).unwrap();

    assert!(records.iter().all(|r| r.fault == Some(FaultKind::MissedDeadline)));
    assert!(records.iter().all(|r| r.applied_mv == 2.0));
    assert_eq!(control.stats().missed_deadlines, 3);
}
