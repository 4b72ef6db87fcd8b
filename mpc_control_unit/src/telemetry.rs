//! Per-tick telemetry sinks.
//!
//! The loop emits one [`TickTelemetry`] per tick; what happens to it is up
//! to the sink. Sink failures surface as [`ControlError::Telemetry`].

use std::io::Write;

use mpc_common::mpc::telemetry::TickTelemetry;
use tracing::info;

use crate::error::ControlError;

pub trait TelemetrySink {
    fn record(&mut self, tick: &TickTelemetry) -> Result<(), ControlError>;

    fn flush(&mut self) -> Result<(), ControlError> {
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn record(&mut self, _tick: &TickTelemetry) -> Result<(), ControlError> {
        Ok(())
    }
}

/// Logs each tick at INFO through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn record(&mut self, tick: &TickTelemetry) -> Result<(), ControlError> {
        info!(
            tick = tick.tick,
            cv = tick.measured_cv,
            sp = tick.setpoint,
            mv = tick.applied_mv,
            fault = ?tick.fault,
            "tick"
        );
        Ok(())
    }
}

/// One JSON object per line.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> TelemetrySink for JsonLinesSink<W> {
    fn record(&mut self, tick: &TickTelemetry) -> Result<(), ControlError> {
        serde_json::to_writer(&mut self.writer, tick)
            .map_err(|e| ControlError::Telemetry(e.to_string()))?;
        self.writer
            .write_all(b"\n")
            .map_err(|e| ControlError::Telemetry(e.to_string()))
    }

    fn flush(&mut self) -> Result<(), ControlError> {
        self.writer
            .flush()
            .map_err(|e| ControlError::Telemetry(e.to_string()))
    }
}

/// Keeps every record in memory.
impl TelemetrySink for Vec<TickTelemetry> {
    fn record(&mut self, tick: &TickTelemetry) -> Result<(), ControlError> {
        self.push(tick.clone());
        Ok(())
    }
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for &mut T {
    fn record(&mut self, tick: &TickTelemetry) -> Result<(), ControlError> {
        (**self).record(tick)
    }

    fn flush(&mut self) -> Result<(), ControlError> {
        (**self).flush()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
