//! # MPC Control Unit
//!
//! Closed-loop simulation of the receding-horizon controller against a
//! simulated FOPDT plant. Reads one TOML configuration file, runs the
//! configured number of ticks (or until Ctrl-C) and emits one telemetry
//! record per tick: as log lines, or as JSON lines on stdout with
//! `--telemetry-json`.

use clap::Parser;
use mpc_common::consts::DEFAULT_CONFIG_PATH;
use mpc_control_unit::config::{load_config, LoadedConfig};
use mpc_control_unit::cycle::SimulatedLoop;
use mpc_control_unit::telemetry::{JsonLinesSink, TracingSink};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// MPC Control Unit: FOPDT receding-horizon controller
#[derive(Parser, Debug)]
#[command(name = "mpc_control_unit")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Model predictive control of a first-order-plus-dead-time process")]
struct Args {
    /// Path to the MPC configuration TOML.
    #[arg(default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Ticks to run; overrides `[simulation].ticks`. 0 runs until Ctrl-C.
    #[arg(long)]
    ticks: Option<u64>,

    /// Pace ticks to the control period in wall-clock time.
    #[arg(long)]
    realtime: bool,

    /// Write per-tick telemetry as JSON lines to stdout.
    #[arg(long)]
    telemetry_json: bool,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    // Loaded before tracing so `[shared].log_level` can pick the default level.
    let config = load_config(&args.config);
    let configured = config
        .as_ref()
        .ok()
        .and_then(|c| c.shared.log_level.as_directive().parse::<Level>().ok());
    setup_tracing(&args, configured.unwrap_or(Level::INFO));

    info!("MPC Control Unit v{} starting...", env!("CARGO_PKG_VERSION"));

    let result = match config {
        Ok(config) => run(&args, config),
        Err(e) => Err(format!("loading {}: {e}", args.config.display()).into()),
    };
    if let Err(e) = result {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("MPC Control Unit shutdown complete");
}

fn run(args: &Args, config: LoadedConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        service = %config.shared.service_name,
        "Config OK: K={}, tau={}s, theta={} ticks, ph={}, ch={}, period={}s",
        config.mpc.gain,
        config.mpc.time_constant,
        config.mpc.dead_time,
        config.mpc.prediction_horizon,
        config.mpc.control_horizon,
        config.mpc.control_period,
    );
    if config.has_model_mismatch() {
        let plant = config.plant();
        warn!(
            "Plant differs from prediction model: K={}, tau={}s, theta={} ticks",
            plant.gain, plant.time_constant, plant.dead_time
        );
    }

    let mut control = SimulatedLoop::from_config(&config)?;

    // Setup signal handler for graceful shutdown.
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    let ticks = match args.ticks.unwrap_or(config.simulation.ticks) {
        0 => None,
        n => Some(n),
    };
    let realtime = args.realtime || config.simulation.realtime;

    if args.telemetry_json {
        let mut sink = JsonLinesSink::new(std::io::stdout().lock());
        control.run(ticks, &running, realtime, &mut sink)?;
    } else {
        control.run(ticks, &running, realtime, &mut TracingSink)?;
    }

    let stats = control.stats();
    let state = control.state();
    info!(
        "Finished {} ticks: final CV={:.4}, MV={:.4}, held={}, missed deadlines={}, avg tick={}µs, max tick={}µs",
        stats.tick_count,
        state.cv,
        state.last_mv,
        stats.held_ticks,
        stats.missed_deadlines,
        stats.avg_tick_ns() / 1000,
        stats.max_tick_ns / 1000,
    );

    Ok(())
}

/// Setup tracing subscriber based on CLI arguments.
///
/// Logs go to stderr so `--telemetry-json` output on stdout stays clean.
fn setup_tracing(args: &Args, configured: Level) {
    let level = if args.verbose { Level::DEBUG } else { configured };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}
