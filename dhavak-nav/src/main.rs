//! DhavakNav - waypoint navigation demo against a simulated turtle world.
//!
//! ## Threads
//!
//! - **Main thread** (control rate, 5Hz by default): drains pose updates,
//!   optimizes the next waypoint, sends velocity commands
//! - **Simulator thread** (physics rate, 50Hz by default): integrates the
//!   runner and the obstacle, publishes their poses
//!
//! Ctrl-C stops the loop at the next tick boundary; a zero command is always
//! sent before exit.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use dhavak_nav::control::{ControlLoop, PoseInputs};
use dhavak_nav::threads::spawn_simulator;
use dhavak_nav::{DhavakConfig, DhavakError, FailurePolicy, HeadingErrorPolicy, Result};

/// Pose channel capacity per source.
const POSE_CHANNEL_CAPACITY: usize = 256;

/// Velocity command channel capacity.
const COMMAND_CHANNEL_CAPACITY: usize = 16;

#[derive(Parser)]
#[command(name = "dhavak-nav")]
#[command(about = "Drive a runner to a goal around a moving obstacle")]
struct Args {
    /// Configuration file (TOML)
    #[arg(value_name = "CONFIG")]
    config_path: Option<PathBuf>,

    /// Configuration file (TOML), same as the positional argument
    #[arg(short, long, conflicts_with = "config_path")]
    config: Option<PathBuf>,

    /// Goal x coordinate
    #[arg(long, allow_negative_numbers = true)]
    goal_x: Option<f64>,

    /// Goal y coordinate
    #[arg(long, allow_negative_numbers = true)]
    goal_y: Option<f64>,

    /// Control loop rate in Hz
    #[arg(long)]
    rate: Option<f64>,

    /// Adopt failed solver candidates and use the raw heading error
    #[arg(long)]
    legacy: bool,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dhavak_nav=info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    if let Err(e) = config.validate() {
        error!("{}", e);
        return Err(e);
    }

    info!("DhavakNav v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Goal ({:.2}, {:.2}), tolerance {:.2}, {:.1} Hz",
        config.goal.x, config.goal.y, config.control.goal_tolerance, config.control.rate_hz
    );
    info!(
        "Trust region ±{:.2}, clearance {:.2} (squared {:.2}), on failure: {:?}",
        config.optimizer.trust_region_radius,
        config.optimizer.min_safe_distance_squared.sqrt(),
        config.optimizer.min_safe_distance_squared,
        config.optimizer.failure_policy
    );

    // Cleared by Ctrl-C
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .map_err(|e| DhavakError::Io(std::io::Error::other(e)))?;

    let (runner_tx, runner_rx) = crossbeam_channel::bounded(POSE_CHANNEL_CAPACITY);
    let (obstacle_tx, obstacle_rx) = crossbeam_channel::bounded(POSE_CHANNEL_CAPACITY);
    let (cmd_tx, cmd_rx) = crossbeam_channel::bounded(COMMAND_CHANNEL_CAPACITY);

    // The simulator outlives the loop so it can receive the final zero command.
    let sim_running = Arc::new(AtomicBool::new(true));
    let simulator = spawn_simulator(
        config.simulation.clone(),
        cmd_rx,
        runner_tx,
        obstacle_tx,
        Arc::clone(&sim_running),
    )?;

    let inputs = PoseInputs::new(runner_rx, obstacle_rx, config.control.max_updates_per_tick);
    let mut control = ControlLoop::new(&config, inputs, cmd_tx)?;
    let result = control.run(&running);
    drop(control);

    sim_running.store(false, Ordering::SeqCst);
    if let Err(e) = simulator.join() {
        error!("Simulator thread panicked: {:?}", e);
    }

    match result {
        Ok(summary) => {
            if summary.solver_failures > 0 {
                warn!(
                    "{} of {} ticks used a fallback waypoint",
                    summary.solver_failures, summary.ticks
                );
            }
            info!("DhavakNav finished: {}", summary.reason);
            Ok(())
        }
        Err(e) => {
            error!("Control loop failed: {}", e);
            Err(e)
        }
    }
}

/// Load the configuration file and apply command line overrides.
fn load_config(args: &Args) -> Result<DhavakConfig> {
    let path = args.config.as_ref().or(args.config_path.as_ref());

    let mut config = match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            DhavakConfig::load(path)?
        }
        None if Path::new("dhavak.toml").exists() => {
            info!("Loading configuration from dhavak.toml");
            DhavakConfig::load(Path::new("dhavak.toml"))?
        }
        None => {
            info!("Using default configuration");
            DhavakConfig::default()
        }
    };

    if let Some(x) = args.goal_x {
        config.goal.x = x;
    }
    if let Some(y) = args.goal_y {
        config.goal.y = y;
    }
    if let Some(rate) = args.rate {
        config.control.rate_hz = rate;
    }
    if args.legacy {
        info!("Legacy mode: adopting failed candidates, raw heading error");
        config.optimizer.failure_policy = FailurePolicy::AdoptCandidate;
        config.control.heading_error = HeadingErrorPolicy::Raw;
    }

    Ok(config)
}
