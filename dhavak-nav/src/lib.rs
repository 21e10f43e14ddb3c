//! DhavakNav - obstacle-aware waypoint navigation for a single runner.
//!
//! Every control period the runner picks one local waypoint: the point
//! inside a small box around itself that gets closest to the final goal
//! while staying clear of a single moving obstacle. A proportional steering
//! controller then turns that waypoint into a planar velocity command.
//!
//! ## Modules
//!
//! - [`state`]: Owned pose state (runner, obstacle, goal, waypoint)
//! - [`optimizer`]: Waypoint NLP and its SQP backend
//! - [`controller`]: Steering and velocity command computation
//! - [`control`]: Fixed-rate control loop with channel inputs and a sink
//! - [`sim`]: Simulated turtle world used by the binary and integration tests
//! - [`threads`]: Simulator thread
//!
//! ## Example
//!
//! ```rust,ignore
//! use dhavak_nav::{ControlLoop, DhavakConfig, PoseInputs};
//!
//! let config = DhavakConfig::default();
//! let (runner_tx, runner_rx) = crossbeam_channel::bounded(64);
//! let (obstacle_tx, obstacle_rx) = crossbeam_channel::bounded(64);
//! let (cmd_tx, cmd_rx) = crossbeam_channel::bounded(16);
//!
//! let inputs = PoseInputs::new(runner_rx, obstacle_rx, config.control.max_updates_per_tick);
//! let mut control = ControlLoop::new(&config, inputs, cmd_tx)?;
//! let report = control.tick()?;
//! ```

pub mod config;
pub mod control;
pub mod controller;
pub mod error;
pub mod optimizer;
pub mod sim;
pub mod state;
pub mod threads;
pub mod types;
pub mod utils;

pub use config::DhavakConfig;
pub use control::{ControlLoop, LoopState, PoseInputs, RunSummary, StopReason, TickReport, VelocitySink};
pub use controller::{HeadingErrorPolicy, SteeringConfig, SteeringController, steering_angle};
pub use error::{DhavakError, Result};
pub use optimizer::{
    FailurePolicy, NlpSolver, OptimizerConfig, OptimizerOutcome, SolveStatus, SqpSolver,
    WaypointOptimizer, WaypointProblem,
};
pub use sim::{ObstacleMotion, SimulationConfig, TurtleWorld};
pub use state::PoseState;
pub use types::{Point2D, Pose2D, VelocityCommand};
