//! Fixed-rate control loop.
//!
//! Each tick runs sense → optimize → actuate → check:
//! 1. Drain pending pose updates into the pose state
//! 2. Refresh the waypoint with the optimizer
//! 3. Compute the velocity command and send it to the sink
//! 4. Terminate once the runner is within the goal tolerance
//!
//! A terminated loop sends one zero command and does nothing further. The
//! loop never waits for pose updates: until a source reports, its default
//! pose (the origin) is used.

mod inputs;
mod sink;

pub use inputs::{DrainStats, PoseInputs};
pub use sink::VelocitySink;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::config::DhavakConfig;
use crate::controller::SteeringController;
use crate::error::{DhavakError, Result};
use crate::optimizer::{NlpSolver, SolveStatus, SqpSolver, WaypointOptimizer};
use crate::state::PoseState;
use crate::types::{Pose2D, VelocityCommand};

/// Control loop phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Sensing,
    Optimizing,
    Actuating,
    Terminated,
}

/// Why a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    GoalReached,
    Cancelled,
    TickLimit,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::GoalReached => write!(f, "goal reached"),
            StopReason::Cancelled => write!(f, "cancelled"),
            StopReason::TickLimit => write!(f, "tick limit"),
        }
    }
}

/// Outcome of one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickReport {
    /// Tick number, starting at 1
    pub tick: u64,
    /// Loop state after the tick
    pub state: LoopState,
    /// Solver status; `None` when the tick did not optimize
    pub status: Option<SolveStatus>,
    pub fallback_applied: bool,
    pub waypoint: Pose2D,
    /// Command sent this tick (zero when nothing was sent)
    pub command: VelocityCommand,
    pub distance_to_goal: f64,
}

/// Summary returned by [`ControlLoop::run`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub reason: StopReason,
    /// Ticks whose solve did not succeed
    pub solver_failures: u64,
}

/// Loop timing and termination settings.
#[derive(Clone, Debug)]
struct LoopSettings {
    period: Duration,
    goal_tolerance: f64,
    status_interval_ticks: u64,
    max_ticks: Option<u64>,
}

impl LoopSettings {
    fn from_config(config: &DhavakConfig) -> Result<Self> {
        let period = Duration::try_from_secs_f64(1.0 / config.control.rate_hz).map_err(|_| {
            DhavakError::invalid("control.rate_hz", config.control.rate_hz, "period out of range")
        })?;
        Ok(Self {
            period,
            goal_tolerance: config.control.goal_tolerance,
            status_interval_ticks: config.control.status_interval_ticks,
            max_ticks: config.control.max_ticks,
        })
    }
}

/// The control loop. Owns the pose state, the optimizer and the sink.
pub struct ControlLoop<K: VelocitySink, S: NlpSolver = SqpSolver> {
    pose: PoseState,
    inputs: PoseInputs,
    optimizer: WaypointOptimizer<S>,
    controller: SteeringController,
    sink: K,
    settings: LoopSettings,
    state: LoopState,
    ticks: u64,
    solver_failures: u64,
}

impl<K: VelocitySink> ControlLoop<K> {
    /// Create a loop backed by the SQP solver.
    ///
    /// Fails with `InvalidConfiguration` when `config` does not validate.
    pub fn new(config: &DhavakConfig, inputs: PoseInputs, sink: K) -> Result<Self> {
        let optimizer = WaypointOptimizer::new(config.optimizer.clone());
        Self::with_optimizer(config, optimizer, inputs, sink)
    }
}

impl<K: VelocitySink, S: NlpSolver> ControlLoop<K, S> {
    /// Create a loop with a custom optimizer backend.
    pub fn with_optimizer(
        config: &DhavakConfig,
        optimizer: WaypointOptimizer<S>,
        inputs: PoseInputs,
        sink: K,
    ) -> Result<Self> {
        config.validate()?;
        optimizer.config().validate()?;
        Ok(Self {
            pose: PoseState::new(config.goal_pose()),
            inputs,
            optimizer,
            controller: SteeringController::new(config.steering())?,
            sink,
            settings: LoopSettings::from_config(config)?,
            state: LoopState::Idle,
            ticks: 0,
            solver_failures: 0,
        })
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn pose_state(&self) -> &PoseState {
        &self.pose
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn solver_failures(&self) -> u64 {
        self.solver_failures
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Run a single tick.
    ///
    /// Returns an error only when the sink rejects a command; the loop is
    /// terminated in that case.
    pub fn tick(&mut self) -> Result<TickReport> {
        if self.state == LoopState::Terminated {
            return Ok(self.quiet_report());
        }

        self.state = LoopState::Sensing;
        let drained = self.inputs.drain_into(&mut self.pose);
        tracing::trace!(
            "Drained {} runner and {} obstacle updates",
            drained.runner,
            drained.obstacle
        );

        self.ticks += 1;

        if !self.pose.has_runner_fix() || !self.pose.has_obstacle_fix() {
            tracing::debug!(
                "Tick {}: using default pose (runner fix: {}, obstacle fix: {})",
                self.ticks,
                self.pose.has_runner_fix(),
                self.pose.has_obstacle_fix()
            );
        }

        self.state = LoopState::Optimizing;
        let outcome = self.optimizer.refresh(&mut self.pose);
        if !outcome.status.is_success() {
            self.solver_failures += 1;
            tracing::warn!(
                "Tick {}: solver {} after {} iterations, candidate ({:.3}, {:.3}){}",
                self.ticks,
                outcome.status,
                outcome.iterations,
                outcome.candidate.x,
                outcome.candidate.y,
                if outcome.fallback_applied {
                    ", holding fallback waypoint"
                } else {
                    ""
                }
            );
        }

        self.state = LoopState::Actuating;
        let runner = self.pose.runner();
        let command = self.controller.compute_command(&runner, &outcome.waypoint);
        if let Err(e) = self.sink.send(&command) {
            self.state = LoopState::Terminated;
            return Err(e);
        }

        let distance_to_goal = self.pose.distance_to_goal();
        tracing::debug!(
            "Tick {}: runner=({:.3}, {:.3}) waypoint=({:.3}, {:.3}) distance={:.3}",
            self.ticks,
            runner.x,
            runner.y,
            outcome.waypoint.x,
            outcome.waypoint.y,
            distance_to_goal
        );

        if distance_to_goal < self.settings.goal_tolerance {
            tracing::info!(
                "Goal reached after {} ticks (distance {:.3})",
                self.ticks,
                distance_to_goal
            );
            self.terminate()?;
        } else if self.settings.status_interval_ticks > 0
            && self.ticks % self.settings.status_interval_ticks == 0
        {
            self.log_status(distance_to_goal);
        }

        Ok(TickReport {
            tick: self.ticks,
            state: self.state,
            status: Some(outcome.status),
            fallback_applied: outcome.fallback_applied,
            waypoint: outcome.waypoint,
            command,
            distance_to_goal,
        })
    }

    /// Tick at the configured rate until the goal is reached, the tick limit
    /// is hit, or `running` clears.
    pub fn run(&mut self, running: &AtomicBool) -> Result<RunSummary> {
        tracing::info!(
            "Control loop started: goal=({:.2}, {:.2}), period={:?}",
            self.pose.goal().x,
            self.pose.goal().y,
            self.settings.period
        );

        let reason = loop {
            let loop_start = Instant::now();

            if !running.load(Ordering::SeqCst) {
                tracing::info!("Control loop cancelled");
                self.terminate()?;
                break StopReason::Cancelled;
            }

            if let Some(max) = self.settings.max_ticks
                && self.ticks >= max
            {
                tracing::warn!("Tick limit {} reached before goal", max);
                self.terminate()?;
                break StopReason::TickLimit;
            }

            if self.tick()?.state == LoopState::Terminated {
                break StopReason::GoalReached;
            }

            // Maintain target loop rate
            let elapsed = loop_start.elapsed();
            if elapsed < self.settings.period {
                std::thread::sleep(self.settings.period - elapsed);
            }
        };

        let summary = RunSummary {
            ticks: self.ticks,
            reason,
            solver_failures: self.solver_failures,
        };
        tracing::info!(
            "Control loop exited: {} after {} ticks ({} solver failures)",
            summary.reason,
            summary.ticks,
            summary.solver_failures
        );
        Ok(summary)
    }

    /// Send the zero command once and stop.
    fn terminate(&mut self) -> Result<()> {
        if self.state == LoopState::Terminated {
            return Ok(());
        }
        self.state = LoopState::Terminated;
        self.sink.send(&VelocityCommand::stop())
    }

    fn quiet_report(&self) -> TickReport {
        TickReport {
            tick: self.ticks,
            state: self.state,
            status: None,
            fallback_applied: false,
            waypoint: self.pose.waypoint(),
            command: VelocityCommand::stop(),
            distance_to_goal: self.pose.distance_to_goal(),
        }
    }

    fn log_status(&self, distance_to_goal: f64) {
        let runner = self.pose.runner();
        let obstacle = self.pose.obstacle();
        tracing::info!(
            "Tick {}: runner=({:.2}, {:.2}, {:.1}°), obstacle=({:.2}, {:.2}), distance={:.2}, solver failures={}",
            self.ticks,
            runner.x,
            runner.y,
            runner.theta.to_degrees(),
            obstacle.x,
            obstacle.y,
            distance_to_goal,
            self.solver_failures
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::{OptimizerConfig, Solution, WaypointProblem};
    use crate::types::Point2D;
    use crossbeam_channel::{Sender, unbounded};

    struct Feeds {
        runner: Sender<Pose2D>,
        obstacle: Sender<Pose2D>,
    }

    fn fast_config() -> DhavakConfig {
        let mut config = DhavakConfig::default();
        config.control.rate_hz = 1000.0;
        config
    }

    fn setup(config: &DhavakConfig) -> (ControlLoop<Vec<VelocityCommand>>, Feeds) {
        let (runner, runner_rx) = unbounded();
        let (obstacle, obstacle_rx) = unbounded();
        let inputs = PoseInputs::new(runner_rx, obstacle_rx, config.control.max_updates_per_tick);
        (
            ControlLoop::new(config, inputs, Vec::new()).unwrap(),
            Feeds { runner, obstacle },
        )
    }

    /// Backend that always fails.
    struct FailingSolver;

    impl NlpSolver for FailingSolver {
        fn solve(&self, problem: &WaypointProblem) -> Solution {
            Solution {
                point: Point2D::new(problem.initial_guess.x + 1.0, problem.initial_guess.y),
                status: SolveStatus::IterationLimitReached,
                iterations: 20,
            }
        }
    }

    #[test]
    fn test_ticks_on_default_poses_before_any_update() {
        let config = fast_config();
        let (mut control, _feeds) = setup(&config);
        assert_eq!(control.state(), LoopState::Idle);

        // Runner and obstacle both at the origin: no feasible waypoint.
        let report = control.tick().unwrap();
        assert_eq!(report.tick, 1);
        assert_eq!(report.state, LoopState::Actuating);
        assert_eq!(report.status, Some(SolveStatus::Infeasible));
        assert!(report.fallback_applied);
        assert!(report.command.is_stop());
        assert_eq!(control.sink().len(), 1);
    }

    #[test]
    fn test_runner_update_alone_can_reach_goal() {
        let config = fast_config();
        let (mut control, feeds) = setup(&config);

        feeds.runner.send(Pose2D::new(9.8, 9.9, 0.0)).unwrap();
        let report = control.tick().unwrap();
        assert!(!control.pose_state().has_obstacle_fix());
        assert_eq!(report.status, Some(SolveStatus::Success));
        assert_eq!(report.state, LoopState::Terminated);

        let sent = control.sink();
        assert_eq!(sent.len(), 2);
        assert!(!sent[0].is_stop());
        assert!(sent[1].is_stop());
    }

    #[test]
    fn test_zero_rate_is_rejected() {
        let mut config = fast_config();
        config.control.rate_hz = 0.0;
        let (_runner, runner_rx) = unbounded::<Pose2D>();
        let (_obstacle, obstacle_rx) = unbounded::<Pose2D>();
        let inputs = PoseInputs::new(runner_rx, obstacle_rx, 8);

        let result = ControlLoop::new(&config, inputs, Vec::<VelocityCommand>::new());
        assert!(matches!(
            result,
            Err(DhavakError::InvalidConfiguration {
                field: "control.rate_hz",
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_optimizer_backend_config_is_rejected() {
        let config = fast_config();
        let (_runner, runner_rx) = unbounded::<Pose2D>();
        let (_obstacle, obstacle_rx) = unbounded::<Pose2D>();
        let inputs = PoseInputs::new(runner_rx, obstacle_rx, 8);
        let optimizer = WaypointOptimizer::with_solver(
            OptimizerConfig {
                trust_region_radius: 0.0,
                ..Default::default()
            },
            FailingSolver,
        );

        let result =
            ControlLoop::with_optimizer(&config, optimizer, inputs, Vec::<VelocityCommand>::new());
        assert!(matches!(
            result,
            Err(DhavakError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_scenario_far_obstacle_first_tick() {
        let config = fast_config();
        let (mut control, feeds) = setup(&config);
        feeds.runner.send(Pose2D::new(0.0, 0.0, 0.0)).unwrap();
        feeds.obstacle.send(Pose2D::at(100.0, 100.0)).unwrap();

        let report = control.tick().unwrap();
        assert_eq!(report.status, Some(SolveStatus::Success));
        assert!(!report.fallback_applied);
        assert!((report.waypoint.x - 0.2).abs() < 1e-5);
        assert!((report.waypoint.y - 0.2).abs() < 1e-5);
        assert!(report.command.linear_x() > 0.0);
        assert!(report.command.angular_z() > 0.0);
    }

    #[test]
    fn test_scenario_goal_reached_emits_zero_command() {
        let config = fast_config();
        let (mut control, feeds) = setup(&config);
        feeds.obstacle.send(Pose2D::at(0.0, 0.0)).unwrap();

        feeds.runner.send(Pose2D::new(9.6, 9.6, 0.0)).unwrap();
        let report = control.tick().unwrap();
        assert_eq!(report.state, LoopState::Actuating);
        assert!(report.distance_to_goal > 0.5);
        assert_eq!(control.sink().len(), 1);

        feeds.runner.send(Pose2D::new(9.7, 9.7, 0.0)).unwrap();
        let report = control.tick().unwrap();
        assert_eq!(report.state, LoopState::Terminated);
        assert!(report.distance_to_goal < 0.5);

        let sent = control.sink();
        assert_eq!(sent.len(), 3);
        assert!(!sent[1].is_stop());
        assert!(sent[2].is_stop());

        // Terminated loops send nothing more.
        feeds.runner.send(Pose2D::new(0.0, 0.0, 0.0)).unwrap();
        let report = control.tick().unwrap();
        assert_eq!(report.state, LoopState::Terminated);
        assert_eq!(control.sink().len(), 3);
    }

    #[test]
    fn test_scenario_obstacle_too_close_holds_position() {
        let config = fast_config();
        let (mut control, feeds) = setup(&config);
        feeds.runner.send(Pose2D::new(5.0, 5.0, 0.0)).unwrap();
        feeds.obstacle.send(Pose2D::at(5.1, 5.1)).unwrap();

        let report = control.tick().unwrap();
        assert_eq!(report.status, Some(SolveStatus::Infeasible));
        assert!(report.fallback_applied);
        assert_eq!(report.waypoint, Pose2D::at(5.0, 5.0));
        assert!(report.command.is_stop());
        assert_eq!(control.solver_failures(), 1);
        assert_eq!(report.state, LoopState::Actuating);
    }

    #[test]
    fn test_failures_are_counted_and_loop_continues() {
        let config = fast_config();
        let (runner, runner_rx) = unbounded();
        let (obstacle, obstacle_rx) = unbounded();
        let inputs = PoseInputs::new(runner_rx, obstacle_rx, 8);
        let optimizer = WaypointOptimizer::with_solver(OptimizerConfig::default(), FailingSolver);
        let mut control =
            ControlLoop::with_optimizer(&config, optimizer, inputs, Vec::<VelocityCommand>::new())
                .unwrap();

        runner.send(Pose2D::new(1.0, 1.0, 0.0)).unwrap();
        obstacle.send(Pose2D::at(50.0, 50.0)).unwrap();
        for _ in 0..3 {
            let report = control.tick().unwrap();
            assert_eq!(report.status, Some(SolveStatus::IterationLimitReached));
            assert_eq!(report.waypoint, Pose2D::at(1.0, 1.0));
        }
        assert_eq!(control.solver_failures(), 3);
        assert_eq!(control.ticks(), 3);
    }

    #[test]
    fn test_run_cancelled_sends_zero_command() {
        let config = fast_config();
        let (mut control, _feeds) = setup(&config);
        let running = AtomicBool::new(false);

        let summary = control.run(&running).unwrap();
        assert_eq!(summary.reason, StopReason::Cancelled);
        assert_eq!(summary.ticks, 0);
        assert_eq!(control.sink(), &vec![VelocityCommand::stop()]);
    }

    #[test]
    fn test_run_stops_at_tick_limit() {
        let mut config = fast_config();
        config.control.max_ticks = Some(3);
        let (mut control, feeds) = setup(&config);
        feeds.runner.send(Pose2D::new(0.0, 0.0, 0.0)).unwrap();
        feeds.obstacle.send(Pose2D::at(100.0, 100.0)).unwrap();

        let summary = control.run(&AtomicBool::new(true)).unwrap();
        assert_eq!(summary.reason, StopReason::TickLimit);
        assert_eq!(summary.ticks, 3);
        assert_eq!(control.sink().len(), 4);
        assert!(control.sink()[3].is_stop());
    }

    #[test]
    fn test_run_reaches_goal() {
        let config = fast_config();
        let (mut control, feeds) = setup(&config);
        feeds.runner.send(Pose2D::new(9.8, 9.9, 0.0)).unwrap();
        feeds.obstacle.send(Pose2D::at(0.0, 0.0)).unwrap();

        let summary = control.run(&AtomicBool::new(true)).unwrap();
        assert_eq!(summary.reason, StopReason::GoalReached);
        assert_eq!(summary.ticks, 1);
        assert_eq!(summary.solver_failures, 0);
    }

    #[test]
    fn test_closed_sink_terminates_with_error() {
        let config = fast_config();
        let (runner, runner_rx) = unbounded();
        let (obstacle, obstacle_rx) = unbounded();
        let (cmd_tx, cmd_rx) = unbounded::<VelocityCommand>();
        drop(cmd_rx);
        let inputs = PoseInputs::new(runner_rx, obstacle_rx, 8);
        let mut control = ControlLoop::new(&config, inputs, cmd_tx).unwrap();

        runner.send(Pose2D::new(0.0, 0.0, 0.0)).unwrap();
        obstacle.send(Pose2D::at(100.0, 100.0)).unwrap();

        let err = control.run(&AtomicBool::new(true)).unwrap_err();
        assert!(matches!(err, DhavakError::Channel(_)));
        assert_eq!(control.state(), LoopState::Terminated);
    }
}
