//! Simulated turtle world.
//!
//! Stands in for the pose transport and the actuator: the runner follows the
//! velocity commands it receives with unicycle kinematics, and the obstacle
//! moves along a scripted path.

mod physics;

pub use physics::UnicycleState;

use crossbeam_channel::{Sender, TrySendError};
use serde::Deserialize;

use crate::config::positive;
use crate::error::{DhavakError, Result};
use crate::types::{Pose2D, VelocityCommand};

/// Scripted obstacle motion.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObstacleMotion {
    /// Stay at the start pose
    #[default]
    Stationary,
    /// Constant velocity in world frame
    Linear { vx: f64, vy: f64 },
    /// Counter-clockwise orbit around the start position
    Circle { radius: f64, angular_speed: f64 },
}

impl ObstacleMotion {
    /// Obstacle pose `t` seconds after the start.
    pub fn pose_at(&self, start: &Pose2D, t: f64) -> Pose2D {
        match *self {
            ObstacleMotion::Stationary => *start,
            ObstacleMotion::Linear { vx, vy } => {
                Pose2D::new(start.x + vx * t, start.y + vy * t, vy.atan2(vx))
            }
            ObstacleMotion::Circle {
                radius,
                angular_speed,
            } => {
                let phase = angular_speed * t;
                Pose2D::new(
                    start.x + radius * phase.cos(),
                    start.y + radius * phase.sin(),
                    phase + angular_speed.signum() * std::f64::consts::FRAC_PI_2,
                )
            }
        }
    }
}

/// Simulation configuration
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_runner_start")]
    pub runner_start: Pose2D,
    /// Start pose of the obstacle (orbit center for circular motion)
    #[serde(default = "default_obstacle_start")]
    pub obstacle_start: Pose2D,
    #[serde(default)]
    pub obstacle_motion: ObstacleMotion,
    /// Integration and publish rate (Hz)
    #[serde(default = "default_physics_rate_hz")]
    pub physics_rate_hz: f64,
    /// Linear speed limit (m/s)
    #[serde(default = "default_max_linear_speed")]
    pub max_linear_speed: f64,
    /// Angular speed limit (rad/s)
    #[serde(default = "default_max_angular_speed")]
    pub max_angular_speed: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            runner_start: default_runner_start(),
            obstacle_start: default_obstacle_start(),
            obstacle_motion: ObstacleMotion::default(),
            physics_rate_hz: default_physics_rate_hz(),
            max_linear_speed: default_max_linear_speed(),
            max_angular_speed: default_max_angular_speed(),
        }
    }
}

// Default value functions
fn default_runner_start() -> Pose2D {
    Pose2D::new(1.0, 2.0, 0.0)
}
fn default_obstacle_start() -> Pose2D {
    Pose2D::at(5.544445, 5.544445)
}
fn default_physics_rate_hz() -> f64 {
    50.0
}
fn default_max_linear_speed() -> f64 {
    2.0
}
fn default_max_angular_speed() -> f64 {
    4.0
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        positive("simulation.physics_rate_hz", self.physics_rate_hz)?;
        positive("simulation.max_linear_speed", self.max_linear_speed)?;
        positive("simulation.max_angular_speed", self.max_angular_speed)?;
        if let ObstacleMotion::Circle { radius, .. } = self.obstacle_motion
            && !(radius >= 0.0 && radius.is_finite())
        {
            return Err(DhavakError::invalid(
                "simulation.obstacle_motion.radius",
                radius,
                "must be non-negative",
            ));
        }
        Ok(())
    }

    /// Fixed integration step in seconds.
    pub fn time_step(&self) -> f64 {
        1.0 / self.physics_rate_hz
    }
}

/// Runner, obstacle and the command currently applied to the runner.
pub struct TurtleWorld {
    config: SimulationConfig,
    runner: UnicycleState,
    obstacle: Pose2D,
    command: VelocityCommand,
    elapsed: f64,
}

impl TurtleWorld {
    pub fn new(config: SimulationConfig) -> Self {
        let runner = UnicycleState::new(config.runner_start);
        let obstacle = config.obstacle_start;
        Self {
            config,
            runner,
            obstacle,
            command: VelocityCommand::stop(),
            elapsed: 0.0,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn runner(&self) -> Pose2D {
        self.runner.pose()
    }

    pub fn obstacle(&self) -> Pose2D {
        self.obstacle
    }

    pub fn command(&self) -> VelocityCommand {
        self.command
    }

    /// Seconds simulated so far.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Replace the command applied to the runner.
    pub fn set_command(&mut self, command: VelocityCommand) {
        self.command = command;
    }

    /// Integrate one step of `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        self.runner.update(
            dt,
            self.command.linear_x(),
            self.command.angular_z(),
            self.config.max_linear_speed,
            self.config.max_angular_speed,
        );
        self.elapsed += dt;
        self.obstacle = self
            .config
            .obstacle_motion
            .pose_at(&self.config.obstacle_start, self.elapsed);
    }

    /// Advance `duration` seconds in fixed physics steps.
    pub fn advance(&mut self, duration: f64) {
        let dt = self.config.time_step();
        let mut remaining = duration;
        while remaining > 1e-12 {
            let h = remaining.min(dt);
            self.step(h);
            remaining -= h;
        }
    }

    /// Publish both poses without blocking.
    ///
    /// A full channel drops the sample; a closed channel is an error.
    pub fn publish(&self, runner_tx: &Sender<Pose2D>, obstacle_tx: &Sender<Pose2D>) -> Result<()> {
        for (name, tx, pose) in [
            ("runner", runner_tx, self.runner()),
            ("obstacle", obstacle_tx, self.obstacle),
        ] {
            match tx.try_send(pose) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::trace!("{} pose channel full, sample dropped", name);
                }
                Err(TrySendError::Disconnected(_)) => {
                    return Err(DhavakError::Channel(format!("{} pose receiver disconnected", name)));
                }
            }
        }
        Ok(())
    }
}
