//! Steering and velocity controller.
//!
//! Converts the runner pose and this tick's waypoint into a planar velocity
//! command:
//! - angular: proportional to the heading error toward the waypoint
//! - linear: feed-forward speed that would close the gap to the waypoint in
//!   exactly one control period

use serde::Deserialize;

use crate::config::positive;
use crate::error::{DhavakError, Result};
use crate::types::{Pose2D, VelocityCommand};
use crate::utils::normalize_angle;

/// Below this separation the bearing to the waypoint is undefined.
const COINCIDENT_EPSILON: f64 = 1e-9;

/// How the heading error is formed before applying the gain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadingErrorPolicy {
    /// Wrap `steering - theta` into (-π, π]
    #[default]
    Wrapped,
    /// Use `steering - theta` as is (legacy; can reach 2π · gain)
    Raw,
}

/// Configuration for the steering controller.
#[derive(Clone, Debug, PartialEq)]
pub struct SteeringConfig {
    /// Proportional gain on heading error
    pub gain: f64,
    /// Control loop rate (Hz), used for the feed-forward speed
    pub rate_hz: f64,
    pub heading_error: HeadingErrorPolicy,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            gain: 1.0,
            rate_hz: 5.0,
            heading_error: HeadingErrorPolicy::Wrapped,
        }
    }
}

impl SteeringConfig {
    /// Reject a non-positive rate and a non-finite gain.
    pub fn validate(&self) -> Result<()> {
        positive("control.rate_hz", self.rate_hz)?;
        if !self.gain.is_finite() {
            return Err(DhavakError::invalid("control.gain", self.gain, "must be finite"));
        }
        Ok(())
    }
}

/// Bearing from `from` to `to`, in (-π, π].
#[inline]
pub fn steering_angle(from: &Pose2D, to: &Pose2D) -> f64 {
    (to.y - from.y).atan2(to.x - from.x)
}

/// Proportional steering controller.
#[derive(Clone, Debug)]
pub struct SteeringController {
    config: SteeringConfig,
}

impl SteeringController {
    pub fn new(config: SteeringConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SteeringConfig {
        &self.config
    }

    /// Heading error toward the waypoint under the configured policy.
    ///
    /// A waypoint on top of the runner has no bearing; the error is zero.
    pub fn heading_error(&self, runner: &Pose2D, waypoint: &Pose2D) -> f64 {
        if runner.distance(waypoint) < COINCIDENT_EPSILON {
            return 0.0;
        }
        let raw = steering_angle(runner, waypoint) - runner.theta;
        match self.config.heading_error {
            HeadingErrorPolicy::Wrapped => normalize_angle(raw),
            HeadingErrorPolicy::Raw => raw,
        }
    }

    pub fn angular_velocity(&self, runner: &Pose2D, waypoint: &Pose2D) -> f64 {
        self.config.gain * self.heading_error(runner, waypoint)
    }

    pub fn linear_velocity(&self, runner: &Pose2D, waypoint: &Pose2D) -> f64 {
        runner.distance(waypoint) * self.config.rate_hz
    }

    /// Compute the velocity command for this tick.
    pub fn compute_command(&self, runner: &Pose2D, waypoint: &Pose2D) -> VelocityCommand {
        let linear = self.linear_velocity(runner, waypoint);
        let angular = self.angular_velocity(runner, waypoint);

        tracing::debug!(
            "steer: runner=({:.3},{:.3},{:.1}°) waypoint=({:.3},{:.3}) vel=({:.3},{:.3})",
            runner.x,
            runner.y,
            runner.theta.to_degrees(),
            waypoint.x,
            waypoint.y,
            linear,
            angular
        );

        VelocityCommand::planar(linear, angular)
    }
}
