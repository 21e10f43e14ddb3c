//! Unicycle kinematics for the simulated runner.

use crate::types::Pose2D;

/// Runner physics state.
///
/// Heading is integrated without wrapping; consumers must not assume a range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UnicycleState {
    x: f64,
    y: f64,
    theta: f64,
}

impl UnicycleState {
    pub fn new(pose: Pose2D) -> Self {
        Self {
            x: pose.x,
            y: pose.y,
            theta: pose.theta,
        }
    }

    #[inline]
    pub fn pose(&self) -> Pose2D {
        Pose2D::new(self.x, self.y, self.theta)
    }

    /// Advance by `dt` seconds under a (v, ω) command clamped to the limits.
    pub fn update(
        &mut self,
        dt: f64,
        linear_vel: f64,
        angular_vel: f64,
        max_linear_speed: f64,
        max_angular_speed: f64,
    ) {
        let linear_vel = linear_vel.clamp(-max_linear_speed, max_linear_speed);
        let angular_vel = angular_vel.clamp(-max_angular_speed, max_angular_speed);

        if angular_vel.abs() < 1e-9 {
            // Straight line motion
            self.x += linear_vel * self.theta.cos() * dt;
            self.y += linear_vel * self.theta.sin() * dt;
        } else {
            // Arc motion
            let r = linear_vel / angular_vel;
            let new_theta = self.theta + angular_vel * dt;
            self.x += r * (new_theta.sin() - self.theta.sin());
            self.y += r * (self.theta.cos() - new_theta.cos());
            self.theta = new_theta;
        }
    }
}
