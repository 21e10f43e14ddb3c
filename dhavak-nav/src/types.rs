//! Pose, point and velocity types shared across the crate.

use serde::Deserialize;

/// A 2D point in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    /// Create a new point.
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared distance to another point (avoids sqrt).
    #[inline]
    pub fn distance_squared(&self, other: &Point2D) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Distance to another point.
    #[inline]
    pub fn distance(&self, other: &Point2D) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

/// Planar pose: position plus heading in radians.
///
/// Heading is only meaningful for the runner. Values are stored exactly as
/// received; no normalization is applied.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Pose2D {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub theta: f64,
}

impl Pose2D {
    /// Create a new pose.
    #[inline]
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self { x, y, theta }
    }

    /// Pose at a position with zero heading.
    #[inline]
    pub fn at(x: f64, y: f64) -> Self {
        Self { x, y, theta: 0.0 }
    }

    /// Position component.
    #[inline]
    pub fn position(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }

    /// Euclidean distance between the positions of two poses.
    #[inline]
    pub fn distance(&self, other: &Pose2D) -> f64 {
        self.position().distance(&other.position())
    }
}

impl From<Point2D> for Pose2D {
    fn from(p: Point2D) -> Self {
        Pose2D::at(p.x, p.y)
    }
}

/// Three-component vector used by [`VelocityCommand`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Velocity command sent to the actuation sink.
///
/// Planar: only `linear.x` and `angular.z` are ever non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VelocityCommand {
    pub linear: Vector3,
    pub angular: Vector3,
}

impl VelocityCommand {
    /// Planar command from forward speed and yaw rate.
    pub fn planar(linear: f64, angular: f64) -> Self {
        Self {
            linear: Vector3 {
                x: linear,
                ..Default::default()
            },
            angular: Vector3 {
                z: angular,
                ..Default::default()
            },
        }
    }

    /// All-zero stop command.
    pub fn stop() -> Self {
        Self::default()
    }

    /// Forward speed.
    #[inline]
    pub fn linear_x(&self) -> f64 {
        self.linear.x
    }

    /// Yaw rate.
    #[inline]
    pub fn angular_z(&self) -> f64 {
        self.angular.z
    }

    /// True for the zero command.
    pub fn is_stop(&self) -> bool {
        *self == Self::stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_point_distance() {
        let a = Point2D::new(0.0, 0.0);
        let b = Point2D::new(3.0, 4.0);
        assert_relative_eq!(a.distance(&b), 5.0);
        assert_relative_eq!(a.distance_squared(&b), 25.0);
    }

    #[test]
    fn test_planar_command_layout() {
        let cmd = VelocityCommand::planar(1.5, -0.25);
        assert_eq!(cmd.linear, Vector3 { x: 1.5, y: 0.0, z: 0.0 });
        assert_eq!(cmd.angular, Vector3 { x: 0.0, y: 0.0, z: -0.25 });
        assert!(!cmd.is_stop());
        assert!(VelocityCommand::stop().is_stop());
    }
}
