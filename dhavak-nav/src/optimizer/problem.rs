//! Waypoint problem description and the solver interface.
//!
//! ```text
//! minimize   |p - target|²
//! subject to |p - center|² >= min_distance_squared
//!            lower <= p <= upper          (per axis)
//! ```

use std::fmt;

use crate::types::{Point2D, Pose2D};

/// Squared distance to a target point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Objective {
    pub target: Point2D,
}

impl Objective {
    #[inline]
    pub fn value(&self, p: Point2D) -> f64 {
        p.distance_squared(&self.target)
    }

    #[inline]
    pub fn gradient(&self, p: Point2D) -> (f64, f64) {
        (2.0 * (p.x - self.target.x), 2.0 * (p.y - self.target.y))
    }
}

/// Clearance constraint: squared distance to `center` must reach the threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clearance {
    pub center: Point2D,
    pub min_distance_squared: f64,
}

impl Clearance {
    /// Constraint function value (squared distance to the center).
    #[inline]
    pub fn value(&self, p: Point2D) -> f64 {
        p.distance_squared(&self.center)
    }

    #[inline]
    pub fn gradient(&self, p: Point2D) -> (f64, f64) {
        (2.0 * (p.x - self.center.x), 2.0 * (p.y - self.center.y))
    }

    /// Signed slack; negative when violated.
    #[inline]
    pub fn slack(&self, p: Point2D) -> f64 {
        self.value(p) - self.min_distance_squared
    }

    #[inline]
    pub fn is_satisfied(&self, p: Point2D, tolerance: f64) -> bool {
        self.slack(p) >= -tolerance
    }
}

/// Axis-aligned variable bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub lower: Point2D,
    pub upper: Point2D,
}

impl Bounds {
    /// Box of half-width `half_width` centered on `center`.
    pub fn around(center: Point2D, half_width: f64) -> Self {
        Self {
            lower: Point2D::new(center.x - half_width, center.y - half_width),
            upper: Point2D::new(center.x + half_width, center.y + half_width),
        }
    }

    pub fn center(&self) -> Point2D {
        Point2D::new(
            0.5 * (self.lower.x + self.upper.x),
            0.5 * (self.lower.y + self.upper.y),
        )
    }

    pub fn contains(&self, p: Point2D) -> bool {
        p.x >= self.lower.x && p.x <= self.upper.x && p.y >= self.lower.y && p.y <= self.upper.y
    }

    pub fn clamp(&self, p: Point2D) -> Point2D {
        Point2D::new(
            p.x.clamp(self.lower.x, self.upper.x),
            p.y.clamp(self.lower.y, self.upper.y),
        )
    }

    /// Box corner farthest from `p`.
    ///
    /// The squared distance is separable and convex per axis, so this corner
    /// maximizes the distance to `p` over the whole box.
    pub fn farthest_corner_from(&self, p: Point2D) -> Point2D {
        let pick = |lo: f64, hi: f64, v: f64| {
            if (lo - v).abs() >= (hi - v).abs() {
                lo
            } else {
                hi
            }
        };
        Point2D::new(
            pick(self.lower.x, self.upper.x, p.x),
            pick(self.lower.y, self.upper.y, p.y),
        )
    }
}

/// One cycle's optimization problem. Built fresh each tick, never retained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaypointProblem {
    pub objective: Objective,
    pub clearance: Clearance,
    pub bounds: Bounds,
    pub initial_guess: Point2D,
}

impl WaypointProblem {
    /// Build the problem for a runner heading to `goal` past `obstacle`.
    ///
    /// The trust region is centered on the runner, which is also the initial
    /// guess.
    pub fn from_poses(
        runner: &Pose2D,
        obstacle: &Pose2D,
        goal: &Pose2D,
        trust_region_radius: f64,
        min_distance_squared: f64,
    ) -> Self {
        let start = runner.position();
        Self {
            objective: Objective {
                target: goal.position(),
            },
            clearance: Clearance {
                center: obstacle.position(),
                min_distance_squared,
            },
            bounds: Bounds::around(start, trust_region_radius),
            initial_guess: start,
        }
    }
}

/// Outcome class of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Success,
    Infeasible,
    IterationLimitReached,
    NumericalError,
}

impl SolveStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, SolveStatus::Success)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SolveStatus::Success => "success",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::IterationLimitReached => "iteration limit reached",
            SolveStatus::NumericalError => "numerical error",
        };
        f.write_str(s)
    }
}

/// Candidate point and status returned by a solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Solution {
    pub point: Point2D,
    pub status: SolveStatus,
    pub iterations: usize,
}

/// Constrained NLP backend.
///
/// Implementations must be deterministic: identical problems give identical
/// solutions.
pub trait NlpSolver {
    fn solve(&self, problem: &WaypointProblem) -> Solution;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bounds_follow_runner_on_both_axes() {
        let problem = WaypointProblem::from_poses(
            &Pose2D::new(1.0, 5.0, 0.0),
            &Pose2D::at(100.0, 100.0),
            &Pose2D::at(10.0, 10.0),
            0.2,
            2.0,
        );
        assert_relative_eq!(problem.bounds.lower.x, 0.8);
        assert_relative_eq!(problem.bounds.upper.x, 1.2);
        assert_relative_eq!(problem.bounds.lower.y, 4.8);
        assert_relative_eq!(problem.bounds.upper.y, 5.2);
        assert_eq!(problem.initial_guess, Point2D::new(1.0, 5.0));
    }

    #[test]
    fn test_farthest_corner() {
        let bounds = Bounds::around(Point2D::new(5.0, 5.0), 0.2);
        let corner = bounds.farthest_corner_from(Point2D::new(5.1, 4.9));
        assert_relative_eq!(corner.x, 4.8);
        assert_relative_eq!(corner.y, 5.2);
    }

    #[test]
    fn test_clearance_slack_sign() {
        let clearance = Clearance {
            center: Point2D::new(0.0, 0.0),
            min_distance_squared: 2.0,
        };
        assert!(clearance.is_satisfied(Point2D::new(2.0, 0.0), 0.0));
        assert!(!clearance.is_satisfied(Point2D::new(1.0, 0.0), 0.0));
        assert_relative_eq!(clearance.slack(Point2D::new(1.0, 1.0)), 0.0);
    }

    #[test]
    fn test_clamp_and_contains() {
        let bounds = Bounds::around(Point2D::new(0.0, 0.0), 0.2);
        let p = bounds.clamp(Point2D::new(10.0, -10.0));
        assert_relative_eq!(p.x, 0.2);
        assert_relative_eq!(p.y, -0.2);
        assert!(bounds.contains(p));
        assert!(!bounds.contains(Point2D::new(0.3, 0.0)));
        assert_eq!(bounds.center(), Point2D::new(0.0, 0.0));
    }
}
