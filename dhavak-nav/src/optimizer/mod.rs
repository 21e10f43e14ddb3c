//! Local waypoint optimizer.
//!
//! Once per tick, picks the point inside the runner's trust region that is
//! closest to the final goal while keeping the configured clearance from the
//! obstacle. The NLP itself is solved by an [`NlpSolver`] backend; this module
//! owns the problem formulation and the policy applied when a solve fails.

mod problem;
mod sqp;

pub use problem::{
    Bounds, Clearance, NlpSolver, Objective, Solution, SolveStatus, WaypointProblem,
};
pub use sqp::{SqpSettings, SqpSolver};

use serde::Deserialize;

use crate::error::{DhavakError, Result};
use crate::state::PoseState;
use crate::types::{Point2D, Pose2D};

/// What to do with the waypoint when the solver does not report success.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Use the solver's candidate anyway (legacy behavior)
    AdoptCandidate,
    /// Keep the waypoint from the last tick
    HoldPrevious,
    /// Hold at the trust-region center (the runner's current position)
    #[default]
    HoldPosition,
}

/// Optimizer configuration
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct OptimizerConfig {
    /// Half-width of the per-axis trust-region box (default: 0.2)
    #[serde(default = "default_trust_region_radius")]
    pub trust_region_radius: f64,
    /// Minimum squared distance between waypoint and obstacle (default: 2.0)
    #[serde(default = "default_min_safe_distance_squared")]
    pub min_safe_distance_squared: f64,
    /// Solver iteration cap (default: 20)
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// First-order optimality tolerance (default: 1e-6)
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Fallback applied on non-success (default: hold_position)
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            trust_region_radius: default_trust_region_radius(),
            min_safe_distance_squared: default_min_safe_distance_squared(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

// Default value functions
fn default_trust_region_radius() -> f64 {
    0.2
}
fn default_min_safe_distance_squared() -> f64 {
    2.0
}
fn default_max_iterations() -> usize {
    20
}
fn default_tolerance() -> f64 {
    1e-6
}

impl OptimizerConfig {
    /// Reject non-positive geometric and solver parameters.
    pub fn validate(&self) -> Result<()> {
        if !(self.trust_region_radius > 0.0 && self.trust_region_radius.is_finite()) {
            return Err(DhavakError::invalid(
                "optimizer.trust_region_radius",
                self.trust_region_radius,
                "must be positive",
            ));
        }
        if !(self.min_safe_distance_squared > 0.0 && self.min_safe_distance_squared.is_finite()) {
            return Err(DhavakError::invalid(
                "optimizer.min_safe_distance_squared",
                self.min_safe_distance_squared,
                "must be positive",
            ));
        }
        if !(self.tolerance > 0.0 && self.tolerance.is_finite()) {
            return Err(DhavakError::invalid(
                "optimizer.tolerance",
                self.tolerance,
                "must be positive",
            ));
        }
        if self.max_iterations == 0 {
            return Err(DhavakError::invalid(
                "optimizer.max_iterations",
                self.max_iterations,
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Solver settings derived from this configuration.
    pub fn sqp_settings(&self) -> SqpSettings {
        SqpSettings {
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
        }
    }
}

/// Result of one optimizer run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OptimizerOutcome {
    /// Waypoint written to the pose state
    pub waypoint: Pose2D,
    /// Point the solver returned (may differ from the waypoint on failure)
    pub candidate: Point2D,
    pub status: SolveStatus,
    pub iterations: usize,
    /// True when the failure policy replaced the candidate
    pub fallback_applied: bool,
}

/// Per-tick waypoint optimizer.
pub struct WaypointOptimizer<S: NlpSolver = SqpSolver> {
    config: OptimizerConfig,
    solver: S,
}

impl WaypointOptimizer<SqpSolver> {
    /// Create an optimizer backed by the SQP solver.
    pub fn new(config: OptimizerConfig) -> Self {
        let solver = SqpSolver::new(config.sqp_settings());
        Self { config, solver }
    }
}

impl<S: NlpSolver> WaypointOptimizer<S> {
    /// Create an optimizer with a custom backend.
    pub fn with_solver(config: OptimizerConfig, solver: S) -> Self {
        Self { config, solver }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Build this tick's problem from the pose state.
    pub fn problem(&self, state: &PoseState) -> WaypointProblem {
        WaypointProblem::from_poses(
            &state.runner(),
            &state.obstacle(),
            &state.goal(),
            self.config.trust_region_radius,
            self.config.min_safe_distance_squared,
        )
    }

    /// Solve without touching the state.
    pub fn solve(&self, state: &PoseState) -> Solution {
        self.solver.solve(&self.problem(state))
    }

    /// Solve, apply the failure policy, and store the resulting waypoint.
    pub fn refresh(&self, state: &mut PoseState) -> OptimizerOutcome {
        let solution = self.solve(state);

        let (waypoint, fallback_applied) = if solution.status.is_success() {
            (Pose2D::from(solution.point), false)
        } else {
            match self.config.failure_policy {
                FailurePolicy::AdoptCandidate => (Pose2D::from(solution.point), false),
                FailurePolicy::HoldPrevious if state.has_waypoint() => (state.waypoint(), true),
                FailurePolicy::HoldPrevious | FailurePolicy::HoldPosition => {
                    let runner = state.runner();
                    (Pose2D::at(runner.x, runner.y), true)
                }
            }
        };

        state.set_waypoint(waypoint);

        OptimizerOutcome {
            waypoint,
            candidate: solution.point,
            status: solution.status,
            iterations: solution.iterations,
            fallback_applied,
        }
    }
}
