//! Sequential quadratic programming backend.
//!
//! Each iteration linearizes the clearance constraint at the current iterate
//! and solves the resulting 2-variable QP with Clarabel:
//!
//! ```text
//! minimize   |x + d - target|²
//! subject to c(x) + ∇c(x)·d >= S          (linearized clearance)
//!            lower - x <= d <= upper - x   (trust-region box)
//! ```
//!
//! `c` is a squared distance and therefore convex, so its linearization never
//! overestimates it: every QP-feasible step lands on a point that satisfies
//! the true clearance constraint. Once an iterate is feasible the objective
//! decreases monotonically.
//!
//! When the QP is infeasible at the starting point, the solver restores
//! feasibility by jumping to the box corner farthest from the obstacle. If
//! even that corner violates clearance, no feasible point exists in the box.

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT::NonnegativeConeT,
};

use super::problem::{NlpSolver, Solution, SolveStatus, WaypointProblem};
use crate::types::Point2D;

/// Interior-point iteration cap for each QP subproblem.
const QP_MAX_ITER: u32 = 50;

/// Allowed clearance violation (squared units) in a reported success.
const FEASIBILITY_TOLERANCE: f64 = 1e-6;

/// Iteration settings for [`SqpSolver`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SqpSettings {
    /// Maximum number of QP subproblems per solve
    pub max_iterations: usize,
    /// Step size (infinity norm) below which the iterate is accepted
    pub tolerance: f64,
}

impl Default for SqpSettings {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            tolerance: 1e-6,
        }
    }
}

/// Result of one QP subproblem.
enum QpStep {
    Step { dx: f64, dy: f64 },
    Infeasible,
    Failed,
}

/// SQP solver for the waypoint problem.
#[derive(Clone, Debug, Default)]
pub struct SqpSolver {
    settings: SqpSettings,
}

impl SqpSolver {
    pub fn new(settings: SqpSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SqpSettings {
        &self.settings
    }

    /// Solve the linearized subproblem at `x`.
    fn subproblem(&self, problem: &WaypointProblem, x: Point2D) -> QpStep {
        let bounds = &problem.bounds;
        let slack = problem.clearance.slack(x);
        let (gx, gy) = problem.clearance.gradient(x);

        // Box limits on the step.
        let (lo_x, hi_x) = (bounds.lower.x - x.x, bounds.upper.x - x.x);
        let (lo_y, hi_y) = (bounds.lower.y - x.y, bounds.upper.y - x.y);

        // Best achievable increase of the linearized constraint over the box.
        // The maximum of a linear function over a box sits on a corner.
        let best_gain = (gx * lo_x).max(gx * hi_x) + (gy * lo_y).max(gy * hi_y);
        if slack + best_gain < 0.0 {
            return QpStep::Infeasible;
        }

        // ½ dᵀPd + qᵀd with P = 2I, q = 2(x - target)
        let (ox, oy) = problem.objective.gradient(x);
        let p = CscMatrix::new(2, 2, vec![0, 1, 2], vec![0, 1], vec![2.0, 2.0]);
        let q = [ox, oy];

        // A d + s = b, s >= 0
        //   row 0:  dx <= hi_x
        //   row 1: -dx <= -lo_x
        //   row 2:  dy <= hi_y
        //   row 3: -dy <= -lo_y
        //   row 4: -∇c·d <= slack
        let a = constraint_matrix(gx, gy);
        let b = [hi_x, -lo_x, hi_y, -lo_y, slack];
        let cones = [NonnegativeConeT(5)];

        let settings = match DefaultSettingsBuilder::<f64>::default()
            .max_iter(QP_MAX_ITER)
            .verbose(false)
            .build()
        {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("QP settings rejected: {}", e);
                return QpStep::Failed;
            }
        };

        let mut solver = match DefaultSolver::new(&p, &q, &a, &b, &cones, settings) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("QP setup failed: {:?}", e);
                return QpStep::Failed;
            }
        };
        solver.solve();

        let sol = &solver.solution;
        match &sol.status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => QpStep::Step {
                dx: sol.x[0],
                dy: sol.x[1],
            },
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                QpStep::Infeasible
            }
            other => {
                tracing::debug!("QP subproblem ended with {:?}", other);
                QpStep::Failed
            }
        }
    }
}

impl NlpSolver for SqpSolver {
    fn solve(&self, problem: &WaypointProblem) -> Solution {
        let bounds = &problem.bounds;
        let clearance = &problem.clearance;

        let mut x = bounds.clamp(problem.initial_guess);
        let mut restored = false;

        for iteration in 1..=self.settings.max_iterations {
            match self.subproblem(problem, x) {
                QpStep::Step { dx, dy } => {
                    let next = bounds.clamp(Point2D::new(x.x + dx, x.y + dy));
                    let step = (next.x - x.x).abs().max((next.y - x.y).abs());
                    x = next;

                    if step <= self.settings.tolerance {
                        let status = if clearance.is_satisfied(x, FEASIBILITY_TOLERANCE) {
                            SolveStatus::Success
                        } else {
                            SolveStatus::NumericalError
                        };
                        return Solution {
                            point: x,
                            status,
                            iterations: iteration,
                        };
                    }
                }
                QpStep::Infeasible if !restored => {
                    let corner = bounds.farthest_corner_from(clearance.center);
                    if !clearance.is_satisfied(corner, 0.0) {
                        return Solution {
                            point: x,
                            status: SolveStatus::Infeasible,
                            iterations: iteration,
                        };
                    }
                    tracing::debug!(
                        "Linearized clearance infeasible at ({:.3}, {:.3}), restarting from corner ({:.3}, {:.3})",
                        x.x,
                        x.y,
                        corner.x,
                        corner.y
                    );
                    x = corner;
                    restored = true;
                }
                QpStep::Infeasible | QpStep::Failed => {
                    return Solution {
                        point: x,
                        status: SolveStatus::NumericalError,
                        iterations: iteration,
                    };
                }
            }
        }

        Solution {
            point: x,
            status: SolveStatus::IterationLimitReached,
            iterations: self.settings.max_iterations,
        }
    }
}

/// Constraint matrix for the subproblem in CSC form, skipping zero gradient
/// entries.
fn constraint_matrix(gx: f64, gy: f64) -> CscMatrix<f64> {
    let mut colptr = vec![0usize; 3];
    let mut rowval = Vec::with_capacity(6);
    let mut nzval = Vec::with_capacity(6);

    for (col, g) in [gx, gy].into_iter().enumerate() {
        let base = 2 * col;
        rowval.push(base);
        nzval.push(1.0);
        rowval.push(base + 1);
        nzval.push(-1.0);
        if g.abs() > 1e-15 {
            rowval.push(4);
            nzval.push(-g);
        }
        colptr[col + 1] = rowval.len();
    }

    CscMatrix::new(5, 2, colptr, rowval, nzval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Pose2D;
    use approx::assert_relative_eq;

    fn problem(runner: (f64, f64), obstacle: (f64, f64), goal: (f64, f64)) -> WaypointProblem {
        WaypointProblem::from_poses(
            &Pose2D::at(runner.0, runner.1),
            &Pose2D::at(obstacle.0, obstacle.1),
            &Pose2D::at(goal.0, goal.1),
            0.2,
            2.0,
        )
    }

    #[test]
    fn test_far_obstacle_moves_to_box_corner() {
        let solver = SqpSolver::default();
        let sol = solver.solve(&problem((0.0, 0.0), (100.0, 100.0), (10.0, 10.0)));

        assert_eq!(sol.status, SolveStatus::Success);
        assert_relative_eq!(sol.point.x, 0.2, epsilon = 1e-5);
        assert_relative_eq!(sol.point.y, 0.2, epsilon = 1e-5);
    }

    #[test]
    fn test_goal_inside_box_is_reached() {
        let solver = SqpSolver::default();
        let sol = solver.solve(&problem((9.9, 9.95), (0.0, 0.0), (10.0, 10.0)));

        assert_eq!(sol.status, SolveStatus::Success);
        assert_relative_eq!(sol.point.x, 10.0, epsilon = 1e-5);
        assert_relative_eq!(sol.point.y, 10.0, epsilon = 1e-5);
    }

    #[test]
    fn test_active_clearance_stops_on_circle() {
        // Goal straight through the obstacle; the best point sits on the
        // clearance circle at y = 0.
        let solver = SqpSolver::default();
        let p = problem((0.0, 0.0), (1.5, 0.0), (10.0, 0.0));
        let sol = solver.solve(&p);

        assert_eq!(sol.status, SolveStatus::Success);
        assert_relative_eq!(sol.point.x, 1.5 - 2.0_f64.sqrt(), epsilon = 1e-4);
        assert_relative_eq!(sol.point.y, 0.0, epsilon = 1e-4);
        assert!(p.clearance.value(sol.point) >= 2.0 - 1e-6);
    }

    #[test]
    fn test_infeasible_start_recovers_inside_box() {
        // Runner starts just inside the clearance circle but the box reaches out.
        let solver = SqpSolver::default();
        let p = problem((0.0, 0.0), (1.3, 0.0), (-10.0, 0.0));
        assert!(!p.clearance.is_satisfied(p.initial_guess, 0.0));

        let sol = solver.solve(&p);
        assert_eq!(sol.status, SolveStatus::Success);
        assert!(p.clearance.value(sol.point) >= 2.0 - 1e-6);
        assert!(p.bounds.contains(sol.point));
        assert_relative_eq!(sol.point.x, -0.2, epsilon = 1e-5);
    }

    #[test]
    fn test_obstacle_too_close_is_infeasible() {
        let solver = SqpSolver::default();
        let sol = solver.solve(&problem((5.0, 5.0), (5.1, 5.1), (10.0, 10.0)));
        assert_eq!(sol.status, SolveStatus::Infeasible);
    }

    #[test]
    fn test_coincident_obstacle_is_infeasible() {
        let solver = SqpSolver::default();
        let sol = solver.solve(&problem((3.0, 3.0), (3.0, 3.0), (10.0, 10.0)));
        assert_eq!(sol.status, SolveStatus::Infeasible);
        assert_eq!(sol.point, Point2D::new(3.0, 3.0));
    }

    #[test]
    fn test_iteration_cap_is_reported() {
        let solver = SqpSolver::new(SqpSettings {
            max_iterations: 1,
            tolerance: 1e-9,
        });
        let sol = solver.solve(&problem((0.0, 0.0), (100.0, 100.0), (10.0, 10.0)));
        assert_eq!(sol.status, SolveStatus::IterationLimitReached);
        assert_eq!(sol.iterations, 1);
    }

    #[test]
    fn test_solve_is_deterministic() {
        let solver = SqpSolver::default();
        let p = problem((0.0, 0.0), (1.5, 0.3), (10.0, 0.0));
        let first = solver.solve(&p);
        let second = solver.solve(&p);
        assert_eq!(first, second);
    }

    #[test]
    fn test_constraint_matrix_skips_zero_gradient() {
        let a = constraint_matrix(0.0, -3.0);
        assert_eq!(a.colptr, vec![0, 2, 5]);
        assert_eq!(a.rowval, vec![0, 1, 2, 3, 4]);
        assert_eq!(a.nzval, vec![1.0, -1.0, 1.0, -1.0, 3.0]);
    }
}
