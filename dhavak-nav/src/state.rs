//! Pose state owned by the control loop.
//!
//! Holds the latest runner and obstacle poses, the fixed final goal, and the
//! waypoint chosen by the optimizer in the current tick. Pose updates reach
//! it through channels drained by the control loop, so every field has a
//! single writer and no locking is needed:
//! - Runner / obstacle poses: written only by [`PoseState::apply`] and the
//!   `update_*` calls
//! - Waypoint: written only by the optimizer

use crate::types::Pose2D;

/// Per-cycle pose state.
#[derive(Debug, Clone)]
pub struct PoseState {
    runner: Pose2D,
    obstacle: Pose2D,
    goal: Pose2D,
    waypoint: Pose2D,
    waypoint_set: bool,
    runner_fix: bool,
    obstacle_fix: bool,
}

impl PoseState {
    /// Create state with a fixed final goal.
    ///
    /// Runner and obstacle start at the origin until their first update.
    pub fn new(goal: Pose2D) -> Self {
        Self {
            runner: Pose2D::default(),
            obstacle: Pose2D::default(),
            goal,
            waypoint: Pose2D::default(),
            waypoint_set: false,
            runner_fix: false,
            obstacle_fix: false,
        }
    }

    /// Replace the runner pose.
    pub fn update_runner_pose(&mut self, pose: Pose2D) {
        self.runner = pose;
        self.runner_fix = true;
    }

    /// Replace the obstacle pose.
    pub fn update_obstacle_pose(&mut self, pose: Pose2D) {
        self.obstacle = pose;
        self.obstacle_fix = true;
    }

    /// Apply a tagged pose update.
    pub fn apply(&mut self, update: messages::PoseUpdate) {
        match update.source {
            messages::PoseSource::Runner => self.update_runner_pose(update.pose),
            messages::PoseSource::Obstacle => self.update_obstacle_pose(update.pose),
        }
    }

    pub fn runner(&self) -> Pose2D {
        self.runner
    }

    pub fn obstacle(&self) -> Pose2D {
        self.obstacle
    }

    pub fn goal(&self) -> Pose2D {
        self.goal
    }

    /// Waypoint chosen in the most recent optimizer run.
    pub fn waypoint(&self) -> Pose2D {
        self.waypoint
    }

    /// Store the waypoint. Only the optimizer calls this.
    pub(crate) fn set_waypoint(&mut self, waypoint: Pose2D) {
        self.waypoint = waypoint;
        self.waypoint_set = true;
    }

    /// Whether the optimizer has produced a waypoint yet.
    pub fn has_waypoint(&self) -> bool {
        self.waypoint_set
    }

    /// Whether at least one runner update has arrived.
    pub fn has_runner_fix(&self) -> bool {
        self.runner_fix
    }

    /// Whether at least one obstacle update has arrived.
    pub fn has_obstacle_fix(&self) -> bool {
        self.obstacle_fix
    }

    /// Distance from runner to final goal.
    pub fn distance_to_goal(&self) -> f64 {
        self.runner.distance(&self.goal)
    }
}

/// Message types for pose delivery.
pub mod messages {
    use super::*;

    /// Which agent a pose update describes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum PoseSource {
        Runner,
        Obstacle,
    }

    /// Pose update tagged with its source.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct PoseUpdate {
        pub source: PoseSource,
        pub pose: Pose2D,
    }

    impl PoseUpdate {
        pub fn runner(pose: Pose2D) -> Self {
            Self {
                source: PoseSource::Runner,
                pose,
            }
        }

        pub fn obstacle(pose: Pose2D) -> Self {
            Self {
                source: PoseSource::Obstacle,
                pose,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::messages::PoseUpdate;
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = PoseState::new(Pose2D::at(10.0, 10.0));
        assert_eq!(state.goal(), Pose2D::at(10.0, 10.0));
        assert_eq!(state.runner(), Pose2D::default());
        assert!(!state.has_runner_fix());
        assert!(!state.has_obstacle_fix());
    }

    #[test]
    fn test_updates_replace_whole_pose() {
        let mut state = PoseState::new(Pose2D::at(10.0, 10.0));
        state.update_runner_pose(Pose2D::new(1.0, 2.0, 0.5));
        state.update_runner_pose(Pose2D::new(3.0, 4.0, -1.0));
        assert_eq!(state.runner(), Pose2D::new(3.0, 4.0, -1.0));
        assert!(state.has_runner_fix());
        assert!(!state.has_obstacle_fix());
    }

    #[test]
    fn test_apply_routes_by_source() {
        let mut state = PoseState::new(Pose2D::at(10.0, 10.0));
        state.apply(PoseUpdate::obstacle(Pose2D::at(5.0, 6.0)));
        state.apply(PoseUpdate::runner(Pose2D::new(1.0, 1.0, 0.3)));
        assert_eq!(state.obstacle(), Pose2D::at(5.0, 6.0));
        assert_eq!(state.runner(), Pose2D::new(1.0, 1.0, 0.3));
        assert_eq!(state.goal(), Pose2D::at(10.0, 10.0));
    }

    #[test]
    fn test_no_validation_on_updates() {
        let mut state = PoseState::new(Pose2D::at(0.0, 0.0));
        state.update_runner_pose(Pose2D::new(-1e6, 1e6, 42.0));
        assert_eq!(state.runner().theta, 42.0);
    }
}
