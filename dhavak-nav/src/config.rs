//! Configuration loading for DhavakNav

use crate::controller::{HeadingErrorPolicy, SteeringConfig};
use crate::error::{DhavakError, Result};
use crate::optimizer::OptimizerConfig;
use crate::sim::SimulationConfig;
use crate::types::Pose2D;
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DhavakConfig {
    #[serde(default)]
    pub goal: GoalConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Final goal position
#[derive(Clone, Debug, Deserialize)]
pub struct GoalConfig {
    #[serde(default = "default_goal_coordinate")]
    pub x: f64,
    #[serde(default = "default_goal_coordinate")]
    pub y: f64,
}

/// Control loop settings
#[derive(Clone, Debug, Deserialize)]
pub struct ControlConfig {
    /// Tick rate in Hz (default: 5.0)
    #[serde(default = "default_rate_hz")]
    pub rate_hz: f64,

    /// Distance to goal that ends the run (default: 0.5)
    #[serde(default = "default_goal_tolerance")]
    pub goal_tolerance: f64,

    /// Proportional gain on heading error (default: 1.0)
    #[serde(default = "default_gain")]
    pub gain: f64,

    /// Heading error policy: "wrapped" or "raw" (default: wrapped)
    #[serde(default)]
    pub heading_error: HeadingErrorPolicy,

    /// Pose updates applied per source per tick (default: 64)
    #[serde(default = "default_max_updates_per_tick")]
    pub max_updates_per_tick: usize,

    /// Ticks between status log lines (default: 10)
    #[serde(default = "default_status_interval_ticks")]
    pub status_interval_ticks: u64,

    /// Optional hard cap on the number of ticks
    #[serde(default)]
    pub max_ticks: Option<u64>,
}

impl Default for GoalConfig {
    fn default() -> Self {
        Self {
            x: default_goal_coordinate(),
            y: default_goal_coordinate(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            rate_hz: default_rate_hz(),
            goal_tolerance: default_goal_tolerance(),
            gain: default_gain(),
            heading_error: HeadingErrorPolicy::default(),
            max_updates_per_tick: default_max_updates_per_tick(),
            status_interval_ticks: default_status_interval_ticks(),
            max_ticks: None,
        }
    }
}

// Default value functions
fn default_goal_coordinate() -> f64 {
    10.0
}
fn default_rate_hz() -> f64 {
    5.0
}
fn default_goal_tolerance() -> f64 {
    0.5
}
fn default_gain() -> f64 {
    1.0
}
fn default_max_updates_per_tick() -> usize {
    64
}
fn default_status_interval_ticks() -> u64 {
    10
}

impl DhavakConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DhavakError::Config(format!("Failed to read config file: {}", e)))?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: DhavakConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Check every startup parameter; the loop must not start on error.
    pub fn validate(&self) -> Result<()> {
        if !self.goal.x.is_finite() {
            return Err(DhavakError::invalid("goal.x", self.goal.x, "must be finite"));
        }
        if !self.goal.y.is_finite() {
            return Err(DhavakError::invalid("goal.y", self.goal.y, "must be finite"));
        }
        self.steering().validate()?;
        positive("control.goal_tolerance", self.control.goal_tolerance)?;
        if self.control.max_updates_per_tick == 0 {
            return Err(DhavakError::invalid(
                "control.max_updates_per_tick",
                self.control.max_updates_per_tick,
                "must be at least 1",
            ));
        }
        self.optimizer.validate()?;
        self.simulation.validate()?;
        Ok(())
    }

    /// Final goal as a pose.
    pub fn goal_pose(&self) -> Pose2D {
        Pose2D::at(self.goal.x, self.goal.y)
    }

    /// Steering controller settings.
    pub fn steering(&self) -> SteeringConfig {
        SteeringConfig {
            gain: self.control.gain,
            rate_hz: self.control.rate_hz,
            heading_error: self.control.heading_error,
        }
    }
}

pub(crate) fn positive(field: &'static str, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(DhavakError::invalid(field, value, "must be positive"))
    }
}
