//! Simulator thread: integrates the turtle world and publishes poses.
//!
//! Runs at the physics rate and on every step:
//! - Applies the most recent velocity command
//! - Integrates runner and obstacle motion
//! - Publishes both poses

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::sim::TurtleWorld;
use crate::types::{Pose2D, VelocityCommand};

/// Simulator thread state and logic.
pub struct SimulatorThread {
    world: TurtleWorld,
    command_rx: Receiver<VelocityCommand>,
    runner_tx: Sender<Pose2D>,
    obstacle_tx: Sender<Pose2D>,
    running: Arc<AtomicBool>,
}

impl SimulatorThread {
    pub fn new(
        world: TurtleWorld,
        command_rx: Receiver<VelocityCommand>,
        runner_tx: Sender<Pose2D>,
        obstacle_tx: Sender<Pose2D>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            world,
            command_rx,
            runner_tx,
            obstacle_tx,
            running,
        }
    }

    /// Run the simulator main loop.
    pub fn run(&mut self) {
        let dt = self.world.config().time_step();
        let loop_interval = Duration::from_secs_f64(dt);
        let mut commands_closed = false;

        tracing::info!(
            "Simulator started: runner=({:.2}, {:.2}), obstacle=({:.2}, {:.2}), {:.0} Hz",
            self.world.runner().x,
            self.world.runner().y,
            self.world.obstacle().x,
            self.world.obstacle().y,
            self.world.config().physics_rate_hz
        );

        // Initial poses so the control loop can start
        if let Err(e) = self.world.publish(&self.runner_tx, &self.obstacle_tx) {
            tracing::warn!("Simulator stopping: {}", e);
            return;
        }

        while self.running.load(Ordering::SeqCst) {
            let loop_start = Instant::now();

            // Latest command wins
            loop {
                match self.command_rx.try_recv() {
                    Ok(cmd) => self.world.set_command(cmd),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        if !commands_closed {
                            tracing::debug!("Command channel closed, runner coasting to a stop");
                            self.world.set_command(VelocityCommand::stop());
                            commands_closed = true;
                        }
                        break;
                    }
                }
            }

            self.world.step(dt);

            if let Err(e) = self.world.publish(&self.runner_tx, &self.obstacle_tx) {
                tracing::debug!("Simulator stopping: {}", e);
                break;
            }

            // Maintain target loop rate
            let elapsed = loop_start.elapsed();
            if elapsed < loop_interval {
                std::thread::sleep(loop_interval - elapsed);
            }
        }

        let runner = self.world.runner();
        tracing::info!(
            "Simulator exited after {:.1}s: runner=({:.2}, {:.2}, {:.1}°)",
            self.world.elapsed(),
            runner.x,
            runner.y,
            runner.theta.to_degrees()
        );
    }
}
