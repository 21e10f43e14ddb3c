//! Background threads for DhavakNav.
//!
//! The control loop runs on the main thread; the simulated world runs on its
//! own thread and talks to it only through channels.

mod simulator;

pub use simulator::SimulatorThread;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use crate::error::Result;
use crate::sim::{SimulationConfig, TurtleWorld};
use crate::types::{Pose2D, VelocityCommand};

/// Spawn the simulator thread. It stops once `running` clears or a pose
/// receiver is dropped.
pub fn spawn_simulator(
    config: SimulationConfig,
    command_rx: Receiver<VelocityCommand>,
    runner_tx: Sender<Pose2D>,
    obstacle_tx: Sender<Pose2D>,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("simulator".into())
        .spawn(move || {
            let world = TurtleWorld::new(config);
            let mut simulator =
                SimulatorThread::new(world, command_rx, runner_tx, obstacle_tx, running);
            simulator.run();
        })?;
    Ok(handle)
}
