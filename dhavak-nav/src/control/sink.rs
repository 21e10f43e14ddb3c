//! Velocity command output.

use crossbeam_channel::Sender;

use crate::error::{DhavakError, Result};
use crate::types::VelocityCommand;

/// Destination for velocity commands.
///
/// An error means the actuator is gone and ends the run.
pub trait VelocitySink {
    fn send(&mut self, command: &VelocityCommand) -> Result<()>;
}

impl VelocitySink for Sender<VelocityCommand> {
    fn send(&mut self, command: &VelocityCommand) -> Result<()> {
        Sender::send(self, *command)
            .map_err(|_| DhavakError::Channel("velocity command receiver disconnected".into()))
    }
}

impl VelocitySink for Vec<VelocityCommand> {
    fn send(&mut self, command: &VelocityCommand) -> Result<()> {
        self.push(*command);
        Ok(())
    }
}
