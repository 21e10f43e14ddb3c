//! Pose input channels, drained once per tick.

use crossbeam_channel::{Receiver, TryRecvError};

use crate::state::PoseState;
use crate::state::messages::{PoseSource, PoseUpdate};
use crate::types::Pose2D;

/// Number of updates applied from each source during one drain. Skipped
/// backlog entries are not counted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub runner: usize,
    pub obstacle: usize,
}

/// One pose channel plus its bookkeeping.
struct PoseChannel {
    source: PoseSource,
    rx: Receiver<Pose2D>,
    closed: bool,
}

impl PoseChannel {
    fn new(source: PoseSource, rx: Receiver<Pose2D>) -> Self {
        Self {
            source,
            rx,
            closed: false,
        }
    }

    /// Apply up to `limit` pending poses in arrival order. A backlog beyond
    /// that is discarded except for its newest pose, which is applied last.
    fn drain(&mut self, state: &mut PoseState, limit: usize) -> usize {
        let mut applied = 0;
        while applied < limit {
            match self.rx.try_recv() {
                Ok(pose) => {
                    self.apply(state, pose);
                    applied += 1;
                }
                Err(TryRecvError::Empty) => return applied,
                Err(TryRecvError::Disconnected) => {
                    if !self.closed {
                        tracing::warn!("{:?} pose channel closed; keeping last pose", self.source);
                        self.closed = true;
                    }
                    return applied;
                }
            }
        }

        let mut skipped = 0;
        let mut newest = None;
        for pose in self.rx.try_iter() {
            if newest.replace(pose).is_some() {
                skipped += 1;
            }
        }
        if let Some(pose) = newest {
            tracing::warn!(
                "{:?} pose backlog: skipped {} stale updates",
                self.source,
                skipped
            );
            self.apply(state, pose);
            applied += 1;
        }
        applied
    }

    fn apply(&self, state: &mut PoseState, pose: Pose2D) {
        state.apply(PoseUpdate {
            source: self.source,
            pose,
        });
    }
}

/// Runner and obstacle pose receivers.
pub struct PoseInputs {
    runner: PoseChannel,
    obstacle: PoseChannel,
    max_per_tick: usize,
}

impl PoseInputs {
    pub fn new(runner: Receiver<Pose2D>, obstacle: Receiver<Pose2D>, max_per_tick: usize) -> Self {
        Self {
            runner: PoseChannel::new(PoseSource::Runner, runner),
            obstacle: PoseChannel::new(PoseSource::Obstacle, obstacle),
            max_per_tick: max_per_tick.max(1),
        }
    }

    /// Apply pending updates from both sources, ending on the newest pose
    /// each source has queued.
    pub fn drain_into(&mut self, state: &mut PoseState) -> DrainStats {
        DrainStats {
            runner: self.runner.drain(state, self.max_per_tick),
            obstacle: self.obstacle.drain(state, self.max_per_tick),
        }
    }
}
