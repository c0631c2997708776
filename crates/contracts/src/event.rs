//! CompositeEvent - EventBuilder output
//!
//! One frame from every active worker, all taken at the same pop position.

use serde::{Deserialize, Serialize};

use crate::EventFrame;

/// Composite event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeEvent {
    /// Synthetic sequence number (monotonically increasing from 0 per run)
    pub seq: u64,

    /// Frames in worker registry order
    pub frames: Vec<WorkerFrame>,

    /// Set when the alignment check flagged this event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment_flag: Option<String>,
}

/// One worker's contribution to a composite event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerFrame {
    /// Worker name (configuration entry name)
    pub worker: String,

    /// Position of this frame in the worker's pop order (0-based)
    pub position: u64,

    /// The frame itself
    pub frame: EventFrame,
}

impl CompositeEvent {
    /// Frame contributed by the named worker
    pub fn frame_of(&self, worker: &str) -> Option<&EventFrame> {
        self.frames
            .iter()
            .find(|f| f.worker == worker)
            .map(|f| &f.frame)
    }

    /// Whether every contributing frame sits at the same pop position
    pub fn is_lockstep(&self) -> bool {
        self.frames
            .windows(2)
            .all(|pair| pair[0].position == pair[1].position)
    }
}
