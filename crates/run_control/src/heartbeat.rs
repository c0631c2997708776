//! HeartbeatResponder - liveness echo on its own thread

use std::thread::{self, JoinHandle};

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::{Result, RunError};

/// Echoes every probe back unmodified until either channel closes
#[derive(Debug)]
pub struct HeartbeatResponder {
    handle: Option<JoinHandle<u64>>,
}

impl HeartbeatResponder {
    pub fn spawn(mut probes: mpsc::Receiver<Bytes>, replies: mpsc::Sender<Bytes>) -> Result<Self> {
        let handle = thread::Builder::new()
            .name("heartbeat".to_string())
            .spawn(move || {
                let mut answered = 0u64;
                while let Some(probe) = probes.blocking_recv() {
                    trace!(bytes = probe.len(), "heartbeat probe");
                    if replies.blocking_send(probe).is_err() {
                        break;
                    }
                    answered += 1;
                }
                debug!(answered, "heartbeat responder exiting");
                answered
            })
            .map_err(|source| RunError::Spawn {
                what: "heartbeat",
                source,
            })?;

        Ok(Self {
            handle: Some(handle),
        })
    }

    /// Wait for the responder to exit, returning the number of probes answered
    pub fn join(mut self) -> u64 {
        self.handle
            .take()
            .and_then(|handle| match handle.join() {
                Ok(answered) => Some(answered),
                Err(_) => {
                    warn!("heartbeat thread panicked");
                    None
                }
            })
            .unwrap_or(0)
    }
}
