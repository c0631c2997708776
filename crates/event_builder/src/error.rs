//! EventBuilder error types

use thiserror::Error;

use crate::BuilderState;

/// EventBuilder error
#[derive(Debug, Error)]
pub enum BuilderError {
    /// Merge thread could not be spawned
    #[error("failed to spawn event builder thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// `start` called outside Idle
    #[error("event builder cannot start from state {0}")]
    NotIdle(BuilderState),
}

/// EventBuilder Result alias
pub type Result<T> = std::result::Result<T, BuilderError>;
