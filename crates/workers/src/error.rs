//! Worker error types

use thiserror::Error;

/// Worker error
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Worker thread could not be spawned
    #[error("failed to spawn thread for worker '{worker}': {source}")]
    Spawn {
        /// Worker name
        worker: String,
        #[source]
        source: std::io::Error,
    },

    /// Worker thread panicked before it could be joined
    #[error("worker '{worker}' thread panicked")]
    Panicked {
        /// Worker name
        worker: String,
    },
}

/// Worker Result alias
pub type Result<T> = std::result::Result<T, WorkerError>;
