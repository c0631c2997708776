//! Run-level error types

use thiserror::Error;

/// Run control error
#[derive(Debug, Error)]
pub enum RunError {
    /// Configuration could not be loaded into a snapshot
    #[error("configuration error: {0}")]
    Config(#[from] contracts::ContractError),

    /// A configured device could not be constructed
    #[error("device setup error: {0}")]
    Device(#[from] devices::FactoryError),

    /// A worker thread could not be launched or joined
    #[error("worker error: {0}")]
    Worker(#[from] workers::WorkerError),

    /// The event builder could not be started
    #[error("event builder error: {0}")]
    Builder(#[from] event_builder::BuilderError),

    /// The builder did not drain within the configured bound
    #[error("event builder did not drain within {timeout_ms} ms")]
    DrainTimeout { timeout_ms: u64 },

    /// A bridge thread could not be launched
    #[error("failed to spawn {what} thread: {source}")]
    Spawn {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Run control Result alias
pub type Result<T> = std::result::Result<T, RunError>;
