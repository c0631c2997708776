//! Sink error types

use thiserror::Error;

/// Sink construction errors
#[derive(Debug, Error)]
pub enum SinkError {
    /// Writer entry is missing or has an unusable field
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// No writer is known under this tag
    #[error("unknown writer tag '{0}'")]
    UnknownTag(String),

    /// Sink error (from contract)
    #[error("sink error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SinkError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
