//! Device factory error types

use contracts::DeviceError;
use thiserror::Error;

/// Device factory specific error
#[derive(Debug, Error)]
pub enum FactoryError {
    /// No constructor registered for the device-type tag
    #[error("unknown device type '{tag}' for device '{name}'")]
    UnknownTag { tag: String, name: String },

    /// Wrapped DeviceError
    #[error(transparent)]
    Device(#[from] DeviceError),
}

impl FactoryError {
    /// Create unknown tag error
    pub fn unknown_tag(tag: impl Into<String>, name: impl Into<String>) -> Self {
        Self::UnknownTag {
            tag: tag.into(),
            name: name.into(),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, FactoryError>;
