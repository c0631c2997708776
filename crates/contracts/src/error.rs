//! Layered error definitions
//!
//! Categorized by source: config / device / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Sink lifecycle error (start/stop)
    #[error("sink '{sink_name}' lifecycle error: {message}")]
    SinkLifecycle { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create sink lifecycle error
    pub fn sink_lifecycle(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkLifecycle {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}

/// Device-level failures.
///
/// None of these ever leave a worker thread: they are logged where they occur.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// A single register transaction failed
    #[error("register 0x{address:08x} not {access}: {message}")]
    Register {
        address: u32,
        access: &'static str,
        message: String,
    },

    /// Block (trace) read failed or came back short
    #[error("block read at 0x{address:08x} failed: {message}")]
    BlockRead { address: u32, message: String },

    /// Bounded busy-bit handshake ran out of retries
    #[error("handshake '{stage}' timed out after {attempts} reads")]
    HandshakeTimeout { stage: String, attempts: u32 },

    /// Device sub-configuration is missing or malformed
    #[error("device '{device}' config error: {message}")]
    Config { device: String, message: String },

    /// No transport backend available for the requested device path
    #[error("no transport available for '{path}'")]
    TransportUnavailable { path: String },

    /// Frame variant does not belong to this device
    #[error("frame kind {found:?} does not match device kind {expected:?}")]
    FrameMismatch {
        expected: crate::DeviceKind,
        found: crate::DeviceKind,
    },
}

impl DeviceError {
    /// Create a failed register read error
    pub fn read(address: u32, message: impl Into<String>) -> Self {
        Self::Register {
            address,
            access: "readable",
            message: message.into(),
        }
    }

    /// Create a failed register write error
    pub fn write(address: u32, message: impl Into<String>) -> Self {
        Self::Register {
            address,
            access: "writeable",
            message: message.into(),
        }
    }

    /// Create a device configuration error
    pub fn config(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            device: device.into(),
            message: message.into(),
        }
    }
}
