//! Device trait - device-specific data source abstraction
//!
//! Separates device bring-up and readout from the portable worker loop.
//! A worker thread owns exactly one `Device` and drives it by polling.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{DeviceError, DeviceKind, EventFrame};

/// Device sub-configuration, as loaded from the device entry of the configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device entry name
    pub name: String,
    /// Raw sub-configuration
    pub value: serde_json::Value,
}

impl DeviceConfig {
    /// Create a device configuration
    pub fn new(name: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Deserialize into a device-specific settings type
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, DeviceError> {
        serde_json::from_value(self.value.clone())
            .map_err(|e| DeviceError::config(&self.name, e.to_string()))
    }
}

/// Device data source
///
/// Called only from the owning worker's thread once the worker is started,
/// and from the controller thread during `load`.
pub trait Device: Send {
    /// Device kind
    fn kind(&self) -> DeviceKind;

    /// Device-specific bring-up
    ///
    /// Failures are logged by the caller and never abort a run.
    fn load(&mut self, config: &DeviceConfig) -> Result<(), DeviceError>;

    /// Whether the device holds a frame ready for readout
    fn event_available(&mut self) -> bool;

    /// Read exactly one frame into `frame`
    ///
    /// On error, `frame` holds whatever partial data the transport yielded.
    fn read_event(&mut self, frame: &mut EventFrame) -> Result<(), DeviceError>;

    /// A zeroed frame with this device's shape, used as the readout buffer
    fn blank_frame(&self) -> EventFrame;
}
