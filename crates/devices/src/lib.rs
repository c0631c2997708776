//! # Devices
//!
//! Device-specific collaborators behind the `Device` trait.
//!
//! Responsibilities:
//! - Construct devices from the configuration device-type tag
//! - Device bring-up and readout over `RegisterTransport`
//! - Provide synthetic and scripted sources for development and tests

pub mod error;
pub mod factory;
pub mod fake;
pub mod memory;
pub mod scripted;
pub mod sis3350;

pub use error::{FactoryError, Result};
pub use factory::{DeviceConstructor, DeviceFactory};
pub use fake::{FakeDevice, FakeSettings};
pub use memory::MemoryTransport;
pub use scripted::{ScriptedDevice, SCRIPTED_TAG};
pub use sis3350::{Sis3350Device, Sis3350Settings};
