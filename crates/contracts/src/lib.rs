//! # Contracts
//!
//! Frozen interface contracts shared by every front-end crate.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Data Model
//! - `EventFrame`: one atomic unit of data read from one device
//! - `CompositeEvent`: one frame from every active worker, taken at the same pop position
//! - `ConfigDocument`: the persisted configuration, from which run snapshots are derived
//!
//! ## Capabilities
//! - `Device`: device-specific bring-up and readout, driven by a worker thread
//! - `RegisterTransport`: the only seam for low-level register I/O
//! - `EventSink`: consumer of composite events

mod device;
mod document;
mod error;
mod event;
mod frame;
mod run;
mod sink;
mod transport;

pub use device::{Device, DeviceConfig};
pub use document::*;
pub use error::*;
pub use event::*;
pub use frame::*;
pub use run::*;
pub use sink::{EventSink, SharedSink};
pub use transport::RegisterTransport;
