//! # Run Control
//!
//! Run state machine and remote control endpoints.
//!
//! Responsibilities:
//! - Parse `START:<n>` / `STOP` control messages
//! - Sequence setup, start, drain and teardown of a run
//! - Answer heartbeat probes
//!
//! ## Usage
//!
//! ```ignore
//! use run_control::RunController;
//!
//! let mut controller = RunController::new(Box::new(source), DeviceFactory::new());
//! std::thread::spawn(move || controller.serve(command_rx));
//! ```

pub mod controller;
pub mod error;
pub mod heartbeat;
pub mod protocol;

pub use controller::RunController;
pub use error::{Result, RunError};
pub use heartbeat::HeartbeatResponder;
pub use protocol::Command;
