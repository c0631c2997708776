//! # Workers
//!
//! One producer thread per configured device, each with its own FIFO queue.
//!
//! Responsibilities:
//! - Poll the device while running and push every fetched frame
//! - Expose the single-consumer pop side to the event builder
//! - Keep workers in registration order for the run controller

pub mod error;
pub mod registry;
pub mod worker;

pub use error::{Result, WorkerError};
pub use registry::WorkerRegistry;
pub use worker::{Worker, WorkerStats};
