//! EventSink trait - output consumer interface
//!
//! Defines the abstract interface for sinks. Concrete writers live in the `sinks` crate.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{CompositeEvent, ContractError};

/// Sink shared between the run controller (start/stop) and the builder thread (write)
pub type SharedSink = Arc<Mutex<dyn EventSink>>;

/// Composite event consumer
///
/// Lifecycle per run: `start` once, then any number of `write`, then `stop`.
pub trait EventSink: Send {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Prepare for a run. Called at most once per run, before any worker produces.
    fn start(&mut self) -> Result<(), ContractError>;

    /// Consume one composite event
    ///
    /// # Errors
    /// Returns write error (should include context)
    fn write(&mut self, event: &CompositeEvent) -> Result<(), ContractError>;

    /// Stop the sink
    ///
    /// Must flush any buffered output before returning: the caller treats
    /// return as "fully stopped".
    fn stop(&mut self) -> Result<(), ContractError>;
}
