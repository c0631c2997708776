//! MemorySink - collects composite events in memory
//!
//! Clones share the same storage, so a test can keep one handle while the
//! builder writes through another.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use contracts::{CompositeEvent, ContractError, EventSink, SharedSink};
use parking_lot::Mutex;

/// Collected events, shared across clones
pub type EventLog = Arc<Mutex<Vec<CompositeEvent>>>;

/// In-memory sink
#[derive(Clone, Default)]
pub struct MemorySink {
    name: String,
    events: EventLog,
    starts: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl MemorySink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Shared handle to a clone of this sink
    pub fn shared(&self) -> SharedSink {
        Arc::new(Mutex::new(self.clone()))
    }

    pub fn events(&self) -> EventLog {
        self.events.clone()
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::Acquire)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::Acquire)
    }

    /// Make every following write fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }
}

impl EventSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self) -> Result<(), ContractError> {
        self.starts.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn write(&mut self, event: &CompositeEvent) -> Result<(), ContractError> {
        if self.failing.load(Ordering::Acquire) {
            return Err(ContractError::sink_write(&self.name, "write rejected"));
        }
        self.events.lock().push(event.clone());
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ContractError> {
        self.stops.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}
