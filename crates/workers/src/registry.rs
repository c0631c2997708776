//! WorkerRegistry - ordered set of workers active in a run
//!
//! Registration order is the order frames appear inside a composite event.

use std::sync::Arc;

use tracing::{info, warn};

use crate::Worker;

/// Worker registry
///
/// Owned by the run controller; the event builder holds clones of the
/// `Arc`s for the duration of one run.
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: Vec<Arc<Worker>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a worker, returning the shared handle
    pub fn add(&mut self, worker: Worker) -> Arc<Worker> {
        let worker = Arc::new(worker);
        self.workers.push(worker.clone());
        worker
    }

    /// Start every worker in registration order
    pub fn start_all(&self) {
        for worker in &self.workers {
            worker.start();
        }
        info!(count = self.workers.len(), "workers started");
    }

    /// Stop every worker in registration order
    pub fn stop_all(&self) {
        for worker in &self.workers {
            worker.stop();
        }
        info!(count = self.workers.len(), "workers stopped");
    }

    /// Shut down and join every worker, then empty the registry
    ///
    /// Join failures are logged; the registry is emptied regardless.
    pub fn clear(&mut self) {
        for worker in self.workers.drain(..) {
            if let Err(e) = worker.shutdown() {
                warn!(worker = %worker.name(), error = %e, "worker shutdown failed");
            }
        }
    }

    pub fn workers(&self) -> &[Arc<Worker>] {
        &self.workers
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Worker>> {
        self.workers.iter().find(|w| w.name() == name)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

impl Drop for WorkerRegistry {
    fn drop(&mut self) {
        self.clear();
    }
}
