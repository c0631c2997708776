//! EventBuilder state machine and merge thread

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use contracts::{BuilderSettings, CompositeEvent, SharedSink, WorkerFrame};
use observability::{metrics, RunStats};
use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, trace, warn};
use workers::Worker;

use crate::alignment::{self, Alignment, AlignmentCheck};
use crate::error::{BuilderError, Result};

/// Builder state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BuilderState {
    /// No merge thread running
    Idle = 0,
    /// Merging and delivering
    Building = 1,
    /// Delivering remaining complete sets, then exiting
    Draining = 2,
}

impl BuilderState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Building,
            2 => Self::Draining,
            _ => Self::Idle,
        }
    }
}

impl std::fmt::Display for BuilderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Building => write!(f, "building"),
            Self::Draining => write!(f, "draining"),
        }
    }
}

struct Shared {
    state: AtomicU8,
    workers: Vec<Arc<Worker>>,
    sinks: Vec<SharedSink>,
    alignment: Box<dyn AlignmentCheck>,
    poll_interval: Duration,
    next_seq: AtomicU64,
    stats: Mutex<RunStats>,
}

impl Shared {
    fn state(&self) -> BuilderState {
        BuilderState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, from: BuilderState, to: BuilderState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn all_ready(&self) -> bool {
        !self.workers.is_empty() && self.workers.iter().all(|w| w.is_event_available())
    }

    fn all_empty(&self) -> bool {
        self.workers.iter().all(|w| !w.is_event_available())
    }

    fn merge_loop(&self) {
        debug!(workers = self.workers.len(), "event builder thread started");

        loop {
            let state = self.state();
            if state == BuilderState::Idle {
                break;
            }

            if self.all_ready() {
                self.build_and_deliver();
                continue;
            }

            if state == BuilderState::Draining
                && self.all_empty()
                && self.transition(BuilderState::Draining, BuilderState::Idle)
            {
                info!(
                    delivered = self.next_seq.load(Ordering::Relaxed),
                    "event builder drained"
                );
                break;
            }

            thread::sleep(self.poll_interval);
        }

        debug!("event builder thread exiting");
    }

    /// Pop one frame from every worker in registry order and deliver the set
    fn build_and_deliver(&self) {
        let mut frames = Vec::with_capacity(self.workers.len());
        for worker in &self.workers {
            let position = worker.position();
            let Some(frame) = worker.pop_event() else {
                // only this thread pops, so a ready queue cannot empty underneath us
                error!(worker = %worker.name(), "ready queue yielded no frame");
                return;
            };
            frames.push(WorkerFrame {
                worker: worker.name().to_string(),
                position,
                frame,
            });
        }

        let alignment_flag = match self.alignment.check(&frames) {
            Alignment::Aligned => None,
            Alignment::Flagged(reason) => Some(reason),
        };

        let event = CompositeEvent {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            frames,
            alignment_flag,
        };

        if let Some(reason) = &event.alignment_flag {
            warn!(
                seq = event.seq,
                check = self.alignment.name(),
                reason = %reason,
                "composite event flagged"
            );
        }
        trace!(seq = event.seq, frames = event.frames.len(), "composite event built");

        let mut stats = self.stats.lock();
        for sink in &self.sinks {
            let mut sink = sink.lock();
            match sink.write(&event) {
                Ok(()) => metrics::record_sink_write(sink.name(), true),
                Err(e) => {
                    warn!(sink = %sink.name(), seq = event.seq, error = %e, "sink write failed");
                    metrics::record_sink_write(sink.name(), false);
                    stats.record_sink_failure(sink.name());
                }
            }
        }
        stats.update(&event);
        metrics::record_composite_built(&event);
    }
}

/// Event builder
///
/// Bound to the workers and sinks of one run. Every composite event takes
/// exactly one frame from each worker, so all pop positions advance in
/// lock-step.
pub struct EventBuilder {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl EventBuilder {
    /// Builder with the alignment check named by `settings`
    pub fn new(workers: Vec<Arc<Worker>>, sinks: Vec<SharedSink>, settings: &BuilderSettings) -> Self {
        Self::with_alignment(workers, sinks, settings, alignment::from_config(&settings.alignment))
    }

    pub fn with_alignment(
        workers: Vec<Arc<Worker>>,
        sinks: Vec<SharedSink>,
        settings: &BuilderSettings,
        alignment: Box<dyn AlignmentCheck>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: AtomicU8::new(BuilderState::Idle as u8),
                workers,
                sinks,
                alignment,
                poll_interval: Duration::from_micros(settings.poll_interval_us.max(1)),
                next_seq: AtomicU64::new(0),
                stats: Mutex::new(RunStats::new()),
            }),
            handle: None,
        }
    }

    pub fn state(&self) -> BuilderState {
        self.shared.state()
    }

    /// Idle -> Building, spawning the merge thread
    #[instrument(name = "event_builder_start", skip(self), fields(workers = self.shared.workers.len()))]
    pub fn start(&mut self) -> Result<()> {
        // a previous merge thread has already left the loop once state is Idle
        self.join();

        if !self.shared.transition(BuilderState::Idle, BuilderState::Building) {
            return Err(BuilderError::NotIdle(self.state()));
        }

        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name("event-builder".to_string())
            .spawn(move || shared.merge_loop());

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                info!("event builder started");
                Ok(())
            }
            Err(e) => {
                self.shared
                    .state
                    .store(BuilderState::Idle as u8, Ordering::Release);
                Err(BuilderError::Spawn(e))
            }
        }
    }

    /// Building -> Draining
    ///
    /// With no workers there is nothing to drain and the builder returns to
    /// Idle immediately. A no-op in any other state.
    pub fn stop(&self) {
        if self.shared.workers.is_empty() {
            if self.shared.transition(BuilderState::Building, BuilderState::Idle) {
                info!("event builder stopped with no workers");
            }
            return;
        }
        if self.shared.transition(BuilderState::Building, BuilderState::Draining) {
            info!("event builder draining");
        }
    }

    /// True once draining completed and the merge loop left for Idle
    pub fn is_finished(&self) -> bool {
        self.state() == BuilderState::Idle
    }

    /// Force Idle without further delivery
    ///
    /// Frames still queued stay in the worker queues.
    pub fn abort(&mut self) {
        let previous = self
            .shared
            .state
            .swap(BuilderState::Idle as u8, Ordering::AcqRel);
        if BuilderState::from_u8(previous) != BuilderState::Idle {
            warn!(from = %BuilderState::from_u8(previous), "event builder aborted");
        }
        self.join();
    }

    /// Composite events delivered so far
    pub fn delivered(&self) -> u64 {
        self.shared.next_seq.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> RunStats {
        self.shared.stats.lock().clone()
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("event builder thread panicked");
            }
        }
    }
}

impl Drop for EventBuilder {
    fn drop(&mut self) {
        self.abort();
    }
}

impl std::fmt::Debug for EventBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBuilder")
            .field("state", &self.state())
            .field("workers", &self.shared.workers.len())
            .field("sinks", &self.shared.sinks.len())
            .field("delivered", &self.delivered())
            .finish()
    }
}
