//! Worker - one polling producer thread per device
//!
//! The thread is launched at construction and lives until `shutdown`. While
//! `running` is set it polls the device and pushes each fetched frame into
//! the worker's own queue; otherwise it idles at the same polling interval.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use contracts::{Device, DeviceConfig, DeviceError, DeviceKind, EventFrame, WorkerSettings};
use observability::metrics;
use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::error::{Result, WorkerError};

/// State shared between the worker handle and its thread
struct Shared {
    name: String,
    device: Mutex<Box<dyn Device>>,
    queue: Mutex<VecDeque<EventFrame>>,
    running: AtomicBool,
    has_event: AtomicBool,
    shutdown: AtomicBool,
    pushed: AtomicU64,
    popped: AtomicU64,
    fetch_errors: AtomicU64,
    poll_interval: Duration,
}

impl Shared {
    fn work_loop(&self) {
        debug!(worker = %self.name, "worker thread started");

        while !self.shutdown.load(Ordering::Acquire) {
            while self.running.load(Ordering::Acquire) && !self.shutdown.load(Ordering::Acquire) {
                self.poll_once();
                thread::sleep(self.poll_interval);
            }
            thread::sleep(self.poll_interval);
        }

        debug!(worker = %self.name, "worker thread exiting");
    }

    /// Fetch at most one frame and push it
    ///
    /// A panicking device is logged and skipped for this iteration; the
    /// thread keeps polling.
    fn poll_once(&self) {
        let fetched = catch_unwind(AssertUnwindSafe(|| self.fetch()));
        let frame = match fetched {
            Ok(Some(frame)) => frame,
            Ok(None) => return,
            Err(_) => {
                self.fetch_errors.fetch_add(1, Ordering::Relaxed);
                metrics::record_fetch_error(&self.name);
                error!(worker = %self.name, "device panicked during fetch");
                return;
            }
        };

        let depth = {
            let mut queue = self.queue.lock();
            queue.push_back(frame);
            self.has_event.store(true, Ordering::Release);
            queue.len()
        };

        let pushed = self.pushed.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::record_frame_pushed(&self.name, depth);
        trace!(worker = %self.name, pushed, depth, "frame pushed");
    }

    fn fetch(&self) -> Option<EventFrame> {
        let mut device = self.device.lock();
        if !device.event_available() {
            return None;
        }
        let mut frame = device.blank_frame();
        if let Err(e) = device.read_event(&mut frame) {
            self.fetch_errors.fetch_add(1, Ordering::Relaxed);
            metrics::record_fetch_error(&self.name);
            warn!(worker = %self.name, error = %e, "device fetch failed");
        }
        Some(frame)
    }
}

/// Counters for one worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub pushed: u64,
    pub popped: u64,
    pub fetch_errors: u64,
    pub queued: usize,
}

/// Worker
///
/// The queue is touched by exactly two threads: the worker's own thread
/// (push) and the single event builder thread (pop).
pub struct Worker {
    name: String,
    kind: DeviceKind,
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    /// Create a worker and launch its thread
    ///
    /// The thread idles until `start`.
    pub fn new(
        name: impl Into<String>,
        device: Box<dyn Device>,
        settings: &WorkerSettings,
    ) -> Result<Self> {
        let name = name.into();
        let kind = device.kind();
        let shared = Arc::new(Shared {
            name: name.clone(),
            device: Mutex::new(device),
            queue: Mutex::new(VecDeque::new()),
            running: AtomicBool::new(false),
            has_event: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            pushed: AtomicU64::new(0),
            popped: AtomicU64::new(0),
            fetch_errors: AtomicU64::new(0),
            poll_interval: Duration::from_micros(settings.poll_interval_us.max(1)),
        });

        let thread_shared = shared.clone();
        let handle = thread::Builder::new()
            .name(format!("worker-{name}"))
            .spawn(move || thread_shared.work_loop())
            .map_err(|source| WorkerError::Spawn {
                worker: name.clone(),
                source,
            })?;

        debug!(worker = %name, kind = %kind, "worker created");

        Ok(Self {
            name,
            kind,
            shared,
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// Device-specific bring-up
    #[instrument(name = "worker_load", skip(self, config), fields(worker = %self.name))]
    pub fn load(&self, config: &DeviceConfig) -> std::result::Result<(), DeviceError> {
        self.shared.device.lock().load(config)
    }

    /// Begin producing
    pub fn start(&self) {
        if !self.shared.running.swap(true, Ordering::AcqRel) {
            info!(worker = %self.name, "worker started");
        }
    }

    /// Stop producing
    ///
    /// An in-flight fetch completes and is pushed; the thread keeps idling.
    pub fn stop(&self) {
        if self.shared.running.swap(false, Ordering::AcqRel) {
            info!(worker = %self.name, "worker stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Whether the queue holds at least one frame
    pub fn is_event_available(&self) -> bool {
        self.shared.has_event.load(Ordering::Acquire)
    }

    /// Remove the front frame
    ///
    /// Returns `None` only when called without a preceding positive
    /// `is_event_available`.
    pub fn pop_event(&self) -> Option<EventFrame> {
        let (frame, depth) = {
            let mut queue = self.shared.queue.lock();
            let frame = queue.pop_front()?;
            if queue.is_empty() {
                self.shared.has_event.store(false, Ordering::Release);
            }
            (frame, queue.len())
        };
        self.shared.popped.fetch_add(1, Ordering::Relaxed);
        metrics::record_queue_depth(&self.name, depth);
        Some(frame)
    }

    /// Number of frames popped so far (the position of the next pop)
    pub fn position(&self) -> u64 {
        self.shared.popped.load(Ordering::Relaxed)
    }

    pub fn queue_len(&self) -> usize {
        self.shared.queue.lock().len()
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            pushed: self.shared.pushed.load(Ordering::Relaxed),
            popped: self.shared.popped.load(Ordering::Relaxed),
            fetch_errors: self.shared.fetch_errors.load(Ordering::Relaxed),
            queued: self.queue_len(),
        }
    }

    /// Stop, signal the thread to exit and join it
    ///
    /// Idempotent. Frames still queued are discarded with the worker.
    pub fn shutdown(&self) -> Result<()> {
        self.shared.running.store(false, Ordering::Release);
        self.shared.shutdown.store(true, Ordering::Release);

        let Some(handle) = self.handle.lock().take() else {
            return Ok(());
        };
        handle.join().map_err(|_| WorkerError::Panicked {
            worker: self.name.clone(),
        })?;
        debug!(worker = %self.name, "worker thread joined");
        Ok(())
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(worker = %self.name, error = %e, "worker shutdown failed on drop");
        }
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("running", &self.is_running())
            .field("has_event", &self.is_event_available())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::FakeFrame;
    use devices::ScriptedDevice;
    use std::time::Instant;

    fn marker(value: u64) -> EventFrame {
        EventFrame::Fake(FakeFrame {
            timestamp: vec![value],
            trace: vec![vec![value as u16]],
        })
    }

    fn settings() -> WorkerSettings {
        WorkerSettings {
            poll_interval_us: 50,
        }
    }

    fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        cond()
    }

    #[test]
    fn test_fifo_order_and_available_flag() {
        let frames: Vec<_> = (0..5).map(marker).collect();
        let device = ScriptedDevice::new("w0", frames, Duration::ZERO);
        let worker = Worker::new("w0", Box::new(device), &settings()).unwrap();

        worker.start();
        assert!(wait_until(Duration::from_secs(2), || worker.stats().pushed == 5));
        worker.stop();

        for expected in 0..5 {
            assert!(worker.is_event_available());
            assert_eq!(worker.position(), expected);
            let frame = worker.pop_event().unwrap();
            assert_eq!(frame.timestamp(0), Some(expected));
        }
        assert!(!worker.is_event_available());
        assert!(worker.pop_event().is_none());
        worker.shutdown().unwrap();
    }

    #[test]
    fn test_idle_until_started() {
        let device = ScriptedDevice::new("w0", vec![marker(1)], Duration::ZERO);
        let worker = Worker::new("w0", Box::new(device), &settings()).unwrap();

        thread::sleep(Duration::from_millis(20));
        assert!(!worker.is_event_available());
        assert_eq!(worker.queue_len(), 0);

        worker.start();
        assert!(wait_until(Duration::from_secs(2), || worker.is_event_available()));
    }

    #[test]
    fn test_stop_halts_production_and_restart_resumes() {
        let frames: Vec<_> = (0..3).map(marker).collect();
        let device = ScriptedDevice::new("w0", frames, Duration::from_millis(30));
        let worker = Worker::new("w0", Box::new(device), &settings()).unwrap();

        worker.start();
        assert!(wait_until(Duration::from_secs(2), || worker.stats().pushed >= 1));
        worker.stop();
        let after_stop = worker.stats().pushed;
        thread::sleep(Duration::from_millis(100));
        assert!(worker.stats().pushed <= after_stop + 1);

        worker.start();
        assert!(wait_until(Duration::from_secs(2), || worker.stats().pushed == 3));
    }

    #[test]
    fn test_fetch_error_still_pushes_frame() {
        struct Flaky;
        impl Device for Flaky {
            fn kind(&self) -> DeviceKind {
                DeviceKind::Fake
            }
            fn load(&mut self, _: &DeviceConfig) -> std::result::Result<(), DeviceError> {
                Ok(())
            }
            fn event_available(&mut self) -> bool {
                true
            }
            fn read_event(&mut self, _: &mut EventFrame) -> std::result::Result<(), DeviceError> {
                Err(DeviceError::read(0x10, "bus error"))
            }
            fn blank_frame(&self) -> EventFrame {
                EventFrame::Fake(FakeFrame::zeroed(1, 1))
            }
        }

        let worker = Worker::new("flaky", Box::new(Flaky), &settings()).unwrap();
        worker.start();
        assert!(wait_until(Duration::from_secs(2), || worker.stats().pushed >= 2));
        worker.stop();

        let stats = worker.stats();
        assert!(stats.fetch_errors >= 2);
        assert!(worker.pop_event().is_some());
    }

    #[test]
    fn test_device_panic_does_not_kill_thread() {
        struct Panicky {
            reads: u32,
        }
        impl Device for Panicky {
            fn kind(&self) -> DeviceKind {
                DeviceKind::Fake
            }
            fn load(&mut self, _: &DeviceConfig) -> std::result::Result<(), DeviceError> {
                Ok(())
            }
            fn event_available(&mut self) -> bool {
                true
            }
            fn read_event(&mut self, _: &mut EventFrame) -> std::result::Result<(), DeviceError> {
                self.reads += 1;
                if self.reads == 1 {
                    panic!("transport fault");
                }
                Ok(())
            }
            fn blank_frame(&self) -> EventFrame {
                EventFrame::Fake(FakeFrame::zeroed(1, 1))
            }
        }

        let worker = Worker::new("panicky", Box::new(Panicky { reads: 0 }), &settings()).unwrap();
        worker.start();
        assert!(wait_until(Duration::from_secs(2), || worker.stats().pushed >= 2));
        worker.stop();

        assert_eq!(worker.stats().fetch_errors, 1);
        worker.shutdown().unwrap();
    }

    /// A rejected config leaves the device on its defaults and the thread alive
    #[test]
    fn test_rejected_fake_config_keeps_producing() {
        let device = devices::FakeDevice::new("fake_0");
        let worker = Worker::new("fake_0", Box::new(device), &settings()).unwrap();

        let config = DeviceConfig::new("fake_0", serde_json::json!({ "rate": 0.0 }));
        assert!(worker.load(&config).is_err());

        // defaults trigger at 10 Hz
        worker.start();
        assert!(wait_until(Duration::from_secs(2), || worker.is_event_available()));
        assert_eq!(worker.stats().fetch_errors, 0);
        worker.shutdown().unwrap();
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let device = ScriptedDevice::new("w0", Vec::new(), Duration::ZERO);
        let worker = Worker::new("w0", Box::new(device), &settings()).unwrap();
        worker.start();
        worker.shutdown().unwrap();
        worker.shutdown().unwrap();
        assert!(!worker.is_running());
    }
}
