//! RunController - run state machine
//!
//! Idle -> Running on `START:<n>`, Running -> Idle on `STOP` once the event
//! builder has drained. `START` while Running and `STOP` while Idle are
//! no-ops. Setup and teardown run on the controller's own thread, so a new
//! run never overlaps the workers of the previous one.

use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use config_loader::{ConfigSource, RunSnapshot};
use contracts::{RunNumber, RunState, SharedSink};
use devices::DeviceFactory;
use event_builder::EventBuilder;
use observability::{metrics, RunSummary};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};
use workers::{Worker, WorkerRegistry};

use crate::error::{Result, RunError};
use crate::protocol::Command;

/// Run controller
///
/// Owns everything that lives for one run: the snapshot, the worker
/// registry, the sink set and the event builder.
pub struct RunController {
    source: Box<dyn ConfigSource>,
    factory: DeviceFactory,
    snapshot: Option<RunSnapshot>,
    registry: WorkerRegistry,
    sinks: Vec<SharedSink>,
    builder: Option<EventBuilder>,
    running: bool,
    last_summary: Option<RunSummary>,
}

impl RunController {
    pub fn new(source: Box<dyn ConfigSource>, factory: DeviceFactory) -> Self {
        Self {
            source,
            factory,
            snapshot: None,
            registry: WorkerRegistry::new(),
            sinks: Vec::new(),
            builder: None,
            running: false,
            last_summary: None,
        }
    }

    pub fn state(&self) -> RunState {
        if self.running {
            RunState::Running
        } else {
            RunState::Idle
        }
    }

    /// Snapshot of the current (or most recent) run
    pub fn snapshot(&self) -> Option<&RunSnapshot> {
        self.snapshot.as_ref()
    }

    /// Output target of the current (or most recent) run
    pub fn output_target(&self) -> Option<&Path> {
        self.snapshot.as_ref().map(RunSnapshot::output_target)
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    /// Summary of the last completed run
    pub fn last_summary(&self) -> Option<&RunSummary> {
        self.last_summary.as_ref()
    }

    /// Consume control messages until the channel closes
    ///
    /// Must run on a plain OS thread. An active run is stopped once the
    /// channel closes.
    pub fn serve(&mut self, mut commands: mpsc::Receiver<Bytes>) {
        info!(source = %self.source.describe(), "run controller serving");

        while let Some(message) = commands.blocking_recv() {
            if let Err(e) = self.handle_message(&message) {
                error!(error = %e, "control command failed");
            }
        }

        info!("control channel closed");
        if let Err(e) = self.stop_run() {
            error!(error = %e, "stop on shutdown failed");
        }
    }

    /// Parse and apply one control message; malformed messages are ignored
    pub fn handle_message(&mut self, message: &[u8]) -> Result<()> {
        match Command::parse(message) {
            Some(command) => self.handle_command(command),
            None => {
                debug!(message = %String::from_utf8_lossy(message), "ignoring malformed control message");
                Ok(())
            }
        }
    }

    pub fn handle_command(&mut self, command: Command) -> Result<()> {
        metrics::record_command(command.label());
        match command {
            Command::Start(run) => self.start_run(run),
            Command::Stop => self.stop_run(),
        }
    }

    /// Setup then start: builder, sinks, workers
    ///
    /// A configuration failure aborts this start and leaves the controller Idle.
    #[instrument(name = "run_start", skip(self), fields(run = %run))]
    pub fn start_run(&mut self, run: RunNumber) -> Result<()> {
        if self.running {
            debug!("start ignored, run already active");
            return Ok(());
        }

        if let Err(e) = self.setup(run) {
            self.teardown();
            return Err(e);
        }

        let builder_started = match self.builder.as_mut() {
            Some(builder) => builder.start(),
            None => Ok(()),
        };
        if let Err(e) = builder_started {
            self.teardown();
            return Err(e.into());
        }

        for sink in &self.sinks {
            let mut sink = sink.lock();
            if let Err(e) = sink.start() {
                error!(sink = %sink.name(), error = %e, "sink failed to start");
            }
        }

        self.registry.start_all();

        self.running = true;
        metrics::record_run_state(RunState::Running);
        info!(
            workers = self.registry.len(),
            sinks = self.sinks.len(),
            output = ?self.output_target(),
            "run started"
        );
        Ok(())
    }

    /// Stop, drain, then tear down
    ///
    /// With `drain_timeout_ms` configured, an undrained builder is aborted and
    /// `DrainTimeout` is returned after teardown completes.
    #[instrument(name = "run_stop", skip(self))]
    pub fn stop_run(&mut self) -> Result<()> {
        if !self.running {
            debug!("stop ignored, no active run");
            return Ok(());
        }

        let drained = self.drain();

        for sink in &self.sinks {
            let mut sink = sink.lock();
            if let Err(e) = sink.stop() {
                error!(sink = %sink.name(), error = %e, "sink failed to stop");
            }
        }

        self.registry.stop_all();
        self.teardown();

        self.running = false;
        metrics::record_run_state(RunState::Idle);
        if let Some(summary) = &self.last_summary {
            info!(
                composites = summary.composites,
                alignment_flags = summary.alignment_flags,
                "run stopped"
            );
            debug!("{summary}");
        }
        drained
    }

    /// Materialize workers, sinks and the builder from a fresh snapshot
    fn setup(&mut self, run: RunNumber) -> Result<()> {
        let document = self.source.load()?;
        let snapshot = RunSnapshot::prepare(document, self.source.base_dir(), run)?;

        if let Some(path) = &snapshot.document().controller.inspect_path {
            if let Err(e) = snapshot.write_inspect(path) {
                warn!(path = %path.display(), error = %e, "failed to write snapshot for inspection");
            }
        }

        let worker_settings = snapshot.document().worker;
        for spec in snapshot.devices() {
            let device = self.factory.create(&spec.tag, spec.name())?;
            let worker = Worker::new(spec.name(), device, &worker_settings)?;
            // device misconfiguration does not abort the run
            if let Err(e) = worker.load(&spec.config) {
                error!(worker = %spec.name(), error = %e, "device load failed");
            }
            self.registry.add(worker);
        }

        self.sinks = sinks::build_sinks(&snapshot);
        self.builder = Some(EventBuilder::new(
            self.registry.workers().to_vec(),
            self.sinks.clone(),
            &snapshot.document().builder,
        ));
        self.snapshot = Some(snapshot);
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        let Some(builder) = self.builder.as_mut() else {
            return Ok(());
        };
        let settings = self
            .snapshot
            .as_ref()
            .map(|s| s.document().controller.clone())
            .unwrap_or_default();
        let poll = Duration::from_millis(settings.drain_poll_ms.max(1));
        let deadline = settings.drain_timeout_ms.map(Duration::from_millis);

        let started = Instant::now();
        builder.stop();
        let result = loop {
            if builder.is_finished() {
                break Ok(());
            }
            if let Some(limit) = deadline {
                if started.elapsed() >= limit {
                    let e = RunError::DrainTimeout {
                        timeout_ms: limit.as_millis() as u64,
                    };
                    error!(error = %e, delivered = builder.delivered(), "aborting event builder");
                    builder.abort();
                    break Err(e);
                }
            }
            thread::sleep(poll);
        };

        let waited = started.elapsed();
        metrics::record_drain_duration_ms(waited.as_secs_f64() * 1000.0);
        debug!(waited_ms = waited.as_millis() as u64, "drain finished");
        result
    }

    /// Drop the builder, join every worker and release the sinks
    ///
    /// The snapshot is kept until the next start for inspection.
    fn teardown(&mut self) {
        if let Some(builder) = self.builder.take() {
            self.last_summary = Some(builder.stats().summary());
        }
        self.registry.clear();
        self.sinks.clear();
    }
}

impl Drop for RunController {
    fn drop(&mut self) {
        if let Err(e) = self.stop_run() {
            warn!(error = %e, "stop on drop failed");
        }
    }
}

impl std::fmt::Debug for RunController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunController")
            .field("source", &self.source.describe())
            .field("state", &self.state())
            .field("workers", &self.registry.len())
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_loader::StaticConfigSource;
    use contracts::{ConfigDocument, DeviceEntry, EventFrame, FakeFrame};
    use devices::{ScriptedDevice, SCRIPTED_TAG};
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn scripted_factory(frames: usize) -> DeviceFactory {
        let mut factory = DeviceFactory::new();
        factory.register(SCRIPTED_TAG, move |name| {
            let frames = (0..frames as u64)
                .map(|i| {
                    EventFrame::Fake(FakeFrame {
                        timestamp: vec![i],
                        trace: vec![vec![0]],
                    })
                })
                .collect();
            Box::new(ScriptedDevice::new(name, frames, Duration::ZERO))
        });
        factory
    }

    fn document(dir: &Path, workers: &[&str]) -> ConfigDocument {
        let mut doc: ConfigDocument = serde_json::from_value(serde_json::json!({
            "data_dir": dir.join("data"),
            "writers": { "file": { "in_use": true } },
            "worker": { "poll_interval_us": 50 },
            "builder": { "poll_interval_us": 50 },
        }))
        .unwrap();
        let entries: BTreeMap<_, _> = workers
            .iter()
            .map(|name| (name.to_string(), DeviceEntry::Inline(serde_json::Value::Null)))
            .collect();
        if !entries.is_empty() {
            doc.devices.insert(SCRIPTED_TAG.to_string(), entries);
        }
        doc
    }

    fn controller(dir: &Path, workers: &[&str], frames: usize) -> RunController {
        let source = StaticConfigSource::new(document(dir, workers)).with_base_dir(dir);
        RunController::new(Box::new(source), scripted_factory(frames))
    }

    #[test]
    fn test_start_stop_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctl = controller(dir.path(), &["a", "b"], 3);

        ctl.handle_message(b"START:42").unwrap();
        assert_eq!(ctl.state(), RunState::Running);
        assert_eq!(ctl.registry().len(), 2);
        assert_eq!(
            ctl.output_target(),
            Some(dir.path().join("data").join("run_42.jsonl").as_path())
        );

        thread::sleep(Duration::from_millis(50));
        ctl.handle_message(b"STOP").unwrap();
        assert_eq!(ctl.state(), RunState::Idle);
        assert!(ctl.registry().is_empty());

        let summary = ctl.last_summary().unwrap();
        assert_eq!(summary.composites, 3);
        let written = std::fs::read_to_string(dir.path().join("data/run_42.jsonl")).unwrap();
        assert_eq!(written.lines().count(), 3);
    }

    #[test]
    fn test_start_while_running_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctl = controller(dir.path(), &["a"], 0);

        ctl.handle_command(Command::Start(RunNumber(1))).unwrap();
        ctl.handle_command(Command::Start(RunNumber(2))).unwrap();
        assert_eq!(ctl.snapshot().map(RunSnapshot::run), Some(RunNumber(1)));
        assert_eq!(ctl.registry().len(), 1);
        ctl.handle_command(Command::Stop).unwrap();
    }

    #[test]
    fn test_stop_while_idle_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctl = controller(dir.path(), &["a"], 0);

        ctl.handle_command(Command::Stop).unwrap();
        assert_eq!(ctl.state(), RunState::Idle);
        assert!(ctl.registry().is_empty());
        assert!(ctl.snapshot().is_none());
    }

    #[test]
    fn test_malformed_message_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctl = controller(dir.path(), &["a"], 0);

        ctl.handle_message(b"START:nope").unwrap();
        ctl.handle_message(b"HELLO").unwrap();
        assert_eq!(ctl.state(), RunState::Idle);
    }

    #[test]
    fn test_config_failure_leaves_idle() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = document(dir.path(), &[]);
        let mut entries = BTreeMap::new();
        entries.insert(
            "missing".to_string(),
            DeviceEntry::Path(PathBuf::from("does/not/exist.json")),
        );
        doc.devices.insert(SCRIPTED_TAG.to_string(), entries);

        let source = StaticConfigSource::new(doc).with_base_dir(dir.path());
        let mut ctl = RunController::new(Box::new(source), scripted_factory(0));

        assert!(matches!(
            ctl.handle_command(Command::Start(RunNumber(1))),
            Err(RunError::Config(_))
        ));
        assert_eq!(ctl.state(), RunState::Idle);
        assert!(ctl.registry().is_empty());
    }

    #[test]
    fn test_unknown_device_tag_aborts_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = document(dir.path(), &[]);
        let mut entries = BTreeMap::new();
        entries.insert("x".to_string(), DeviceEntry::Inline(serde_json::Value::Null));
        doc.devices.insert("caen_6742".to_string(), entries);

        let source = StaticConfigSource::new(doc).with_base_dir(dir.path());
        let mut ctl = RunController::new(Box::new(source), scripted_factory(0));

        assert!(matches!(
            ctl.handle_command(Command::Start(RunNumber(1))),
            Err(RunError::Device(_))
        ));
        assert_eq!(ctl.state(), RunState::Idle);
    }

    #[test]
    fn test_zero_workers_stop_does_not_block() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctl = controller(dir.path(), &[], 0);

        ctl.handle_command(Command::Start(RunNumber(5))).unwrap();
        let started = Instant::now();
        ctl.handle_command(Command::Stop).unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(ctl.last_summary().map(|s| s.composites), Some(0));
    }

    #[test]
    fn test_serve_stops_run_when_channel_closes() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctl = controller(dir.path(), &["a"], 1);
        let (tx, rx) = mpsc::channel(4);

        tx.blocking_send(Bytes::from_static(b"START:9")).unwrap();
        drop(tx);
        ctl.serve(rx);

        assert_eq!(ctl.state(), RunState::Idle);
        assert!(ctl.registry().is_empty());
    }
}
