//! # Integration Tests
//!
//! Cross-crate scenario tests.
//!
//! Covers:
//! - Worker FIFO and builder lock-step properties
//! - Controller start/stop sequencing, idempotence and reload cycles
//! - Hardened drain with a stalled device
//! - File-backed configuration with built-in fake devices

#[cfg(test)]
mod support {
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use config_loader::StaticConfigSource;
    use contracts::{ConfigDocument, DeviceEntry, EventFrame, FakeFrame, WorkerSettings};
    use devices::{DeviceFactory, ScriptedDevice, SCRIPTED_TAG};
    use run_control::RunController;
    use workers::Worker;

    pub fn marker(value: u64) -> EventFrame {
        EventFrame::Fake(FakeFrame {
            timestamp: vec![value],
            trace: vec![vec![value as u16; 4]],
        })
    }

    pub fn scripted_worker(name: &str, stamps: &[u64], delay: Duration) -> Arc<Worker> {
        let frames = stamps.iter().copied().map(marker).collect();
        let device = ScriptedDevice::new(name, frames, delay);
        let settings = WorkerSettings {
            poll_interval_us: 50,
        };
        Arc::new(Worker::new(name, Box::new(device), &settings).expect("spawn worker"))
    }

    /// Script per device name: (timestamps, per-frame delay)
    pub type Scripts = HashMap<String, (Vec<u64>, Duration)>;

    pub fn scripted_factory(scripts: Scripts) -> DeviceFactory {
        let scripts = Arc::new(scripts);
        let mut factory = DeviceFactory::new();
        factory.register(SCRIPTED_TAG, move |name| {
            let (stamps, delay) = scripts.get(name).cloned().unwrap_or_default();
            let frames = stamps.into_iter().map(marker).collect();
            Box::new(ScriptedDevice::new(name, frames, delay))
        });
        factory
    }

    pub fn document(dir: &Path, names: &[&str], extra: serde_json::Value) -> ConfigDocument {
        let mut value = serde_json::json!({
            "data_dir": dir.join("data"),
            "writers": { "file": { "in_use": true } },
            "worker": { "poll_interval_us": 50 },
            "builder": { "poll_interval_us": 50 },
        });
        if let (Some(base), serde_json::Value::Object(extra)) = (value.as_object_mut(), extra) {
            base.extend(extra);
        }
        let mut doc: ConfigDocument = serde_json::from_value(value).expect("document");
        if !names.is_empty() {
            doc.devices.insert(
                SCRIPTED_TAG.to_string(),
                names
                    .iter()
                    .map(|n| (n.to_string(), DeviceEntry::Inline(serde_json::Value::Null)))
                    .collect(),
            );
        }
        doc
    }

    pub fn controller(doc: ConfigDocument, dir: &Path, scripts: Scripts) -> RunController {
        let source = StaticConfigSource::new(doc).with_base_dir(dir);
        RunController::new(Box::new(source), scripted_factory(scripts))
    }

    pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        cond()
    }

    pub fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .expect("output file")
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect()
    }
}

#[cfg(test)]
mod worker_tests {
    use std::time::Duration;

    use crate::support::{scripted_worker, wait_until};

    /// N pushes come back as N pops in push order; the flag drops after the Nth
    #[test]
    fn test_fifo_order_for_long_stream() {
        let stamps: Vec<u64> = (0..200).collect();
        let worker = scripted_worker("w", &stamps, Duration::ZERO);
        worker.start();
        assert!(wait_until(Duration::from_secs(5), || worker.stats().pushed == 200));
        worker.stop();

        for expected in 0..200u64 {
            assert!(worker.is_event_available());
            let frame = worker.pop_event().expect("frame");
            assert_eq!(frame.timestamp(0), Some(expected));
        }
        assert!(!worker.is_event_available());
    }

    /// Popping while the producer is still pushing keeps the order intact
    #[test]
    fn test_fifo_under_concurrent_pop() {
        let stamps: Vec<u64> = (0..100).collect();
        let worker = scripted_worker("w", &stamps, Duration::from_micros(200));
        worker.start();

        let mut seen = Vec::new();
        assert!(wait_until(Duration::from_secs(10), || {
            while worker.is_event_available() {
                if let Some(frame) = worker.pop_event() {
                    seen.extend(frame.timestamp(0));
                }
            }
            seen.len() == 100
        }));
        assert_eq!(seen, stamps);
    }
}

#[cfg(test)]
mod builder_tests {
    use std::time::Duration;

    use contracts::BuilderSettings;
    use event_builder::EventBuilder;
    use sinks::MemorySink;

    use crate::support::{scripted_worker, wait_until};

    /// Two workers at independent rates pair strictly by position
    #[test]
    fn test_scenario_a_pairs_by_position() {
        let a = scripted_worker("A", &[0, 1, 2], Duration::from_millis(2));
        let b = scripted_worker("B", &[100, 101, 102], Duration::from_millis(17));
        let first = MemorySink::new("first");
        let second = MemorySink::new("second");

        let mut builder = EventBuilder::new(
            vec![a.clone(), b.clone()],
            vec![first.shared(), second.shared()],
            &BuilderSettings::default(),
        );
        builder.start().expect("builder start");
        a.start();
        b.start();

        assert!(wait_until(Duration::from_secs(5), || first.events().lock().len() == 3));
        builder.stop();
        assert!(wait_until(Duration::from_secs(2), || builder.is_finished()));
        assert!(!a.is_event_available());
        assert!(!b.is_event_available());

        for sink in [&first, &second] {
            let events = sink.events();
            let events = events.lock();
            let pairs: Vec<_> = events
                .iter()
                .map(|e| {
                    (
                        e.frame_of("A").and_then(|f| f.timestamp(0)),
                        e.frame_of("B").and_then(|f| f.timestamp(0)),
                    )
                })
                .collect();
            assert_eq!(
                pairs,
                [
                    (Some(0), Some(100)),
                    (Some(1), Some(101)),
                    (Some(2), Some(102))
                ]
            );
            assert!(events.iter().all(|e| e.is_lockstep()));
        }
    }

    /// Three workers with skewed rates never yield mixed positions
    #[test]
    fn test_positions_identical_within_every_event() {
        let stamps: Vec<u64> = (0..20).collect();
        let workers = vec![
            scripted_worker("x", &stamps, Duration::ZERO),
            scripted_worker("y", &stamps, Duration::from_millis(1)),
            scripted_worker("z", &stamps, Duration::from_millis(3)),
        ];
        let sink = MemorySink::new("mem");

        let mut builder =
            EventBuilder::new(workers.clone(), vec![sink.shared()], &BuilderSettings::default());
        builder.start().expect("builder start");
        workers.iter().for_each(|w| w.start());

        assert!(wait_until(Duration::from_secs(5), || sink.events().lock().len() == 20));
        builder.stop();
        assert!(wait_until(Duration::from_secs(2), || builder.is_finished()));

        for (seq, event) in sink.events().lock().iter().enumerate() {
            assert_eq!(event.seq, seq as u64);
            assert!(event.frames.iter().all(|f| f.position == seq as u64));
        }
    }
}

#[cfg(test)]
mod controller_tests {
    use std::collections::HashMap;
    use std::thread;
    use std::time::{Duration, Instant};

    use bytes::Bytes;
    use contracts::{RunNumber, RunState};
    use run_control::{Command, RunError};
    use tokio::sync::mpsc;

    use crate::support::{controller, document, read_lines, Scripts};

    fn scripts(entries: &[(&str, &[u64], u64)]) -> Scripts {
        entries
            .iter()
            .map(|(name, stamps, delay_ms)| {
                (
                    name.to_string(),
                    (stamps.to_vec(), Duration::from_millis(*delay_ms)),
                )
            })
            .collect()
    }

    /// START:42 then STOP resolves the run-42 target and empties the registry
    #[test]
    fn test_scenario_b_output_target_and_teardown() {
        let dir = tempfile::tempdir().unwrap();
        let doc = document(dir.path(), &["a", "b"], serde_json::json!({}));
        let mut ctl = controller(
            doc,
            dir.path(),
            scripts(&[("a", &[1, 2], 0), ("b", &[3, 4], 0)]),
        );

        ctl.handle_message(b"START:42").unwrap();
        assert_eq!(ctl.state(), RunState::Running);
        thread::sleep(Duration::from_millis(30));
        ctl.handle_message(b"STOP").unwrap();

        let expected = dir.path().join("data").join("run_42.jsonl");
        assert_eq!(ctl.output_target(), Some(expected.as_path()));
        assert!(ctl.registry().is_empty());
        assert_eq!(ctl.state(), RunState::Idle);

        let lines = read_lines(&expected);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["frames"][0]["worker"], "a");
        assert_eq!(lines[0]["frames"][1]["worker"], "b");
    }

    #[test]
    fn test_stop_while_idle_leaves_everything_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let doc = document(dir.path(), &["a"], serde_json::json!({}));
        let mut ctl = controller(doc, dir.path(), HashMap::new());

        ctl.handle_message(b"STOP").unwrap();
        ctl.handle_message(b"STOP\0").unwrap();
        assert_eq!(ctl.state(), RunState::Idle);
        assert!(ctl.registry().is_empty());
        assert!(ctl.snapshot().is_none());
    }

    #[test]
    fn test_start_while_running_keeps_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let doc = document(dir.path(), &["a"], serde_json::json!({}));
        let mut ctl = controller(doc, dir.path(), scripts(&[("a", &[1], 0)]));

        ctl.handle_command(Command::Start(RunNumber(1))).unwrap();
        let first_worker = ctl.registry().workers()[0].clone();
        ctl.handle_command(Command::Start(RunNumber(2))).unwrap();

        assert_eq!(ctl.registry().len(), 1);
        assert!(std::sync::Arc::ptr_eq(&first_worker, &ctl.registry().workers()[0]));
        assert_eq!(
            ctl.output_target(),
            Some(dir.path().join("data").join("run_1.jsonl").as_path())
        );
        drop(first_worker);
        ctl.handle_command(Command::Stop).unwrap();
    }

    #[test]
    fn test_zero_workers_stop_returns_promptly() {
        let dir = tempfile::tempdir().unwrap();
        let doc = document(dir.path(), &[], serde_json::json!({}));
        let mut ctl = controller(doc, dir.path(), HashMap::new());

        ctl.handle_command(Command::Start(RunNumber(7))).unwrap();
        let started = Instant::now();
        ctl.handle_command(Command::Stop).unwrap();
        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(read_lines(&dir.path().join("data/run_7.jsonl")).is_empty());
    }

    /// A device that never produces stalls the drain until the bound expires
    #[test]
    fn test_drain_timeout_aborts_and_returns_to_idle() {
        let dir = tempfile::tempdir().unwrap();
        let doc = document(
            dir.path(),
            &["live", "stalled"],
            serde_json::json!({ "controller": { "drain_poll_ms": 1, "drain_timeout_ms": 50 } }),
        );
        let mut ctl = controller(
            doc,
            dir.path(),
            scripts(&[("live", &[1, 2, 3], 0), ("stalled", &[], 0)]),
        );

        ctl.handle_command(Command::Start(RunNumber(3))).unwrap();
        thread::sleep(Duration::from_millis(20));

        let started = Instant::now();
        let result = ctl.handle_command(Command::Stop);
        assert!(matches!(result, Err(RunError::DrainTimeout { timeout_ms: 50 })));
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(ctl.state(), RunState::Idle);
        assert!(ctl.registry().is_empty());
        assert_eq!(ctl.last_summary().map(|s| s.composites), Some(0));
    }

    /// Every START rebuilds from a fresh snapshot; sequence numbers restart
    #[test]
    fn test_reload_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let doc = document(dir.path(), &["a", "b"], serde_json::json!({}));
        let mut ctl = controller(
            doc,
            dir.path(),
            scripts(&[("a", &[1, 2, 3], 0), ("b", &[4, 5, 6], 0)]),
        );

        for run in [10u64, 11] {
            ctl.handle_command(Command::Start(RunNumber(run))).unwrap();
            assert_eq!(ctl.registry().len(), 2);
            thread::sleep(Duration::from_millis(30));
            ctl.handle_command(Command::Stop).unwrap();
            assert!(ctl.registry().is_empty());

            let lines = read_lines(&dir.path().join(format!("data/run_{run}.jsonl")));
            let seqs: Vec<_> = lines.iter().map(|l| l["seq"].as_u64()).collect();
            assert_eq!(seqs, [Some(0), Some(1), Some(2)]);
        }
    }

    /// A device whose sub-configuration fails validation is logged and the run goes on
    #[test]
    fn test_rejected_device_config_does_not_abort_run() {
        let dir = tempfile::tempdir().unwrap();
        let doc = document(
            dir.path(),
            &[],
            serde_json::json!({
                "devices": {
                    "fake": {
                        "fake_bad": { "rate": 0.0, "trace_len": 8 },
                        "fake_good": { "rate": 200.0, "trace_len": 8, "seed": 3 }
                    }
                },
                "controller": { "drain_poll_ms": 1, "drain_timeout_ms": 2000 }
            }),
        );
        let mut ctl = controller(doc, dir.path(), HashMap::new());

        ctl.handle_command(Command::Start(RunNumber(9))).unwrap();
        assert_eq!(ctl.state(), RunState::Running);
        assert_eq!(ctl.registry().len(), 2);
        let bad = ctl.registry().get("fake_bad").unwrap().clone();
        // rejected settings fall back to the 10 Hz default
        assert!(crate::support::wait_until(Duration::from_secs(2), || {
            bad.stats().pushed > 0
        }));
        drop(bad);

        ctl.handle_command(Command::Stop).unwrap();
        assert_eq!(ctl.state(), RunState::Idle);
        assert!(ctl.registry().is_empty());
        assert!(!read_lines(&dir.path().join("data/run_9.jsonl")).is_empty());
    }

    /// Commands arrive over the channel the CLI bridge feeds
    #[test]
    fn test_serve_over_channel() {
        let dir = tempfile::tempdir().unwrap();
        let doc = document(dir.path(), &["a"], serde_json::json!({}));
        let mut ctl = controller(doc, dir.path(), scripts(&[("a", &[1, 2], 0)]));
        let (tx, rx) = mpsc::channel(8);

        let sender = thread::spawn(move || {
            for msg in [&b"garbage"[..], b"START:5\0", b"START:6"] {
                tx.blocking_send(Bytes::from_static(msg)).unwrap();
            }
            thread::sleep(Duration::from_millis(30));
            tx.blocking_send(Bytes::from_static(b"STOP")).unwrap();
        });

        ctl.serve(rx);
        sender.join().unwrap();

        assert_eq!(ctl.state(), RunState::Idle);
        assert_eq!(ctl.snapshot().map(|s| s.run()), Some(RunNumber(5)));
        assert_eq!(read_lines(&dir.path().join("data/run_5.jsonl")).len(), 2);
        assert!(!dir.path().join("data/run_6.jsonl").exists());
    }
}

#[cfg(test)]
mod config_tests {
    use std::thread;
    use std::time::Duration;

    use config_loader::FileConfigSource;
    use contracts::{RunNumber, RunState};
    use devices::DeviceFactory;
    use run_control::{Command, RunController};

    use crate::support::read_lines;

    /// TOML document with a device sub-configuration file and an inspect path
    #[test]
    fn test_fake_devices_from_config_files() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let inspect = dir.path().join("inspect").join("snapshot.json");

        std::fs::write(
            dir.path().join("fake_0.json"),
            r#"{ "channels": 2, "trace_len": 16, "rate": 500.0, "seed": 1 }"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("fe_master.toml"),
            format!(
                r#"
data_dir = "{data}"

[devices.fake]
fake_0 = "fake_0.json"
fake_1 = {{ channels = 2, trace_len = 16, rate = 500.0, seed = 2 }}

[writers.file]
in_use = true

[writers.log]
in_use = false

[worker]
poll_interval_us = 50

[controller]
drain_timeout_ms = 2000
inspect_path = "{inspect}"
"#,
                data = data_dir.display(),
                inspect = inspect.display(),
            ),
        )
        .unwrap();

        let source = FileConfigSource::new(dir.path().join("fe_master.toml"));
        let mut ctl = RunController::new(Box::new(source), DeviceFactory::new());

        ctl.handle_command(Command::Start(RunNumber(8))).unwrap();
        assert_eq!(ctl.state(), RunState::Running);
        assert_eq!(ctl.registry().len(), 2);
        thread::sleep(Duration::from_millis(100));
        ctl.handle_command(Command::Stop).unwrap();

        let snapshot: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&inspect).unwrap()).unwrap();
        assert_eq!(snapshot["run"], 8);
        assert_eq!(snapshot["devices"][0]["config"]["value"]["channels"], 2);

        let lines = read_lines(&data_dir.join("run_8.jsonl"));
        assert!(!lines.is_empty());
        for line in &lines {
            let frames = line["frames"].as_array().unwrap();
            assert_eq!(frames.len(), 2);
            assert_eq!(frames[0]["position"], frames[1]["position"]);
            assert_eq!(frames[0]["frame"]["kind"], "fake");
        }
    }
}
