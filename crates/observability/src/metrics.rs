//! Front-end metrics
//!
//! Recording helpers over the `metrics` facade, plus an in-memory run
//! aggregator summarised at teardown.

use std::collections::BTreeMap;

use contracts::{CompositeEvent, RunState};
use metrics::{counter, gauge, histogram};

/// Record one frame pushed into a worker queue
pub fn record_frame_pushed(worker: &str, depth: usize) {
    counter!("fe_master_frames_pushed_total", "worker" => worker.to_string()).increment(1);
    record_queue_depth(worker, depth);
}

/// Record a worker queue depth
pub fn record_queue_depth(worker: &str, depth: usize) {
    gauge!("fe_master_queue_depth", "worker" => worker.to_string()).set(depth as f64);
}

/// Record a failed device fetch
pub fn record_fetch_error(worker: &str) {
    counter!("fe_master_fetch_errors_total", "worker" => worker.to_string()).increment(1);
}

/// Record a composite event assembled by the builder
pub fn record_composite_built(event: &CompositeEvent) {
    counter!("fe_master_composites_total").increment(1);
    gauge!("fe_master_last_composite_seq").set(event.seq as f64);
    if event.alignment_flag.is_some() {
        counter!("fe_master_alignment_flags_total").increment(1);
    }
}

/// Record one sink delivery
pub fn record_sink_write(sink: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "fe_master_sink_writes_total",
        "sink" => sink.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a run state transition
pub fn record_run_state(state: RunState) {
    gauge!("fe_master_run_state").set(state.as_gauge());
}

/// Record how long the stop sequence waited for the builder to drain
pub fn record_drain_duration_ms(ms: f64) {
    histogram!("fe_master_drain_duration_ms").record(ms);
}

/// Record a control command received
pub fn record_command(command: &str) {
    counter!("fe_master_commands_total", "command" => command.to_string()).increment(1);
}

/// Per-run aggregator
///
/// Fed by the builder thread, summarised once the run is torn down.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Composite events delivered
    pub composites: u64,

    /// Composite events flagged by the alignment check
    pub alignment_flags: u64,

    /// Sink write failures per sink
    pub sink_failures: BTreeMap<String, u64>,

    /// Channel-0 timestamp spread across frames of one composite
    pub timestamp_spread: RunningStats,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update with one delivered composite event
    pub fn update(&mut self, event: &CompositeEvent) {
        self.composites += 1;
        if event.alignment_flag.is_some() {
            self.alignment_flags += 1;
        }

        let stamps = event.frames.iter().filter_map(|f| f.frame.timestamp(0));
        let (min, max) = stamps.fold((u64::MAX, 0u64), |(lo, hi), ts| (lo.min(ts), hi.max(ts)));
        if event.frames.len() > 1 && min <= max {
            self.timestamp_spread.push((max - min) as f64);
        }
    }

    /// Record one sink failure
    pub fn record_sink_failure(&mut self, sink: &str) {
        *self.sink_failures.entry(sink.to_string()).or_insert(0) += 1;
    }

    /// Summary report
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            composites: self.composites,
            alignment_flags: self.alignment_flags,
            flag_rate: if self.composites > 0 {
                self.alignment_flags as f64 / self.composites as f64 * 100.0
            } else {
                0.0
            },
            sink_failures: self.sink_failures.clone(),
            timestamp_spread: StatsSummary::from(&self.timestamp_spread),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Run summary
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub composites: u64,
    pub alignment_flags: u64,
    pub flag_rate: f64,
    pub sink_failures: BTreeMap<String, u64>,
    pub timestamp_spread: StatsSummary,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Run Summary ===")?;
        writeln!(f, "Composite events: {}", self.composites)?;
        writeln!(
            f,
            "Alignment flags: {} ({:.2}%)",
            self.alignment_flags, self.flag_rate
        )?;
        writeln!(f, "Timestamp spread (ticks): {}", self.timestamp_spread)?;

        if !self.sink_failures.is_empty() {
            writeln!(f, "Sink failures:")?;
            for (sink, count) in &self.sink_failures {
                writeln!(f, "  {}: {}", sink, count)?;
            }
        }

        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a sample
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{EventFrame, FakeFrame, WorkerFrame};

    fn composite(seq: u64, stamps: &[u64], flagged: bool) -> CompositeEvent {
        CompositeEvent {
            seq,
            frames: stamps
                .iter()
                .enumerate()
                .map(|(i, ts)| WorkerFrame {
                    worker: format!("w{i}"),
                    position: seq,
                    frame: EventFrame::Fake(FakeFrame {
                        timestamp: vec![*ts],
                        trace: vec![vec![0]],
                    }),
                })
                .collect(),
            alignment_flag: flagged.then(|| "spread".to_string()),
        }
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_run_stats_update() {
        let mut stats = RunStats::new();
        stats.update(&composite(0, &[100, 104], false));
        stats.update(&composite(1, &[200, 200], true));
        stats.record_sink_failure("file");

        let summary = stats.summary();
        assert_eq!(summary.composites, 2);
        assert_eq!(summary.alignment_flags, 1);
        assert!((summary.flag_rate - 50.0).abs() < 1e-10);
        assert_eq!(summary.timestamp_spread.count, 2);
        assert!((summary.timestamp_spread.max - 4.0).abs() < 1e-10);
        assert_eq!(summary.sink_failures.get("file"), Some(&1));
    }

    #[test]
    fn test_single_frame_has_no_spread() {
        let mut stats = RunStats::new();
        stats.update(&composite(0, &[5], false));
        assert_eq!(stats.timestamp_spread.count(), 0);
    }

    #[test]
    fn test_summary_display() {
        let mut stats = RunStats::new();
        stats.update(&composite(0, &[1, 2], false));
        let text = stats.summary().to_string();
        assert!(text.contains("Composite events: 1"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_frame_pushed("w0", 3);
        record_fetch_error("w0");
        record_composite_built(&composite(0, &[1], true));
        record_sink_write("log", true);
        record_run_state(RunState::Running);
        record_drain_duration_ms(1.5);
        record_command("start");
    }
}
