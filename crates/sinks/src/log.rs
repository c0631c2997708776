//! LogSink - logs a composite event summary via tracing

use contracts::{CompositeEvent, ContractError, EventSink};
use tracing::{info, instrument};

/// Sink that logs composite event summaries
pub struct LogSink {
    name: String,
    written: u64,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            written: 0,
        }
    }

    fn log_event_summary(&self, event: &CompositeEvent) {
        let workers: Vec<&str> = event.frames.iter().map(|f| f.worker.as_str()).collect();
        info!(
            sink = %self.name,
            seq = event.seq,
            frames = event.frames.len(),
            workers = ?workers,
            flagged = event.alignment_flag.is_some(),
            "CompositeEvent received"
        );
    }
}

impl EventSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self) -> Result<(), ContractError> {
        self.written = 0;
        info!(sink = %self.name, "LogSink started");
        Ok(())
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, event),
        fields(sink = %self.name, seq = event.seq)
    )]
    fn write(&mut self, event: &CompositeEvent) -> Result<(), ContractError> {
        self.log_event_summary(event);
        self.written += 1;
        Ok(())
    }

    #[instrument(name = "log_sink_stop", skip(self))]
    fn stop(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, written = self.written, "LogSink stopped");
        Ok(())
    }
}
