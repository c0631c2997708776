//! Sink factory - builds the enabled writer set from a run snapshot

use std::sync::Arc;

use config_loader::RunSnapshot;
use contracts::{EventSink, SharedSink, WriterEntry};
use parking_lot::Mutex;
use tracing::{debug, instrument, warn};

use crate::error::SinkError;
use crate::{FileSink, LogSink, OnlineSink};

/// Writer tag for the JSON-lines output file
pub const FILE_TAG: &str = "file";
/// Writer tag for UDP telemetry
pub const ONLINE_TAG: &str = "online";
/// Writer tag for the tracing summary sink
pub const LOG_TAG: &str = "log";

/// Writer tags this factory can build
pub const KNOWN_TAGS: &[&str] = &[FILE_TAG, ONLINE_TAG, LOG_TAG];

fn share<S: EventSink + 'static>(sink: S) -> SharedSink {
    Arc::new(Mutex::new(sink))
}

/// Create one sink from its writer entry
#[instrument(name = "sink_factory_create", skip(entry))]
pub fn create_sink(tag: &str, entry: &WriterEntry) -> Result<SharedSink, SinkError> {
    match tag {
        FILE_TAG => Ok(share(FileSink::from_entry(tag, entry)?)),
        ONLINE_TAG => Ok(share(OnlineSink::from_entry(tag, entry)?)),
        LOG_TAG => Ok(share(LogSink::new(tag))),
        other => Err(SinkError::UnknownTag(other.to_string())),
    }
}

/// Build every writer with `in_use` set
///
/// Writers that cannot be built are logged and skipped.
#[instrument(name = "sink_factory_build", skip(snapshot), fields(run = %snapshot.run()))]
pub fn build_sinks(snapshot: &RunSnapshot) -> Vec<SharedSink> {
    let mut sinks = Vec::new();
    for (tag, entry) in snapshot.document().enabled_writers() {
        match create_sink(tag, entry) {
            Ok(sink) => {
                debug!(writer = tag, "sink created");
                sinks.push(sink);
            }
            Err(e) => warn!(writer = tag, error = %e, "writer skipped"),
        }
    }
    sinks
}
