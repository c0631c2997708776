//! # Sinks
//!
//! Composite event consumers.
//!
//! Responsibilities:
//! - Persist each run to its output target (JSON lines)
//! - Stream live telemetry over UDP
//! - Build the enabled writer set from a run snapshot

pub mod error;
pub mod factory;
mod file;
mod log;
mod memory;
mod online;

pub use contracts::{EventSink, SharedSink};
pub use error::SinkError;
pub use factory::{build_sinks, create_sink, FILE_TAG, KNOWN_TAGS, LOG_TAG, ONLINE_TAG};
pub use file::{FileSink, FileSinkConfig};
pub use log::LogSink;
pub use memory::{EventLog, MemorySink};
pub use online::{OnlineFormat, OnlineSink, OnlineSinkConfig, DEFAULT_MAX_PACKET_SIZE};
