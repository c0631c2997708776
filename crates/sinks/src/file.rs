//! FileSink - writes composite events to the run's output target
//!
//! One JSON document per line. The file is created (or truncated) on
//! `start` and flushed on `stop`.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use config_loader::FILE_WRITER_PATH;
use contracts::{CompositeEvent, ContractError, EventSink, WriterEntry};
use tracing::{debug, error, info, instrument};

use crate::error::SinkError;

/// Configuration for FileSink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSinkConfig {
    /// Output file path
    pub path: PathBuf,
}

impl FileSinkConfig {
    /// Config from a writer entry; the path is the injected output target
    pub fn from_entry(name: &str, entry: &WriterEntry) -> Result<Self, SinkError> {
        let path = entry.str_field(FILE_WRITER_PATH).ok_or_else(|| {
            SinkError::sink_creation(name, format!("missing '{FILE_WRITER_PATH}' field"))
        })?;
        Ok(Self {
            path: PathBuf::from(path),
        })
    }
}

/// Sink that appends JSON lines to a file
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    writer: Option<BufWriter<File>>,
    written: u64,
}

impl FileSink {
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> Self {
        Self {
            name: name.into(),
            config,
            writer: None,
            written: 0,
        }
    }

    /// Create from a writer entry (for factory)
    pub fn from_entry(name: impl Into<String>, entry: &WriterEntry) -> Result<Self, SinkError> {
        let name = name.into();
        let config = FileSinkConfig::from_entry(&name, entry)?;
        Ok(Self::new(name, config))
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    fn open(&self) -> std::io::Result<BufWriter<File>> {
        if let Some(parent) = self.config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        File::create(&self.config.path).map(BufWriter::new)
    }

    fn persist_event(&mut self, event: &CompositeEvent) -> Result<(), ContractError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| ContractError::sink_lifecycle(&self.name, "write before start"))?;

        serde_json::to_writer(&mut *writer, event)
            .map_err(std::io::Error::from)
            .and_then(|()| writer.write_all(b"\n"))
            .map_err(|e| {
                error!(sink = %self.name, seq = event.seq, error = %e, "Write failed");
                ContractError::sink_write(&self.name, e.to_string())
            })
    }
}

impl EventSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "file_sink_start", skip(self), fields(sink = %self.name, path = %self.config.path.display()))]
    fn start(&mut self) -> Result<(), ContractError> {
        let writer = self
            .open()
            .map_err(|e| ContractError::sink_lifecycle(&self.name, e.to_string()))?;
        self.writer = Some(writer);
        self.written = 0;
        info!(sink = %self.name, path = %self.config.path.display(), "FileSink opened");
        Ok(())
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, event),
        fields(sink = %self.name, seq = event.seq)
    )]
    fn write(&mut self, event: &CompositeEvent) -> Result<(), ContractError> {
        self.persist_event(event)?;
        self.written += 1;
        Ok(())
    }

    #[instrument(name = "file_sink_stop", skip(self))]
    fn stop(&mut self) -> Result<(), ContractError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        writer
            .flush()
            .map_err(|e| ContractError::sink_lifecycle(&self.name, e.to_string()))?;
        debug!(sink = %self.name, written = self.written, "FileSink closed");
        Ok(())
    }
}
