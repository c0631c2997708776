//! ConfigDocument - persisted front-end configuration
//!
//! The document names every device entry and every writer. A run never sees
//! the document directly: `config_loader` turns it into a run-scoped snapshot.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Persisted configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    /// Address the control bridge listens on
    #[serde(default = "default_control_addr", alias = "trigger_port")]
    pub control_addr: String,

    /// Address the heartbeat bridge listens on
    #[serde(default = "default_heartbeat_addr", alias = "handshake_port")]
    pub heartbeat_addr: String,

    /// Directory per-run output targets are derived into
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Device-type tag -> device name -> entry
    #[serde(default)]
    pub devices: BTreeMap<String, BTreeMap<String, DeviceEntry>>,

    /// Writer-type tag -> writer entry
    #[serde(default)]
    pub writers: BTreeMap<String, WriterEntry>,

    #[serde(default)]
    pub worker: WorkerSettings,

    #[serde(default)]
    pub builder: BuilderSettings,

    #[serde(default)]
    pub controller: ControllerSettings,
}

fn default_control_addr() -> String {
    "127.0.0.1:42040".to_string()
}

fn default_heartbeat_addr() -> String {
    "127.0.0.1:42041".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for ConfigDocument {
    fn default() -> Self {
        Self {
            control_addr: default_control_addr(),
            heartbeat_addr: default_heartbeat_addr(),
            data_dir: default_data_dir(),
            devices: BTreeMap::new(),
            writers: BTreeMap::new(),
            worker: WorkerSettings::default(),
            builder: BuilderSettings::default(),
            controller: ControllerSettings::default(),
        }
    }
}

impl ConfigDocument {
    /// Iterate device entries as (tag, name, entry), ordered by tag then name
    pub fn device_entries(&self) -> impl Iterator<Item = (&str, &str, &DeviceEntry)> {
        self.devices.iter().flat_map(|(tag, entries)| {
            entries
                .iter()
                .map(move |(name, entry)| (tag.as_str(), name.as_str(), entry))
        })
    }

    /// Number of configured devices
    pub fn device_count(&self) -> usize {
        self.devices.values().map(BTreeMap::len).sum()
    }

    /// Writer tags with `in_use` set
    pub fn enabled_writers(&self) -> impl Iterator<Item = (&str, &WriterEntry)> {
        self.writers
            .iter()
            .filter(|(_, entry)| entry.in_use)
            .map(|(tag, entry)| (tag.as_str(), entry))
    }
}

/// Device entry: either a path to a sub-configuration file or an inline object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeviceEntry {
    /// Path, resolved relative to the document
    Path(PathBuf),
    /// Inline sub-configuration
    Inline(serde_json::Value),
}

/// Writer entry: `{ in_use: bool, ...type-specific fields }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriterEntry {
    #[serde(default)]
    pub in_use: bool,

    /// Type-specific fields (e.g. `file`, `addr`, `format`)
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl WriterEntry {
    /// String field lookup
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(serde_json::Value::as_str)
    }
}

/// Worker polling settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSettings {
    /// Sleep between polling iterations (microseconds)
    #[serde(default = "default_poll_interval_us")]
    pub poll_interval_us: u64,
}

fn default_poll_interval_us() -> u64 {
    100
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            poll_interval_us: default_poll_interval_us(),
        }
    }
}

/// EventBuilder settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuilderSettings {
    /// Sleep between merge iterations (microseconds)
    #[serde(default = "default_poll_interval_us")]
    pub poll_interval_us: u64,

    #[serde(default)]
    pub alignment: AlignmentConfig,
}

impl Default for BuilderSettings {
    fn default() -> Self {
        Self {
            poll_interval_us: default_poll_interval_us(),
            alignment: AlignmentConfig::default(),
        }
    }
}

/// Alignment validation applied to each assembled set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AlignmentConfig {
    /// Pure position zipping, never flags
    #[default]
    Position,
    /// Flag sets whose channel-0 timestamps spread wider than `max_spread` ticks
    TimestampSpread { max_spread: u64 },
}

/// RunController settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerSettings {
    /// Interval between `is_finished` checks during the stop sequence (milliseconds)
    #[serde(default = "default_drain_poll_ms")]
    pub drain_poll_ms: u64,

    /// Upper bound on the drain wait; unbounded when absent
    #[serde(default)]
    pub drain_timeout_ms: Option<u64>,

    /// Where to write each run's snapshot for external inspection
    #[serde(default)]
    pub inspect_path: Option<PathBuf>,
}

fn default_drain_poll_ms() -> u64 {
    1
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            drain_poll_ms: default_drain_poll_ms(),
            drain_timeout_ms: None,
            inspect_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_document_defaults() {
        let doc: ConfigDocument = serde_json::from_str("{}").unwrap();
        assert_eq!(doc, ConfigDocument::default());
        assert_eq!(doc.data_dir, PathBuf::from("data"));
        assert_eq!(doc.worker.poll_interval_us, 100);
        assert_eq!(doc.builder.alignment, AlignmentConfig::Position);
        assert!(doc.controller.drain_timeout_ms.is_none());
    }

    #[test]
    fn test_device_entries_path_and_inline() {
        let doc: ConfigDocument = serde_json::from_value(serde_json::json!({
            "devices": {
                "fake": { "fake_0": "fake_0.json", "fake_1": { "rate": 5.0 } },
                "sis_3350": { "sis_3350_0": "sis.json" }
            }
        }))
        .unwrap();

        assert_eq!(doc.device_count(), 3);
        let entries: Vec<_> = doc.device_entries().collect();
        assert_eq!(entries[0].0, "fake");
        assert_eq!(entries[0].1, "fake_0");
        assert!(matches!(entries[0].2, DeviceEntry::Path(_)));
        assert!(matches!(entries[1].2, DeviceEntry::Inline(_)));
        assert_eq!(entries[2].1, "sis_3350_0");
    }

    #[test]
    fn test_writer_fields_flattened() {
        let doc: ConfigDocument = serde_json::from_value(serde_json::json!({
            "writers": {
                "file": { "in_use": true, "file": "ignored.jsonl" },
                "online": { "in_use": false, "addr": "127.0.0.1:9999" }
            }
        }))
        .unwrap();

        let enabled: Vec<_> = doc.enabled_writers().map(|(tag, _)| tag).collect();
        assert_eq!(enabled, vec!["file"]);
        assert_eq!(doc.writers["online"].str_field("addr"), Some("127.0.0.1:9999"));
    }

    #[test]
    fn test_port_key_aliases() {
        let doc: ConfigDocument = serde_json::from_value(serde_json::json!({
            "trigger_port": "0.0.0.0:5000",
            "handshake_port": "0.0.0.0:5001"
        }))
        .unwrap();
        assert_eq!(doc.control_addr, "0.0.0.0:5000");
        assert_eq!(doc.heartbeat_addr, "0.0.0.0:5001");
    }

    #[test]
    fn test_alignment_mode_tag() {
        let settings: BuilderSettings = serde_json::from_value(serde_json::json!({
            "alignment": { "mode": "timestamp_spread", "max_spread": 8 }
        }))
        .unwrap();
        assert_eq!(
            settings.alignment,
            AlignmentConfig::TimestampSpread { max_spread: 8 }
        );
    }
}
