//! RunSnapshot - run-scoped configuration
//!
//! Built fresh from the persisted document on every start. The per-run
//! output target is injected into the `file` writer entry and every device
//! sub-configuration is loaded up front. Nothing mutates a snapshot once a
//! run's workers exist.

use std::path::{Path, PathBuf};

use contracts::{ConfigDocument, ContractError, DeviceConfig, DeviceEntry, RunNumber};
use serde::Serialize;
use tracing::debug;

use crate::parser::{self, ConfigFormat};

/// Writer tag that receives the per-run output target
pub const FILE_WRITER: &str = "file";

/// Field of the file writer entry holding the output path
pub const FILE_WRITER_PATH: &str = "file";

/// One device to materialize as a worker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSpec {
    /// Device-type tag (factory key)
    pub tag: String,
    /// Loaded sub-configuration
    pub config: DeviceConfig,
}

impl DeviceSpec {
    /// Device entry name
    pub fn name(&self) -> &str {
        &self.config.name
    }
}

/// Immutable run-scoped configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSnapshot {
    run: RunNumber,
    output_target: PathBuf,
    document: ConfigDocument,
    devices: Vec<DeviceSpec>,
}

impl RunSnapshot {
    /// Build the snapshot for `run`
    ///
    /// `base_dir` resolves relative device sub-configuration paths.
    ///
    /// # Errors
    /// Any device sub-configuration that cannot be read or parsed.
    pub fn prepare(
        mut document: ConfigDocument,
        base_dir: &Path,
        run: RunNumber,
    ) -> Result<Self, ContractError> {
        let output_target = run.output_target(&document.data_dir);

        document
            .writers
            .entry(FILE_WRITER.to_string())
            .or_default()
            .fields
            .insert(
                FILE_WRITER_PATH.to_string(),
                serde_json::Value::String(output_target.to_string_lossy().into_owned()),
            );

        let devices = document
            .device_entries()
            .map(|(tag, name, entry)| {
                let value = load_device_entry(name, entry, base_dir)?;
                Ok(DeviceSpec {
                    tag: tag.to_string(),
                    config: DeviceConfig::new(name, value),
                })
            })
            .collect::<Result<Vec<_>, ContractError>>()?;

        debug!(
            run = %run,
            devices = devices.len(),
            output = %output_target.display(),
            "run snapshot prepared"
        );

        Ok(Self {
            run,
            output_target,
            document,
            devices,
        })
    }

    pub fn run(&self) -> RunNumber {
        self.run
    }

    /// Resolved per-run output target
    pub fn output_target(&self) -> &Path {
        &self.output_target
    }

    /// The document with the output target injected
    pub fn document(&self) -> &ConfigDocument {
        &self.document
    }

    /// Devices in document order (tag, then name)
    pub fn devices(&self) -> &[DeviceSpec] {
        &self.devices
    }

    /// Pretty JSON rendering for external inspection
    pub fn to_json_pretty(&self) -> Result<String, ContractError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }

    /// Write the snapshot to `path` for external inspection
    pub fn write_inspect(&self, path: &Path) -> Result<(), ContractError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }
}

fn load_device_entry(
    name: &str,
    entry: &DeviceEntry,
    base_dir: &Path,
) -> Result<serde_json::Value, ContractError> {
    match entry {
        DeviceEntry::Inline(value) => Ok(value.clone()),
        DeviceEntry::Path(path) => {
            let path = if path.is_absolute() {
                path.clone()
            } else {
                base_dir.join(path)
            };
            let format = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(ConfigFormat::from_extension)
                .unwrap_or(ConfigFormat::Json);
            let content = std::fs::read_to_string(&path).map_err(|e| {
                ContractError::config_validation(
                    format!("devices.*.{name}"),
                    format!("cannot read {}: {e}", path.display()),
                )
            })?;
            parser::parse_as(&content, format)
        }
    }
}
