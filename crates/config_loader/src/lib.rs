//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse JSON/TOML configuration documents
//! - Validate configuration legality
//! - Build the run-scoped `RunSnapshot` on every start
//!
//! # Example
//!
//! ```no_run
//! use config_loader::{ConfigLoader, RunSnapshot};
//! use contracts::RunNumber;
//! use std::path::Path;
//!
//! let path = Path::new("fe_master.json");
//! let document = ConfigLoader::load_from_path(path).unwrap();
//! let snapshot = RunSnapshot::prepare(document, Path::new("."), RunNumber(42)).unwrap();
//! println!("output: {}", snapshot.output_target().display());
//! ```

mod parser;
mod snapshot;
mod source;
mod validator;

pub use contracts::ConfigDocument;
pub use parser::ConfigFormat;
pub use snapshot::{DeviceSpec, RunSnapshot, FILE_WRITER, FILE_WRITER_PATH};
pub use source::{ConfigSource, FileConfigSource, StaticConfigSource};
pub use validator::validate_device_tags;

use contracts::{ContractError, DeviceKind};
use std::path::Path;

/// Device tags with a built-in device implementation
pub const BUILTIN_DEVICE_TAGS: &[&str] = &["fake", "sis_3350"];

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.json / .toml).
    /// Device tags are checked against the built-in device kinds.
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<ConfigDocument, ContractError> {
        Self::load_from_path_with_tags(path, BUILTIN_DEVICE_TAGS)
    }

    /// Load configuration from file path, accepting the given device tags
    pub fn load_from_path_with_tags(
        path: &Path,
        known_tags: &[&str],
    ) -> Result<ConfigDocument, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        let document = Self::load_from_str(&content, format)?;
        validator::validate_device_tags(&document, known_tags)?;
        Ok(document)
    }

    /// Load configuration from string
    ///
    /// Runs structural validation only; device tags are not checked.
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<ConfigDocument, ContractError> {
        let document = parser::parse(content, format)?;
        validator::validate(&document)?;
        Ok(document)
    }

    /// Serialize a document to TOML string
    pub fn to_toml(document: &ConfigDocument) -> Result<String, ContractError> {
        toml::to_string_pretty(document)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize a document to JSON string
    pub fn to_json(document: &ConfigDocument) -> Result<String, ContractError> {
        serde_json::to_string_pretty(document)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }

    /// Device kinds present in the document, in tag order
    pub fn device_kinds(document: &ConfigDocument) -> Vec<DeviceKind> {
        document
            .devices
            .keys()
            .filter_map(|tag| DeviceKind::from_tag(tag))
            .collect()
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }
}
