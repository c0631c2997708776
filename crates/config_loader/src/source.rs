//! ConfigSource - where the persisted document comes from
//!
//! The run controller reloads its source on every start, so edits to the
//! persisted document take effect at the next run.

use std::path::{Path, PathBuf};

use contracts::{ConfigDocument, ContractError};

use crate::ConfigLoader;

/// Persisted configuration source
pub trait ConfigSource: Send {
    /// Load a fresh copy of the document
    fn load(&self) -> Result<ConfigDocument, ContractError>;

    /// Directory that relative device sub-configuration paths resolve against
    fn base_dir(&self) -> &Path;

    /// Human-readable origin (used in logs)
    fn describe(&self) -> String;
}

/// Document read from a file on every load
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
    base_dir: PathBuf,
    known_tags: Vec<String>,
}

impl FileConfigSource {
    /// Source accepting the built-in device tags
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            path,
            base_dir,
            known_tags: crate::BUILTIN_DEVICE_TAGS
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }

    /// Accept additional device tags (e.g. tags with registered constructors)
    pub fn with_device_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            let tag = tag.into();
            if !self.known_tags.contains(&tag) {
                self.known_tags.push(tag);
            }
        }
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for FileConfigSource {
    fn load(&self) -> Result<ConfigDocument, ContractError> {
        let tags: Vec<&str> = self.known_tags.iter().map(String::as_str).collect();
        ConfigLoader::load_from_path_with_tags(&self.path, &tags)
    }

    fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory document, cloned on every load
#[derive(Debug, Clone)]
pub struct StaticConfigSource {
    document: ConfigDocument,
    base_dir: PathBuf,
}

impl StaticConfigSource {
    pub fn new(document: ConfigDocument) -> Self {
        Self {
            document,
            base_dir: PathBuf::from("."),
        }
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }
}

impl ConfigSource for StaticConfigSource {
    fn load(&self) -> Result<ConfigDocument, ContractError> {
        Ok(self.document.clone())
    }

    fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn describe(&self) -> String {
        "<static>".to_string()
    }
}
