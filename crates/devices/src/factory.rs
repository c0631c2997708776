//! DeviceFactory - device construction keyed on the configuration tag
//!
//! Built-in tags: `fake`, `sis_3350`. Additional constructors can be
//! registered, e.g. scripted devices in tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use contracts::{Device, DeviceKind};
use tracing::debug;

use crate::error::{FactoryError, Result};
use crate::fake::FakeDevice;
use crate::sis3350::Sis3350Device;

/// Device constructor: receives the device entry name
pub type DeviceConstructor = Arc<dyn Fn(&str) -> Box<dyn Device> + Send + Sync>;

/// Device factory
#[derive(Clone)]
pub struct DeviceFactory {
    constructors: BTreeMap<String, DeviceConstructor>,
}

impl Default for DeviceFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceFactory {
    /// Factory with the built-in device kinds
    pub fn new() -> Self {
        let mut factory = Self::empty();
        factory.register(DeviceKind::Fake.tag(), |name| Box::new(FakeDevice::new(name)));
        factory.register(DeviceKind::Sis3350.tag(), |name| {
            Box::new(Sis3350Device::new(name))
        });
        factory
    }

    /// Factory with no constructors
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Register (or replace) the constructor for `tag`
    pub fn register<F>(&mut self, tag: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(&str) -> Box<dyn Device> + Send + Sync + 'static,
    {
        self.constructors.insert(tag.into(), Arc::new(constructor));
        self
    }

    /// Construct the device for `tag`
    pub fn create(&self, tag: &str, name: &str) -> Result<Box<dyn Device>> {
        let constructor = self
            .constructors
            .get(tag)
            .ok_or_else(|| FactoryError::unknown_tag(tag, name))?;
        debug!(tag, device = name, "constructing device");
        Ok(constructor(name))
    }

    /// Registered tags, sorted
    pub fn tags(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    pub fn supports(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }
}

impl std::fmt::Debug for DeviceFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceFactory")
            .field("tags", &self.tags())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::{ScriptedDevice, SCRIPTED_TAG};
    use std::time::Duration;

    #[test]
    fn test_builtin_tags() {
        let factory = DeviceFactory::new();
        assert_eq!(factory.tags(), vec!["fake", "sis_3350"]);

        let fake = factory.create("fake", "fake_0").unwrap();
        assert_eq!(fake.kind(), DeviceKind::Fake);
        let sis = factory.create("sis_3350", "sis_3350_0").unwrap();
        assert_eq!(sis.kind(), DeviceKind::Sis3350);
    }

    #[test]
    fn test_unknown_tag() {
        let factory = DeviceFactory::new();
        let err = factory.create("v1742", "caen_0").err().unwrap();
        assert!(matches!(err, FactoryError::UnknownTag { .. }));
        assert!(err.to_string().contains("caen_0"));
    }

    #[test]
    fn test_register_scripted() {
        let mut factory = DeviceFactory::new();
        factory.register(SCRIPTED_TAG, |name| {
            Box::new(ScriptedDevice::new(name, Vec::new(), Duration::ZERO))
        });
        assert!(factory.supports(SCRIPTED_TAG));
        assert!(factory.create(SCRIPTED_TAG, "s0").is_ok());
    }
}
