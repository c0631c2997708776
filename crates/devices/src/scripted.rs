//! Scripted device - replays a fixed frame list
//!
//! Frames become available one at a time, each `delay` after the previous
//! readout. Drives deterministic scenario tests.

use std::time::{Duration, Instant};

use contracts::{Device, DeviceConfig, DeviceError, DeviceKind, EventFrame, FakeFrame};
use serde::Deserialize;
use tracing::debug;

/// Tag scripted devices are usually registered under
pub const SCRIPTED_TAG: &str = "scripted";

/// Optional overrides read by `load`
#[derive(Debug, Default, Deserialize)]
struct ScriptedSettings {
    #[serde(default)]
    frames: Option<Vec<EventFrame>>,
    #[serde(default)]
    delay_ms: Option<u64>,
}

/// Scripted device
pub struct ScriptedDevice {
    name: String,
    frames: Vec<EventFrame>,
    delay: Duration,
    cursor: usize,
    next_at: Instant,
}

impl ScriptedDevice {
    pub fn new(name: impl Into<String>, frames: Vec<EventFrame>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            frames,
            delay,
            cursor: 0,
            next_at: Instant::now() + delay,
        }
    }

    /// Frames not yet read
    pub fn remaining(&self) -> usize {
        self.frames.len().saturating_sub(self.cursor)
    }
}

impl Device for ScriptedDevice {
    fn kind(&self) -> DeviceKind {
        self.frames
            .first()
            .map_or(DeviceKind::Fake, EventFrame::kind)
    }

    fn load(&mut self, config: &DeviceConfig) -> Result<(), DeviceError> {
        let settings: ScriptedSettings = if config.value.is_null() {
            ScriptedSettings::default()
        } else {
            config.parse()?
        };
        if let Some(frames) = settings.frames {
            self.frames = frames;
        }
        if let Some(delay_ms) = settings.delay_ms {
            self.delay = Duration::from_millis(delay_ms);
        }
        self.cursor = 0;
        self.next_at = Instant::now() + self.delay;
        debug!(device = %self.name, frames = self.frames.len(), "scripted device loaded");
        Ok(())
    }

    fn event_available(&mut self) -> bool {
        self.cursor < self.frames.len() && Instant::now() >= self.next_at
    }

    fn read_event(&mut self, frame: &mut EventFrame) -> Result<(), DeviceError> {
        let Some(next) = self.frames.get(self.cursor) else {
            return Err(DeviceError::config(&self.name, "script exhausted"));
        };
        *frame = next.clone();
        self.cursor += 1;
        self.next_at = Instant::now() + self.delay;
        Ok(())
    }

    fn blank_frame(&self) -> EventFrame {
        self.frames
            .first()
            .cloned()
            .unwrap_or_else(|| EventFrame::Fake(FakeFrame::zeroed(1, 1)))
    }
}
