//! EventFrame - Worker output
//!
//! One fixed-shape record read from one device: per-channel timestamp plus
//! per-channel sample trace. The core treats it as opaque.

use serde::{Deserialize, Serialize};

/// SIS3350 channel count
pub const SIS3350_CHANNELS: usize = 4;

/// SIS3350 samples per channel trace
pub const SIS3350_TRACE_LEN: usize = 1024;

/// Device kind tag
///
/// The serde form matches the device-type keys of the configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceKind {
    /// Synthetic waveform generator
    #[serde(rename = "fake")]
    Fake,
    /// Struck SIS3350 500 MHz digitizer
    #[serde(rename = "sis_3350")]
    Sis3350,
}

impl DeviceKind {
    /// Configuration tag for this kind
    pub fn tag(self) -> &'static str {
        match self {
            Self::Fake => "fake",
            Self::Sis3350 => "sis_3350",
        }
    }

    /// Parse a configuration tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "fake" => Some(Self::Fake),
            "sis_3350" => Some(Self::Sis3350),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Frame read from one device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum EventFrame {
    /// Synthetic frame (variable channel count and trace length)
    Fake(FakeFrame),
    /// SIS3350 frame
    #[serde(rename = "sis_3350")]
    Sis3350(Sis3350Frame),
}

/// Synthetic waveform frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FakeFrame {
    /// Per-channel trigger timestamp (clock ticks)
    pub timestamp: Vec<u64>,
    /// Per-channel sample trace
    pub trace: Vec<Vec<u16>>,
}

impl FakeFrame {
    /// Zeroed frame of the given shape
    pub fn zeroed(channels: usize, trace_len: usize) -> Self {
        Self {
            timestamp: vec![0; channels],
            trace: vec![vec![0; trace_len]; channels],
        }
    }
}

/// SIS3350 frame (4 channels, 12-bit samples, 48-bit timestamps)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sis3350Frame {
    pub timestamp: [u64; SIS3350_CHANNELS],
    pub trace: [Vec<u16>; SIS3350_CHANNELS],
}

impl Default for Sis3350Frame {
    fn default() -> Self {
        Self {
            timestamp: [0; SIS3350_CHANNELS],
            trace: std::array::from_fn(|_| vec![0; SIS3350_TRACE_LEN]),
        }
    }
}

impl EventFrame {
    /// Device kind that produced this frame
    pub fn kind(&self) -> DeviceKind {
        match self {
            Self::Fake(_) => DeviceKind::Fake,
            Self::Sis3350(_) => DeviceKind::Sis3350,
        }
    }

    /// Number of channels carried
    pub fn channel_count(&self) -> usize {
        match self {
            Self::Fake(frame) => frame.timestamp.len(),
            Self::Sis3350(_) => SIS3350_CHANNELS,
        }
    }

    /// Timestamp of one channel
    pub fn timestamp(&self, channel: usize) -> Option<u64> {
        match self {
            Self::Fake(frame) => frame.timestamp.get(channel).copied(),
            Self::Sis3350(frame) => frame.timestamp.get(channel).copied(),
        }
    }

    /// Trace of one channel
    pub fn trace(&self, channel: usize) -> Option<&[u16]> {
        match self {
            Self::Fake(frame) => frame.trace.get(channel).map(Vec::as_slice),
            Self::Sis3350(frame) => frame.trace.get(channel).map(Vec::as_slice),
        }
    }
}
