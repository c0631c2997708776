//! Fake device implementation
//!
//! Generates synthetic waveforms at a configured trigger rate. Used for
//! testing and development without digitizer hardware.

use std::time::{Duration, Instant};

use contracts::{Device, DeviceConfig, DeviceError, DeviceKind, EventFrame, FakeFrame};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing::{debug, trace};

/// 12-bit ADC midpoint
const BASELINE: f64 = 2048.0;

/// Longest trigger interval scheduled, whatever the configured rate
const MAX_INTERVAL: Duration = Duration::from_secs(3600);

/// Fake device configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FakeSettings {
    /// Channels per frame
    pub channels: usize,
    /// Samples per channel trace
    pub trace_len: usize,
    /// Mean trigger rate (Hz)
    pub rate: f64,
    /// Trigger interval jitter as a fraction of the mean interval
    pub jitter: f64,
    /// Probability that a trigger produces no frame
    pub drop_rate: f64,
    /// Pulse amplitude (ADC counts, negative-going)
    pub amplitude: f64,
    /// Peak-to-peak noise (ADC counts)
    pub noise: f64,
    /// Fixed RNG seed for reproducible traces
    pub seed: Option<u64>,
}

impl FakeSettings {
    fn validate(&self, device: &str) -> Result<(), DeviceError> {
        if self.channels == 0 || self.trace_len == 0 {
            return Err(DeviceError::config(device, "channels and trace_len must be > 0"));
        }
        if !(self.rate > 0.0 && self.rate.is_finite()) {
            return Err(DeviceError::config(device, format!("rate must be > 0, got {}", self.rate)));
        }
        if !(0.0..=1.0).contains(&self.jitter) || !(0.0..=1.0).contains(&self.drop_rate) {
            return Err(DeviceError::config(device, "jitter and drop_rate must be in [0, 1]"));
        }
        Ok(())
    }
}

impl Default for FakeSettings {
    fn default() -> Self {
        Self {
            channels: 4,
            trace_len: 1024,
            rate: 10.0,
            jitter: 0.0,
            drop_rate: 0.0,
            amplitude: 1200.0,
            noise: 8.0,
            seed: None,
        }
    }
}

/// Fake device
///
/// Triggers are scheduled lazily: each readiness poll checks whether the
/// next trigger time has passed, so no helper thread is needed.
pub struct FakeDevice {
    name: String,
    settings: FakeSettings,
    rng: StdRng,
    epoch: Instant,
    next_trigger: Option<Instant>,
    pending: bool,
    triggers: u64,
    dropped: u64,
}

impl FakeDevice {
    /// Create a fake device with default settings
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_settings(name, FakeSettings::default())
    }

    /// Create a fake device with explicit settings
    pub fn with_settings(name: impl Into<String>, settings: FakeSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            name: name.into(),
            settings,
            rng,
            epoch: Instant::now(),
            next_trigger: None,
            pending: false,
            triggers: 0,
            dropped: 0,
        }
    }

    pub fn settings(&self) -> &FakeSettings {
        &self.settings
    }

    /// Triggers dropped so far
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn interval(&mut self) -> Duration {
        let mean = 1.0 / self.settings.rate;
        let jitter = if self.settings.jitter > 0.0 {
            self.rng.random_range(-1.0..1.0) * self.settings.jitter
        } else {
            0.0
        };
        Duration::try_from_secs_f64((mean * (1.0 + jitter)).max(0.0))
            .map_or(MAX_INTERVAL, |interval| interval.min(MAX_INTERVAL))
    }

    fn fill_trace(&mut self, trace: &mut [u16]) {
        let len = trace.len();
        let peak = len / 4;
        let rise = (len / 64).max(1) as f64;
        let decay = (len / 16).max(1) as f64;
        let half_noise = self.settings.noise / 2.0;

        for (idx, sample) in trace.iter_mut().enumerate() {
            let pulse = if idx < peak {
                let dt = (peak - idx) as f64;
                (-dt / rise).exp()
            } else {
                let dt = (idx - peak) as f64;
                (-dt / decay).exp()
            };
            let noise = if half_noise > 0.0 {
                self.rng.random_range(-half_noise..half_noise)
            } else {
                0.0
            };
            let value = BASELINE - self.settings.amplitude * pulse + noise;
            *sample = value.clamp(0.0, 4095.0) as u16;
        }
    }
}

impl Device for FakeDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Fake
    }

    fn load(&mut self, config: &DeviceConfig) -> Result<(), DeviceError> {
        // a rejected config keeps the previous settings
        let settings: FakeSettings = config.parse()?;
        settings.validate(&self.name)?;
        if let Some(seed) = settings.seed {
            self.rng = StdRng::seed_from_u64(seed);
        }
        self.settings = settings;

        self.epoch = Instant::now();
        self.next_trigger = None;
        self.pending = false;

        debug!(
            device = %self.name,
            channels = self.settings.channels,
            trace_len = self.settings.trace_len,
            rate = self.settings.rate,
            "fake device loaded"
        );
        Ok(())
    }

    fn event_available(&mut self) -> bool {
        if self.pending {
            return true;
        }

        let now = Instant::now();
        let due = match self.next_trigger {
            Some(at) => at,
            None => {
                let at = now + self.interval();
                self.next_trigger = Some(at);
                at
            }
        };
        if now < due {
            return false;
        }

        let interval = self.interval();
        self.next_trigger = Some(due + interval);
        self.triggers += 1;

        if self.settings.drop_rate > 0.0 && self.rng.random_bool(self.settings.drop_rate) {
            self.dropped += 1;
            trace!(device = %self.name, trigger = self.triggers, "fake trigger dropped");
            return false;
        }

        self.pending = true;
        true
    }

    fn read_event(&mut self, frame: &mut EventFrame) -> Result<(), DeviceError> {
        let found = frame.kind();
        let EventFrame::Fake(data) = frame else {
            return Err(DeviceError::FrameMismatch {
                expected: DeviceKind::Fake,
                found,
            });
        };

        let channels = self.settings.channels;
        let trace_len = self.settings.trace_len;
        if data.timestamp.len() != channels || data.trace.iter().any(|t| t.len() != trace_len) {
            *data = FakeFrame::zeroed(channels, trace_len);
        }

        // 500 MHz sampling clock ticks since load
        let ticks = (self.epoch.elapsed().as_nanos() / 2) as u64;
        for ch in 0..channels {
            data.timestamp[ch] = ticks;
            self.fill_trace(&mut data.trace[ch]);
        }

        self.pending = false;
        Ok(())
    }

    fn blank_frame(&self) -> EventFrame {
        EventFrame::Fake(FakeFrame::zeroed(self.settings.channels, self.settings.trace_len))
    }
}
