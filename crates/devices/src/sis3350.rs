//! Struck SIS3350 digitizer
//!
//! 4 channels, 12-bit samples, 48-bit trigger timestamps. Bring-up and
//! readout are expressed purely in terms of `RegisterTransport`; single
//! register failures are logged and bring-up carries on.

use contracts::{
    Device, DeviceConfig, DeviceError, DeviceKind, EventFrame, RegisterTransport, Sis3350Frame,
    SIS3350_CHANNELS, SIS3350_TRACE_LEN,
};
use serde::Deserialize;
use tracing::{debug, error, info, instrument, warn};

use crate::memory::MemoryTransport;

/// Transport path selecting the in-memory register file
pub const SIM_DEVICE: &str = "sim";

/// Busy-bit handshake read limit
pub const HANDSHAKE_MAX_READS: u32 = 1000;

/// Words per channel block read: two samples per word plus a 4-word header
pub const TRACE_WORDS: usize = SIS3350_TRACE_LEN / 2 + 4;

const REG_CONTROL_STATUS: u32 = 0x0;
const REG_MODULE_ID: u32 = 0x4;
const REG_ACQUISITION: u32 = 0x10;
const REG_SYNTHESIZER: u32 = 0x1c;
const REG_MEMORY_PAGE: u32 = 0x34;
const REG_TRIGGER_OUTPUT: u32 = 0x38;
const REG_DAC_CONTROL: u32 = 0x50;
const REG_DAC_DATA: u32 = 0x54;
const REG_TEMPERATURE: u32 = 0x70;
const REG_RESET: u32 = 0x400;
const REG_ARM: u32 = 0x410;
const REG_SAMPLE_LENGTH: u32 = 0x0100_0020;
const REG_PRETRIGGER: u32 = 0x0100_0024;

const ACQ_ARMED: u32 = 0x10000;
const DAC_BUSY: u32 = 0x8000;
const DAC_LOAD_SHIFT: u32 = 0x1;
const DAC_LOAD: u32 = 0x2;

const SYNTH_500_MHZ: u32 = 0x14;
const EXT_TRIGGER_THRESHOLD: u32 = 37500;
const ADC_OFFSET: u32 = 39000;
const ADC_GAIN: u32 = 45;

/// SIS3350 sub-configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Sis3350Settings {
    /// Bus device path, or `"sim"`
    pub device: String,

    /// Board base address (hex, with or without `0x`)
    #[serde(default)]
    pub base_address: String,

    #[serde(default)]
    pub invert_ext_lemo: bool,

    #[serde(default)]
    pub user_led_on: bool,

    #[serde(default)]
    pub enable_ext_lemo: bool,

    #[serde(default)]
    pub pretrigger_samples: u32,
}

impl Sis3350Settings {
    fn base_address(&self) -> Result<u32, std::num::ParseIntError> {
        let hex = self.base_address.trim();
        let hex = hex
            .strip_prefix("0x")
            .or_else(|| hex.strip_prefix("0X"))
            .unwrap_or(hex);
        if hex.is_empty() {
            return Ok(0);
        }
        u32::from_str_radix(hex, 16)
    }
}

/// J/K register encoding: upper half clears, lower half sets
pub fn jk_encode(set: u32) -> u32 {
    ((!set & 0xffff) << 16) | set
}

/// Decode the 48-bit timestamp from the first two header words
pub fn decode_timestamp(w0: u32, w1: u32) -> u64 {
    let (w0, w1) = (u64::from(w0), u64::from(w1));
    (w1 & 0xfff) | ((w1 & 0x0fff_0000) >> 4) | ((w0 & 0xfff) << 24) | ((w0 & 0x0fff_0000) << 20)
}

/// Unpack two 12-bit samples per word, skipping the 4-word header
pub fn decode_trace(words: &[u32], trace: &mut [u16]) {
    for (idx, word) in words.iter().skip(4).enumerate() {
        if let Some(sample) = trace.get_mut(2 * idx) {
            *sample = (word & 0xfff) as u16;
        }
        if let Some(sample) = trace.get_mut(2 * idx + 1) {
            *sample = ((word >> 16) & 0xfff) as u16;
        }
    }
}

/// Register file that behaves like an idle, armed board
pub fn sim_transport() -> MemoryTransport {
    let transport = MemoryTransport::new();
    transport.set_register(REG_MODULE_ID, 0x3350_0102);
    transport.set_register(REG_TEMPERATURE, 25 * 4);
    transport.set_register(REG_ACQUISITION, ACQ_ARMED);
    transport.link_write(REG_ARM, REG_ACQUISITION, ACQ_ARMED);
    for ch in 0..SIS3350_CHANNELS as u32 {
        transport.set_block(trace_address(ch), vec![0; TRACE_WORDS]);
    }
    transport
}

/// Clear the armed bit so the next readiness poll reports an event
pub fn sim_trigger(transport: &MemoryTransport) {
    transport.clear_bits(REG_ACQUISITION, ACQ_ARMED);
}

fn trace_address(ch: u32) -> u32 {
    (0x4 + ch) << 24
}

fn sample_address_register(ch: u32) -> u32 {
    0x0200_0010 | ((ch >> 1) << 24) | ((ch & 0x1) << 2)
}

fn adc_offset_register(ch: u32) -> u32 {
    0x0200_0050 | ((ch >> 1) << 24)
}

fn adc_gain_register(ch: u32) -> u32 {
    0x0200_0048 | ((ch >> 1) << 24) | ((ch % 2) << 2)
}

/// SIS3350 device
pub struct Sis3350Device {
    name: String,
    transport: Option<Box<dyn RegisterTransport>>,
    base_address: u32,
    words: Vec<[u32; TRACE_WORDS]>,
}

impl Sis3350Device {
    /// Device whose transport is selected by `load`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: None,
            base_address: 0,
            words: vec![[0; TRACE_WORDS]; SIS3350_CHANNELS],
        }
    }

    /// Device bound to an explicit transport
    pub fn with_transport(name: impl Into<String>, transport: Box<dyn RegisterTransport>) -> Self {
        Self {
            transport: Some(transport),
            ..Self::new(name)
        }
    }

    fn transport(&mut self) -> Result<&mut Box<dyn RegisterTransport>, DeviceError> {
        self.transport
            .as_mut()
            .ok_or_else(|| DeviceError::config(&self.name, "device not loaded"))
    }

    /// Logged read; failures yield 0
    fn read_reg(&mut self, address: u32) -> u32 {
        let base = self.base_address;
        let result = self.transport().and_then(|t| t.read(address));
        match result {
            Ok(value) => value,
            Err(e) => {
                warn!(device = %self.name, base = format_args!("0x{base:08x}"), error = %e, "register read failed");
                0
            }
        }
    }

    /// Logged write
    fn write_reg(&mut self, address: u32, value: u32) {
        let base = self.base_address;
        if let Err(e) = self.transport().and_then(|t| t.write(address, value)) {
            warn!(device = %self.name, base = format_args!("0x{base:08x}"), error = %e, "register write failed");
        }
    }

    /// Poll `address` until the busy bit clears, at most `HANDSHAKE_MAX_READS` times
    fn wait_not_busy(&mut self, address: u32, stage: &str) -> Result<(), DeviceError> {
        for _ in 0..HANDSHAKE_MAX_READS {
            if self.read_reg(address) & DAC_BUSY == 0 {
                return Ok(());
            }
        }
        Err(DeviceError::HandshakeTimeout {
            stage: stage.to_string(),
            attempts: HANDSHAKE_MAX_READS,
        })
    }

    /// Shift-register load followed by DAC load, each with a busy handshake
    fn load_dac(&mut self, control: u32, select: u32, stage: &str) {
        for (step, command) in [("shift register", DAC_LOAD_SHIFT), ("dac", DAC_LOAD)] {
            self.write_reg(control, select | command);
            if let Err(e) = self.wait_not_busy(control, stage) {
                error!(device = %self.name, step, error = %e, "dac handshake exhausted");
            }
        }
    }

    #[instrument(name = "sis3350_bring_up", skip(self, settings), fields(device = %self.name))]
    fn bring_up(&mut self, settings: &Sis3350Settings) {
        self.read_reg(REG_CONTROL_STATUS);
        info!(base = format_args!("0x{:08x}", self.base_address), "sis3350 found");

        self.write_reg(REG_RESET, 1);

        let id = self.read_reg(REG_MODULE_ID);
        info!(
            id = format_args!("{:04x}", id >> 16),
            major = (id >> 8) & 0xff,
            minor = id & 0xff,
            "sis3350 module id"
        );

        let mut control = 0;
        if settings.invert_ext_lemo {
            control |= 0x10;
        }
        if settings.user_led_on {
            control |= 0x1;
        }
        self.write_reg(REG_CONTROL_STATUS, jk_encode(control) & 0x0011_0011);
        let status = self.read_reg(REG_CONTROL_STATUS);
        debug!(
            ext_lemo = if status & 0x10 == 0x10 { "NIM" } else { "TTL" },
            user_led = status & 0x1 == 0x1,
            "control/status set"
        );

        // sync ring buffer mode
        let mut acquisition = 0x1;
        if settings.enable_ext_lemo {
            acquisition |= 0x1 << 8;
        }
        self.write_reg(REG_ACQUISITION, jk_encode(acquisition) & !0xcc98_cc98);
        let readback = self.read_reg(REG_ACQUISITION);
        debug!(acquisition = format_args!("0x{readback:08x}"), "acquisition register set");

        self.write_reg(REG_SYNTHESIZER, SYNTH_500_MHZ);
        self.write_reg(REG_MEMORY_PAGE, 0);
        // LEMO IN -> LEMO OUT
        self.write_reg(REG_TRIGGER_OUTPUT, 0x1);

        self.write_reg(REG_DAC_DATA, EXT_TRIGGER_THRESHOLD);
        self.load_dac(REG_DAC_CONTROL, 0x1 << 4, "ext trigger threshold");

        let temperature = self.read_reg(REG_TEMPERATURE);
        info!(celsius = f64::from(temperature) / 4.0, "sis3350 board temperature");

        self.write_reg(REG_SAMPLE_LENGTH, SIS3350_TRACE_LEN as u32);
        self.write_reg(REG_PRETRIGGER, settings.pretrigger_samples);

        for ch in 0..SIS3350_CHANNELS as u32 {
            let offset = adc_offset_register(ch);
            self.write_reg(offset, ADC_OFFSET);
            self.load_dac(offset, (ch % 2) << 4, "adc offset");
        }

        for ch in 0..SIS3350_CHANNELS as u32 {
            self.write_reg(adc_gain_register(ch), ADC_GAIN);
            debug!(channel = ch, gain = ADC_GAIN, "adc gain set");
        }
    }
}

impl Device for Sis3350Device {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Sis3350
    }

    fn load(&mut self, config: &DeviceConfig) -> Result<(), DeviceError> {
        let settings: Sis3350Settings = config.parse()?;
        self.base_address = settings
            .base_address()
            .map_err(|e| DeviceError::config(&self.name, format!("bad base_address: {e}")))?;

        if self.transport.is_none() {
            if settings.device != SIM_DEVICE {
                return Err(DeviceError::TransportUnavailable {
                    path: settings.device.clone(),
                });
            }
            self.transport = Some(Box::new(sim_transport()));
        }

        self.bring_up(&settings);
        Ok(())
    }

    fn event_available(&mut self) -> bool {
        if self.transport.is_none() {
            return false;
        }
        let result = self.transport().and_then(|t| t.read(REG_ACQUISITION));
        match result {
            Ok(acquisition) => acquisition & ACQ_ARMED == 0,
            Err(e) => {
                warn!(device = %self.name, error = %e, "readiness poll failed");
                false
            }
        }
    }

    fn read_event(&mut self, frame: &mut EventFrame) -> Result<(), DeviceError> {
        let found = frame.kind();
        let EventFrame::Sis3350(bundle) = frame else {
            return Err(DeviceError::FrameMismatch {
                expected: DeviceKind::Sis3350,
                found,
            });
        };

        let mut first_error = None;

        for ch in 0..SIS3350_CHANNELS as u32 {
            let next_sample = self.read_reg(sample_address_register(ch));
            debug!(device = %self.name, channel = ch, next_sample, "next sample address");
        }

        let mut words = std::mem::take(&mut self.words);
        for (ch, buf) in words.iter_mut().enumerate() {
            let address = trace_address(ch as u32);
            match self.transport().and_then(|t| t.read_block(address, buf)) {
                Ok(got) if got == TRACE_WORDS => {}
                Ok(got) => {
                    first_error.get_or_insert(DeviceError::BlockRead {
                        address,
                        message: format!("short read: {got} of {TRACE_WORDS} words"),
                    });
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        self.write_reg(REG_ARM, 1);

        for (ch, buf) in words.iter().enumerate() {
            bundle.timestamp[ch] = decode_timestamp(buf[0], buf[1]);
            decode_trace(buf, &mut bundle.trace[ch]);
        }
        self.words = words;

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn blank_frame(&self) -> EventFrame {
        EventFrame::Sis3350(Sis3350Frame::default())
    }
}
