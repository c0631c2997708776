//! In-memory register transport
//!
//! A register file plus block memory behind a shared handle. Clones share
//! state, so a test can keep one clone to script readiness bits and trace
//! memory while the device under test owns the other.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use contracts::{DeviceError, RegisterTransport};
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct MemoryState {
    registers: HashMap<u32, u32>,
    blocks: HashMap<u32, Vec<u32>>,
    /// address -> (mask, remaining reads) OR-ed into reads
    held_bits: HashMap<u32, (u32, u32)>,
    /// write address -> (register, mask) set on every write
    write_links: HashMap<u32, (u32, u32)>,
    failing: HashSet<u32>,
    writes: Vec<(u32, u32)>,
}

/// Shared in-memory register file
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a register value
    pub fn set_register(&self, address: u32, value: u32) {
        self.state.lock().registers.insert(address, value);
    }

    /// Current register value (0 if never written)
    pub fn register(&self, address: u32) -> u32 {
        self.state.lock().registers.get(&address).copied().unwrap_or(0)
    }

    /// Clear bits in a register
    pub fn clear_bits(&self, address: u32, mask: u32) {
        let mut state = self.state.lock();
        let value = state.registers.entry(address).or_insert(0);
        *value &= !mask;
    }

    /// Load block memory at `address`
    pub fn set_block(&self, address: u32, words: Vec<u32>) {
        self.state.lock().blocks.insert(address, words);
    }

    /// OR `mask` into the next `reads` reads of `address`
    pub fn hold_bits(&self, address: u32, mask: u32, reads: u32) {
        self.state.lock().held_bits.insert(address, (mask, reads));
    }

    /// Every write to `write_address` sets `mask` in `register`
    pub fn link_write(&self, write_address: u32, register: u32, mask: u32) {
        self.state
            .lock()
            .write_links
            .insert(write_address, (register, mask));
    }

    /// Make every access to `address` fail
    pub fn fail(&self, address: u32) {
        self.state.lock().failing.insert(address);
    }

    /// Write log in order
    pub fn writes(&self) -> Vec<(u32, u32)> {
        self.state.lock().writes.clone()
    }

    /// Number of reads still holding bits at `address`
    pub fn held_reads_remaining(&self, address: u32) -> u32 {
        self.state
            .lock()
            .held_bits
            .get(&address)
            .map_or(0, |(_, remaining)| *remaining)
    }
}

impl RegisterTransport for MemoryTransport {
    fn read(&mut self, address: u32) -> Result<u32, DeviceError> {
        let mut state = self.state.lock();
        if state.failing.contains(&address) {
            return Err(DeviceError::read(address, "bus error"));
        }
        let mut value = state.registers.get(&address).copied().unwrap_or(0);
        if let Some((mask, remaining)) = state.held_bits.get_mut(&address) {
            if *remaining > 0 {
                value |= *mask;
                *remaining = remaining.saturating_sub(1);
            }
        }
        Ok(value)
    }

    fn write(&mut self, address: u32, value: u32) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        if state.failing.contains(&address) {
            return Err(DeviceError::write(address, "bus error"));
        }
        state.writes.push((address, value));
        state.registers.insert(address, value);
        if let Some((register, mask)) = state.write_links.get(&address).copied() {
            *state.registers.entry(register).or_insert(0) |= mask;
        }
        Ok(())
    }

    fn read_block(&mut self, address: u32, buf: &mut [u32]) -> Result<usize, DeviceError> {
        let state = self.state.lock();
        if state.failing.contains(&address) {
            return Err(DeviceError::BlockRead {
                address,
                message: "bus error".to_string(),
            });
        }
        let Some(block) = state.blocks.get(&address) else {
            return Ok(0);
        };
        let count = block.len().min(buf.len());
        buf[..count].copy_from_slice(&block[..count]);
        Ok(count)
    }
}
