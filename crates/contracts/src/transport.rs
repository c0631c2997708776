//! RegisterTransport trait - narrow hardware register access
//!
//! The only place where low-level, non-portable I/O happens. Device readout
//! logic is written against this trait and never touches a bus directly.

use crate::DeviceError;

/// 32-bit register transport (A32/D32 addressing relative to a board base address)
pub trait RegisterTransport: Send {
    /// Read one word
    fn read(&mut self, address: u32) -> Result<u32, DeviceError>;

    /// Write one word
    fn write(&mut self, address: u32, value: u32) -> Result<(), DeviceError>;

    /// Block read into `buf`, returning the number of words transferred
    fn read_block(&mut self, address: u32, buf: &mut [u32]) -> Result<usize, DeviceError>;
}
