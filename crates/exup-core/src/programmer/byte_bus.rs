//! SPI master on top of a single-byte transfer primitive
//!
//! Small microcontrollers usually expose SPI as "write a byte to the data
//! register, wait, read the byte that came back" plus a GPIO chip select.
//! [`ByteSpiBus`] captures exactly that, and [`ByteSpiMaster`] turns it into
//! a [`SpiMaster`] so the rest of the engine can issue whole commands.

use super::SpiMaster;
use crate::error::{Error, Result};
use crate::spi::SpiCommand;

/// Filler byte clocked out while reading
const READ_FILLER: u8 = 0xFF;

/// Trait for a blocking byte-wide SPI peripheral
pub trait ByteSpiBus {
    /// Assert chip select (drive CS# low)
    fn select(&mut self);

    /// Release chip select (drive CS# high)
    fn deselect(&mut self);

    /// Clock one byte out and return the byte clocked in
    fn transfer(&mut self, byte: u8) -> u8;
}

/// [`SpiMaster`] adapter for a [`ByteSpiBus`]
pub struct ByteSpiMaster<B> {
    bus: B,
    max_read_len: usize,
}

impl<B: ByteSpiBus> ByteSpiMaster<B> {
    /// Wrap a bus; reads are split into transactions of `max_read_len` bytes
    pub fn new(bus: B, max_read_len: usize) -> Self {
        Self {
            bus,
            max_read_len: max_read_len.max(1),
        }
    }

    /// Consume the adapter and return the bus
    pub fn into_inner(self) -> B {
        self.bus
    }
}

impl<B: ByteSpiBus> SpiMaster for ByteSpiMaster<B> {
    fn max_read_len(&self) -> usize {
        self.max_read_len
    }

    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
        let mut header = [0u8; 8];
        let header_len = cmd.header_len();
        if header_len > header.len() {
            return Err(Error::OpcodeNotSupported);
        }
        cmd.encode_header(&mut header[..header_len]);

        self.bus.select();
        for &byte in &header[..header_len] {
            self.bus.transfer(byte);
        }
        for &byte in cmd.write_data {
            self.bus.transfer(byte);
        }
        for slot in cmd.read_buf.iter_mut() {
            *slot = self.bus.transfer(READ_FILLER);
        }
        self.bus.deselect();

        Ok(())
    }
}
