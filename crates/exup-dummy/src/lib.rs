//! exup-dummy - In-memory hardware emulators for testing
//!
//! This crate emulates every piece of hardware the update engine talks to:
//! the SPI NOR flash holding the staged image, the internal program memory,
//! the interrupt-enable flag and the restart mechanism. The [`image`]
//! module builds staged flash images from hex text.

use exup_core::error::{Error, Result};
use exup_core::programmer::SpiMaster;
use exup_core::spi::{self, SpiCommand};

pub mod image;
mod memory;
mod system;

pub use memory::{DummyProgramMemory, MemoryOp};
pub use system::{
    catch_restart, DummyInterrupts, DummyRestart, RestartOutcome, RestartRequested,
};

/// Configuration for the dummy flash
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Flash size in bytes
    pub size: usize,
    /// Largest read the emulated master accepts in one transaction
    pub max_read_len: usize,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            size: 2 * 1024 * 1024,
            max_read_len: 4096,
        }
    }
}

/// Dummy SPI NOR flash
///
/// Answers READ and FAST_READ from an in-memory array and records every
/// read as `(address, length)`.
pub struct DummyFlash {
    config: DummyConfig,
    data: Vec<u8>,
    reads: Vec<(u32, usize)>,
}

impl DummyFlash {
    /// Create a new erased dummy flash with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let data = vec![0xFF; config.size];
        Self {
            config,
            data,
            reads: Vec::new(),
        }
    }

    /// Create a new dummy flash with default configuration (2 MiB)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a dummy flash with pre-filled data
    pub fn with_data(config: DummyConfig, initial_data: &[u8]) -> Self {
        let mut flash = Self::new(config);
        let len = core::cmp::min(initial_data.len(), flash.data.len());
        flash.data[..len].copy_from_slice(&initial_data[..len]);
        flash
    }

    /// Get a reference to the flash data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the flash data
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Every read served so far, in order
    pub fn reads(&self) -> &[(u32, usize)] {
        &self.reads
    }

    /// One past the highest address read so far
    pub fn read_high_water(&self) -> u32 {
        self.reads
            .iter()
            .map(|&(addr, len)| addr + len as u32)
            .max()
            .unwrap_or(0)
    }

    fn handle_read(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
        let addr = cmd.address.ok_or(Error::ReadError)? as usize;
        let len = cmd.read_buf.len();

        if addr + len > self.data.len() {
            return Err(Error::AddressOutOfBounds);
        }

        cmd.read_buf.copy_from_slice(&self.data[addr..addr + len]);
        self.reads.push((addr as u32, len));
        Ok(())
    }
}

impl SpiMaster for DummyFlash {
    fn max_read_len(&self) -> usize {
        self.config.max_read_len
    }

    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
        match cmd.opcode {
            spi::READ | spi::FAST_READ => self.handle_read(cmd),
            _ => Err(Error::OpcodeNotSupported),
        }
    }
}
