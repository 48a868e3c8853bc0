//! Platform capability traits
//!
//! The engine never touches registers. Each target implements these traits
//! once and hands them to [`crate::update::Updater`].

use crate::error::Result;
use crate::spi::SpiCommand;

/// SPI master connected to the external flash
///
/// All operations are blocking. The engine has exclusive use of the bus for
/// the whole update attempt.
pub trait SpiMaster {
    /// Get the maximum number of bytes that can be read in a single transaction
    fn max_read_len(&self) -> usize;

    /// Execute a single SPI command
    ///
    /// Chip select must be asserted for the whole command and released
    /// afterwards.
    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()>;
}

impl<M: SpiMaster + ?Sized> SpiMaster for &mut M {
    fn max_read_len(&self) -> usize {
        (**self).max_read_len()
    }

    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
        (**self).execute(cmd)
    }
}

/// Self-programming access to the internal program memory
///
/// Every operation blocks until the flash controller is idle again.
/// A page is always committed as: one [`erase_page`](Self::erase_page),
/// one [`program_halfword`](Self::program_halfword) per halfword in
/// ascending order, then [`finish_page`](Self::finish_page).
pub trait ProgramMemory {
    /// Erase the page starting at `base`
    fn erase_page(&mut self, base: u32) -> Result<()>;

    /// Program one little-endian halfword at `addr` (even)
    ///
    /// Targets with a page latch (e.g. AVR `SPM` page fill) may only latch
    /// the value here and write it out in `finish_page`.
    fn program_halfword(&mut self, addr: u32, value: u16) -> Result<()>;

    /// Commit a fully programmed page
    ///
    /// Called once per page after its last halfword. The default does
    /// nothing, which suits targets that program halfwords directly.
    fn finish_page(&mut self, _base: u32) -> Result<()> {
        Ok(())
    }
}

impl<P: ProgramMemory + ?Sized> ProgramMemory for &mut P {
    fn erase_page(&mut self, base: u32) -> Result<()> {
        (**self).erase_page(base)
    }

    fn program_halfword(&mut self, addr: u32, value: u16) -> Result<()> {
        (**self).program_halfword(addr, value)
    }

    fn finish_page(&mut self, base: u32) -> Result<()> {
        (**self).finish_page(base)
    }
}

/// Hardware restart used after a successful update
///
/// Typical implementations arm the watchdog with its shortest timeout and
/// spin, or request a system reset.
pub trait Restart {
    /// Restart the device. Never returns.
    fn restart(&mut self) -> !;
}
