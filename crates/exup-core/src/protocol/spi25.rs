//! SPI25 protocol implementation
//!
//! Only the plain READ command is needed: the engine never writes the
//! external flash, and READ works at the low clock rates bootloaders use.

use crate::error::{Error, Result};
use crate::programmer::SpiMaster;
use crate::spi::{SpiCommand, MAX_3B_ADDRESS, READ};

/// Read data from flash using 3-byte addressing
///
/// The read is split into transactions of at most `master.max_read_len()`
/// bytes.
pub fn read_3b<M: SpiMaster + ?Sized>(master: &mut M, addr: u32, buf: &mut [u8]) -> Result<()> {
    if buf.is_empty() {
        return Ok(());
    }
    let end = addr as u64 + buf.len() as u64 - 1;
    if end > MAX_3B_ADDRESS as u64 {
        return Err(Error::AddressOutOfBounds);
    }

    let max_len = master.max_read_len().max(1);
    let mut offset = 0;

    while offset < buf.len() {
        let chunk_len = core::cmp::min(max_len, buf.len() - offset);
        let chunk = &mut buf[offset..offset + chunk_len];
        let mut cmd = SpiCommand::read_3b(READ, addr + offset as u32, chunk);
        master.execute(&mut cmd)?;
        offset += chunk_len;
    }

    Ok(())
}
