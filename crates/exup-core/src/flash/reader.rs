//! Block reader implementations

use crate::error::{Error, Result};
use crate::programmer::SpiMaster;
use crate::protocol;

/// Reads arbitrary byte ranges of the external flash
///
/// No state is kept between calls. Reading outside the device is an error.
pub trait BlockReader {
    /// Fill `buf` with the bytes starting at `addr`
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()>;
}

impl<R: BlockReader + ?Sized> BlockReader for &mut R {
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        (**self).read(addr, buf)
    }
}

/// Block reader for a SPI NOR flash
///
/// # Example
///
/// ```ignore
/// let mut reader = SpiFlashReader::new(&mut spi);
/// let mut magic = [0u8; 6];
/// reader.read(0x1F_F000, &mut magic)?;
/// ```
pub struct SpiFlashReader<'a, M: SpiMaster + ?Sized> {
    master: &'a mut M,
}

impl<'a, M: SpiMaster + ?Sized> SpiFlashReader<'a, M> {
    /// Create a reader over an SPI master
    pub fn new(master: &'a mut M) -> Self {
        Self { master }
    }

    /// Get a reference to the underlying SPI master
    pub fn master(&mut self) -> &mut M {
        self.master
    }
}

impl<M: SpiMaster + ?Sized> BlockReader for SpiFlashReader<'_, M> {
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        protocol::read_3b(&mut *self.master, addr, buf)
    }
}

/// Block reader for an image that is already addressable
///
/// Useful for memory-mapped flash and for host-side tools.
#[derive(Debug, Clone, Copy)]
pub struct SliceReader<'a> {
    data: &'a [u8],
}

impl<'a> SliceReader<'a> {
    /// Create a reader over `data`; address 0 is `data[0]`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Size of the backing image
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the backing image is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl BlockReader for SliceReader<'_> {
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        let start = addr as usize;
        let end = start
            .checked_add(buf.len())
            .ok_or(Error::AddressOutOfBounds)?;
        let src = self.data.get(start..end).ok_or(Error::AddressOutOfBounds)?;
        buf.copy_from_slice(src);
        Ok(())
    }
}
