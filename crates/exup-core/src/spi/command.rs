//! SPI command structure

use super::ADDRESS_BYTES;

/// A single SPI transaction
///
/// Designed to avoid allocation - uses slices for data.
/// The lifetime parameter `'a` ties the command to the buffers it references.
pub struct SpiCommand<'a> {
    /// The opcode byte
    pub opcode: u8,

    /// 24-bit address (if any)
    pub address: Option<u32>,

    /// Number of dummy bytes clocked after the address
    pub dummy_bytes: u8,

    /// Data to write after opcode/address/dummy
    pub write_data: &'a [u8],

    /// Buffer to read into (mutable)
    pub read_buf: &'a mut [u8],
}

impl<'a> SpiCommand<'a> {
    /// Create a simple command with no address or data
    pub fn simple(opcode: u8) -> Self {
        Self {
            opcode,
            address: None,
            dummy_bytes: 0,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Create a read command with 3-byte address (e.g., READ)
    pub fn read_3b(opcode: u8, addr: u32, buf: &'a mut [u8]) -> Self {
        Self {
            opcode,
            address: Some(addr),
            dummy_bytes: 0,
            write_data: &[],
            read_buf: buf,
        }
    }

    /// Set the number of dummy bytes
    pub fn with_dummy_bytes(mut self, bytes: u8) -> Self {
        self.dummy_bytes = bytes;
        self
    }

    /// Number of bytes in the opcode/address/dummy header
    pub fn header_len(&self) -> usize {
        let addr = if self.address.is_some() { ADDRESS_BYTES } else { 0 };
        1 + addr + self.dummy_bytes as usize
    }

    /// Encode the header into `buf`, which must hold `header_len()` bytes
    ///
    /// Dummy bytes are encoded as `0xFF`.
    pub fn encode_header(&self, buf: &mut [u8]) {
        buf[0] = self.opcode;
        let mut pos = 1;
        if let Some(addr) = self.address {
            buf[1] = (addr >> 16) as u8;
            buf[2] = (addr >> 8) as u8;
            buf[3] = addr as u8;
            pos += ADDRESS_BYTES;
        }
        for byte in &mut buf[pos..pos + self.dummy_bytes as usize] {
            *byte = 0xFF;
        }
    }

}
