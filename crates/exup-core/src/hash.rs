//! Streaming FNV-1a integrity hash
//!
//! The footer carries a 32-bit FNV-1a hash of the staged image. The engine
//! recomputes it over the external flash in [`READ_CHUNK`]-byte reads before
//! anything is programmed.

use crate::config::READ_CHUNK;
use crate::error::Result;
use crate::flash::BlockReader;
use crate::update::UpdateProgress;

/// FNV-1a 32-bit offset basis
pub const FNV_OFFSET_BASIS: u32 = 0x811C_9DC5;
/// FNV-1a 32-bit prime
pub const FNV_PRIME: u32 = 0x0100_0193;

/// Incremental 32-bit FNV-1a hasher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fnv1a {
    state: u32,
}

impl Default for Fnv1a {
    fn default() -> Self {
        Self::new()
    }
}

impl Fnv1a {
    /// Start a new hash
    pub const fn new() -> Self {
        Self {
            state: FNV_OFFSET_BASIS,
        }
    }

    /// Feed bytes into the hash
    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.state ^= byte as u32;
            self.state = self.state.wrapping_mul(FNV_PRIME);
        }
    }

    /// Current hash value
    pub const fn finish(&self) -> u32 {
        self.state
    }

    /// Hash a complete buffer
    pub fn digest(data: &[u8]) -> u32 {
        let mut hasher = Self::new();
        hasher.update(data);
        hasher.finish()
    }
}

/// Hash the first `size` bytes of the external flash
///
/// Reads sequentially from address 0 through a fixed [`READ_CHUNK`]-byte
/// buffer and reports the running byte count to `progress`.
pub fn hash_range<R, P>(reader: &mut R, size: u32, progress: &mut P) -> Result<u32>
where
    R: BlockReader + ?Sized,
    P: UpdateProgress + ?Sized,
{
    let mut chunk = [0u8; READ_CHUNK];
    let mut hasher = Fnv1a::new();
    let mut addr = 0u32;

    while addr < size {
        let n = core::cmp::min(READ_CHUNK as u32, size - addr) as usize;
        reader.read(addr, &mut chunk[..n])?;
        hasher.update(&chunk[..n]);
        addr += n as u32;
        progress.hash_progress(addr);
    }

    Ok(hasher.finish())
}
