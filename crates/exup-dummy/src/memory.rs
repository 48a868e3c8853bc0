//! Internal program memory emulator

use std::collections::BTreeSet;

use exup_core::error::{Error, Result};
use exup_core::programmer::ProgramMemory;

/// One recorded program memory operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryOp {
    /// Page erase at base
    Erase(u32),
    /// Halfword program at address
    Program(u32, u16),
    /// Page commit at base
    Finish(u32),
}

impl MemoryOp {
    /// Address the operation targets
    pub fn addr(&self) -> u32 {
        match *self {
            Self::Erase(base) | Self::Finish(base) => base,
            Self::Program(addr, _) => addr,
        }
    }
}

/// Dummy self-programmable flash
///
/// Erase sets a page to 0xFF and programming can only clear bits, like the
/// real array. Any operation touching the protected region fails with
/// [`Error::RegionProtected`], so a test catches the engine stepping over
/// the boundary instead of silently corrupting the bootloader.
pub struct DummyProgramMemory {
    data: Vec<u8>,
    page_size: usize,
    protected_start: u32,
    ops: Vec<MemoryOp>,
}

impl DummyProgramMemory {
    /// Create an erased program memory
    pub fn new(size: usize, page_size: usize, protected_start: u32) -> Self {
        Self {
            data: vec![0xFF; size],
            page_size,
            protected_start,
            ops: Vec::new(),
        }
    }

    /// Create a program memory holding `initial_data` at address 0
    pub fn with_data(
        size: usize,
        page_size: usize,
        protected_start: u32,
        initial_data: &[u8],
    ) -> Self {
        let mut memory = Self::new(size, page_size, protected_start);
        let len = core::cmp::min(initial_data.len(), memory.data.len());
        memory.data[..len].copy_from_slice(&initial_data[..len]);
        memory
    }

    /// Current memory content
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable memory content, bypassing the operation log
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Page size
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Every operation performed so far, in order
    pub fn ops(&self) -> &[MemoryOp] {
        &self.ops
    }

    /// Number of page erases
    pub fn erase_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, MemoryOp::Erase(_)))
            .count()
    }

    /// Number of halfword programs
    pub fn program_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, MemoryOp::Program(..)))
            .count()
    }

    /// Bases of all erased pages, ascending and without duplicates
    pub fn touched_pages(&self) -> Vec<u32> {
        let pages: BTreeSet<u32> = self
            .ops
            .iter()
            .filter_map(|op| match op {
                MemoryOp::Erase(base) => Some(*base),
                _ => None,
            })
            .collect();
        pages.into_iter().collect()
    }

    fn check_range(&self, addr: u32, len: usize) -> Result<usize> {
        let start = addr as usize;
        let end = start.checked_add(len).ok_or(Error::AddressOutOfBounds)?;
        if end > self.protected_start as usize {
            return Err(Error::RegionProtected);
        }
        if end > self.data.len() {
            return Err(Error::AddressOutOfBounds);
        }
        Ok(start)
    }
}

impl ProgramMemory for DummyProgramMemory {
    fn erase_page(&mut self, base: u32) -> Result<()> {
        if base as usize % self.page_size != 0 {
            return Err(Error::InvalidAlignment);
        }
        let start = self.check_range(base, self.page_size)?;
        log::trace!("erase page 0x{:05X}", base);
        self.data[start..start + self.page_size].fill(0xFF);
        self.ops.push(MemoryOp::Erase(base));
        Ok(())
    }

    fn program_halfword(&mut self, addr: u32, value: u16) -> Result<()> {
        if addr % 2 != 0 {
            return Err(Error::InvalidAlignment);
        }
        let start = self.check_range(addr, 2)?;
        let [lo, hi] = value.to_le_bytes();
        self.data[start] &= lo;
        self.data[start + 1] &= hi;
        self.ops.push(MemoryOp::Program(addr, value));
        Ok(())
    }

    fn finish_page(&mut self, base: u32) -> Result<()> {
        self.ops.push(MemoryOp::Finish(base));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_erase_then_program() {
        let mut memory = DummyProgramMemory::with_data(1024, 256, 768, &[0x00; 1024]);
        memory.erase_page(256).unwrap();
        assert!(memory.data()[256..512].iter().all(|&b| b == 0xFF));
        assert_eq!(memory.data()[255], 0x00);

        memory.program_halfword(258, 0x1234).unwrap();
        assert_eq!(&memory.data()[258..260], &[0x34, 0x12]);
        memory.finish_page(256).unwrap();

        assert_eq!(
            memory.ops(),
            &[
                MemoryOp::Erase(256),
                MemoryOp::Program(258, 0x1234),
                MemoryOp::Finish(256)
            ]
        );
        assert_eq!(memory.touched_pages(), vec![256]);
    }

    #[test]
    fn test_program_only_clears_bits() {
        let mut memory = DummyProgramMemory::new(512, 256, 512);
        memory.program_halfword(0, 0xF0F0).unwrap();
        memory.program_halfword(0, 0x0FFF).unwrap();
        assert_eq!(&memory.data()[0..2], &[0xF0, 0x00]);
        assert_eq!(memory.program_count(), 2);
    }

    #[test]
    fn test_refuses_protected_region() {
        let mut memory = DummyProgramMemory::new(1024, 256, 768);
        assert_eq!(memory.erase_page(768), Err(Error::RegionProtected));
        assert_eq!(memory.program_halfword(766, 0), Ok(()));
        assert_eq!(memory.program_halfword(768, 0), Err(Error::RegionProtected));
        assert_eq!(memory.erase_count(), 0);
    }

    #[test]
    fn test_alignment_and_bounds() {
        let mut memory = DummyProgramMemory::new(512, 256, 4096);
        assert_eq!(memory.erase_page(100), Err(Error::InvalidAlignment));
        assert_eq!(memory.program_halfword(3, 0), Err(Error::InvalidAlignment));
        assert_eq!(memory.erase_page(512), Err(Error::AddressOutOfBounds));
        assert!(memory.ops().is_empty());
    }
}
