//! Page-buffered programming of the internal flash
//!
//! Data bytes arrive in arbitrary order. [`PageProgrammer`] keeps exactly
//! one page in RAM, fills untouched bytes with `0xFF`, and commits the page
//! (erase, program every halfword, finish) once the write cursor moves to a
//! different page or the stream ends.
//!
//! A page is committed each time the cursor leaves it, so an image that
//! revisits a page after touching another one overwrites the earlier
//! commit with a page holding only the later bytes.

use crate::error::Result;
use crate::hex::DataSink;
use crate::programmer::ProgramMemory;

/// Filler for page bytes the image never mentions
pub const ERASED: u8 = 0xFF;

/// Single-page write buffer in front of a [`ProgramMemory`]
pub struct PageProgrammer<'a, M: ProgramMemory + ?Sized, const PAGE: usize> {
    memory: &'a mut M,
    buf: [u8; PAGE],
    base: Option<u32>,
    dirty: bool,
    pages_committed: u32,
}

impl<'a, M: ProgramMemory + ?Sized, const PAGE: usize> PageProgrammer<'a, M, PAGE> {
    /// Create a programmer with an empty, clean buffer
    ///
    /// `PAGE` must be non-zero and even; anything else fails to build:
    ///
    /// ```compile_fail
    /// # use exup_core::page::PageProgrammer;
    /// # use exup_core::programmer::ProgramMemory;
    /// # struct Nvm;
    /// # impl ProgramMemory for Nvm {
    /// #     fn erase_page(&mut self, _: u32) -> exup_core::Result<()> { Ok(()) }
    /// #     fn program_halfword(&mut self, _: u32, _: u16) -> exup_core::Result<()> { Ok(()) }
    /// # }
    /// let mut nvm = Nvm;
    /// let _ = PageProgrammer::<_, 7>::new(&mut nvm);
    /// ```
    pub fn new(memory: &'a mut M) -> Self {
        const { assert!(PAGE > 0 && PAGE % 2 == 0, "page size must be even and non-zero") };
        Self {
            memory,
            buf: [ERASED; PAGE],
            base: None,
            dirty: false,
            pages_committed: 0,
        }
    }

    /// Base address of `addr`'s page
    pub const fn page_base(addr: u32) -> u32 {
        addr - addr % PAGE as u32
    }

    /// Base of the currently buffered page, if any
    pub fn current_base(&self) -> Option<u32> {
        self.base
    }

    /// Whether the buffered page holds uncommitted bytes
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of pages erased and programmed so far
    pub fn pages_committed(&self) -> u32 {
        self.pages_committed
    }

    /// Buffer `value` for `addr`, committing the previous page first if the
    /// cursor moved
    pub fn write_byte(&mut self, addr: u32, value: u8) -> Result<()> {
        let base = Self::page_base(addr);
        if self.base != Some(base) {
            self.flush()?;
            self.buf.fill(ERASED);
            self.base = Some(base);
        }
        self.buf[(addr - base) as usize] = value;
        self.dirty = true;
        Ok(())
    }

    /// Commit the buffered page if it is dirty
    pub fn flush(&mut self) -> Result<()> {
        let base = match self.base {
            Some(base) if self.dirty => base,
            _ => return Ok(()),
        };

        log::debug!("committing page 0x{:05X}", base);
        self.memory.erase_page(base)?;
        for (i, pair) in self.buf.chunks_exact(2).enumerate() {
            let value = u16::from_le_bytes([pair[0], pair[1]]);
            self.memory.program_halfword(base + 2 * i as u32, value)?;
        }
        self.memory.finish_page(base)?;

        self.dirty = false;
        self.pages_committed += 1;
        Ok(())
    }
}

impl<M: ProgramMemory + ?Sized, const PAGE: usize> DataSink for PageProgrammer<'_, M, PAGE> {
    fn write_byte(&mut self, addr: u32, value: u8) -> Result<()> {
        PageProgrammer::write_byte(self, addr, value)
    }

    fn flush(&mut self) -> Result<()> {
        PageProgrammer::flush(self)
    }
}
