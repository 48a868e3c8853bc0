//! Target configuration
//!
//! [`UpdateConfig`] describes the external flash geometry, the footer magic
//! and where the bootloader's own code starts. The defaults match an
//! ATmega2560 with a 4 KiB boot section and a 2 MiB SPI NOR.
//!
//! With the `std` feature a [`TargetConfig`] can be loaded from TOML:
//!
//! ```toml
//! [flash]
//! size = "2 MiB"
//! sector_size = "4 KiB"
//! magic = "EXUPv1"
//!
//! [target]
//! page_size = 512
//! protected_start = 0x3F000
//! program_size = "256 KiB"
//! ```

use core::fmt;

use crate::footer::{FOOTER_LEN, MAGIC_LEN};

#[cfg(feature = "std")]
mod toml;

#[cfg(feature = "std")]
pub use self::toml::{load_config, parse_config, TargetConfig};

/// Page size of the default target (ATmega2560 `SPM_PAGESIZE`)
pub const DEFAULT_PAGE_SIZE: usize = 512;

/// Working buffer size for streaming reads from the external flash
pub const READ_CHUNK: usize = 256;

/// Default footer magic
pub const DEFAULT_MAGIC: [u8; MAGIC_LEN] = *b"EXUPv1";

/// Update engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateConfig {
    /// Total size of the external flash in bytes
    pub flash_size: u32,
    /// Smallest erase unit of the external flash; the footer lives in the
    /// last sector
    pub sector_size: u32,
    /// First address of the bootloader region in program memory; nothing
    /// at or above it is ever erased or programmed
    pub protected_start: u32,
    /// Tag identifying a valid footer
    pub magic: [u8; MAGIC_LEN],
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            flash_size: 2 * 1024 * 1024,
            sector_size: 4096,
            protected_start: 0x3F000,
            magic: DEFAULT_MAGIC,
        }
    }
}

impl UpdateConfig {
    /// Address of the footer record (start of the last sector)
    ///
    /// Saturates to 0 for a geometry [`validate`](Self::validate) rejects.
    pub const fn footer_addr(&self) -> u32 {
        self.flash_size.saturating_sub(self.sector_size)
    }

    /// Largest image the footer may declare
    pub const fn max_image_size(&self) -> u32 {
        self.footer_addr()
    }

    /// Check the configuration for a target with `page_size`-byte pages
    pub fn validate(&self, page_size: usize) -> Result<(), ConfigError> {
        if self.sector_size < FOOTER_LEN as u32 || self.sector_size >= self.flash_size {
            return Err(ConfigError::InvalidSectorSize {
                sector_size: self.sector_size,
                flash_size: self.flash_size,
            });
        }
        if self.flash_size % self.sector_size != 0 {
            return Err(ConfigError::UnalignedFlashSize {
                flash_size: self.flash_size,
                sector_size: self.sector_size,
            });
        }
        if page_size == 0 || page_size % 2 != 0 || page_size > u32::MAX as usize {
            return Err(ConfigError::InvalidPageSize { page_size });
        }
        // A page straddling the boundary would be erased as a whole.
        if self.protected_start % page_size as u32 != 0 {
            return Err(ConfigError::MisalignedProtectedStart {
                protected_start: self.protected_start,
                page_size,
            });
        }
        Ok(())
    }
}

/// Errors that can occur when building a configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Sector size cannot hold the footer or leaves no room for an image
    InvalidSectorSize {
        /// Configured sector size
        sector_size: u32,
        /// Configured flash size
        flash_size: u32,
    },
    /// Flash size is not a whole number of sectors, so the footer would not
    /// start on a sector boundary
    UnalignedFlashSize {
        /// Configured flash size
        flash_size: u32,
        /// Configured sector size
        sector_size: u32,
    },
    /// Page size is zero or odd
    InvalidPageSize {
        /// Configured page size
        page_size: usize,
    },
    /// Protected region does not start on a page boundary
    MisalignedProtectedStart {
        /// Configured boundary
        protected_start: u32,
        /// Configured page size
        page_size: usize,
    },
    /// Protected region starts beyond the end of program memory
    ProtectedStartOutOfBounds,
    /// Magic must be exactly six bytes
    InvalidMagic,
    /// Failed to parse configuration file
    ParseError,
    /// I/O error
    IoError,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSectorSize {
                sector_size,
                flash_size,
            } => write!(
                f,
                "invalid sector size {} for a {} byte flash",
                sector_size, flash_size
            ),
            Self::UnalignedFlashSize {
                flash_size,
                sector_size,
            } => write!(
                f,
                "flash size {} is not a multiple of the {} byte sector size",
                flash_size, sector_size
            ),
            Self::InvalidPageSize { page_size } => {
                write!(f, "invalid page size {} (must be even and non-zero)", page_size)
            }
            Self::MisalignedProtectedStart {
                protected_start,
                page_size,
            } => write!(
                f,
                "protected start 0x{:X} is not aligned to the {} byte page size",
                protected_start, page_size
            ),
            Self::ProtectedStartOutOfBounds => {
                write!(f, "protected start is beyond program memory")
            }
            Self::InvalidMagic => write!(f, "footer magic must be {} bytes", MAGIC_LEN),
            Self::ParseError => write!(f, "failed to parse configuration"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}
