//! Error types for exup-core
//!
//! Two layers of errors exist:
//!
//! - [`Error`] - failures of the platform capabilities (SPI bus, external
//!   flash reads, internal flash erase/program)
//! - [`UpdateError`] - why an update attempt did not complete
//!
//! Both are `no_std` compatible. At the bootloader entry point every
//! [`UpdateError`] collapses to "boot the resident application".

use core::fmt;

use crate::hex::RecordError;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // SPI errors
    /// Opcode is not supported by the SPI device
    OpcodeNotSupported,

    // External flash errors
    /// Read from the external flash failed
    ReadError,
    /// Address is beyond the end of the device
    AddressOutOfBounds,

    // Program memory errors
    /// Page erase failed
    EraseError {
        /// Base address of the page
        addr: u32,
    },
    /// Halfword program failed
    WriteError {
        /// Address of the halfword
        addr: u32,
    },
    /// Address is inside the protected bootloader region
    RegionProtected,
    /// Operation requires an aligned address
    InvalidAlignment,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpcodeNotSupported => write!(f, "SPI opcode not supported"),
            Self::ReadError => write!(f, "read operation failed"),
            Self::AddressOutOfBounds => write!(f, "address out of bounds"),
            Self::EraseError { addr } => write!(f, "page erase failed at 0x{:08X}", addr),
            Self::WriteError { addr } => write!(f, "program failed at 0x{:08X}", addr),
            Self::RegionProtected => write!(f, "region is protected"),
            Self::InvalidAlignment => write!(f, "invalid alignment"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;

/// Reasons an update attempt ends without applying a new image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateError {
    /// Footer missing, magic mismatch, or image size out of bounds
    NoUpdatePending,
    /// Streamed hash of the staged image differs from the footer
    IntegrityMismatch {
        /// Hash declared by the footer
        expected: u32,
        /// Hash computed over the staged bytes
        actual: u32,
    },
    /// A hex record failed structural decode
    MalformedRecord(RecordError),
    /// The declared image ended without an EndOfFile record
    TruncatedImage,
    /// A platform capability failed while reading or programming
    Storage(Error),
}

impl UpdateError {
    /// Returns true unless the footer said there was nothing to do
    ///
    /// A missing footer is the normal boot path and is not worth a warning.
    pub fn is_pending(&self) -> bool {
        !matches!(self, Self::NoUpdatePending)
    }
}

impl From<Error> for UpdateError {
    fn from(err: Error) -> Self {
        Self::Storage(err)
    }
}

impl From<RecordError> for UpdateError {
    fn from(err: RecordError) -> Self {
        Self::MalformedRecord(err)
    }
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoUpdatePending => write!(f, "no update pending"),
            Self::IntegrityMismatch { expected, actual } => write!(
                f,
                "image hash mismatch: footer 0x{:08X}, computed 0x{:08X}",
                expected, actual
            ),
            Self::MalformedRecord(err) => write!(f, "malformed record: {}", err),
            Self::TruncatedImage => write!(f, "image ended without an EOF record"),
            Self::Storage(err) => write!(f, "storage error: {}", err),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for UpdateError {}
