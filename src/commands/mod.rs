//! CLI command implementations
//!
//! Every command works on files only. `simulate` drives the emulators from
//! `exup-dummy`; `pack` and `inspect` reuse the engine's parser with a
//! [`ScanSink`] that only records where data would land.

pub mod inspect;
pub mod pack;
mod progress;
pub mod simulate;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use exup_core::config::{ConfigError, TargetConfig};
use exup_core::error::Result as CoreResult;
use exup_core::flash::SliceReader;
use exup_core::hex::{apply_image, DataSink, HexParser, ParseStats};
use exup_core::update::NoProgress;
use exup_core::UpdateError;
use exup_dummy::image::ImageError;
use thiserror::Error;

pub use progress::IndicatifProgress;

/// Errors reported by CLI commands
#[derive(Debug, Error)]
pub enum CommandError {
    /// File could not be read or written
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Target description could not be loaded
    #[error("failed to load {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },

    /// Target description is inconsistent
    #[error("invalid target configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// Input is not Intel HEX text
    #[error("{} does not look like Intel HEX (expected ':' as first character)", .0.display())]
    NotHex(PathBuf),

    /// Flash image has the wrong length for the target
    #[error("flash image is {size} bytes, target flash is {expected} bytes")]
    ImageSize { size: usize, expected: u32 },

    /// Page size has no engine instantiation
    #[error("unsupported page size {0} (supported: 128, 256, 512, 1024, 2048, 4096)")]
    PageSize(usize),

    /// Staged image could not be built
    #[error(transparent)]
    Image(#[from] ImageError),

    /// Reading the flash image failed
    #[error("flash image access failed: {0}")]
    Storage(#[from] exup_core::Error),

    /// Validation or update failed
    #[error("{0}")]
    Update(#[from] UpdateError),
}

/// Read a whole file
pub(crate) fn read_file(path: &Path) -> Result<Vec<u8>, CommandError> {
    let data = fs::read(path).map_err(|source| CommandError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("Read {} bytes from {:?}", data.len(), path);
    Ok(data)
}

/// Write a whole file
pub(crate) fn write_file(path: &Path, data: &[u8]) -> Result<(), CommandError> {
    fs::write(path, data).map_err(|source| CommandError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// [`DataSink`] that records the address span instead of programming
#[derive(Debug, Default, Clone, Copy)]
pub struct ScanSink {
    /// Lowest address written
    pub lowest: Option<u32>,
    /// Highest address written
    pub highest: Option<u32>,
}

impl DataSink for ScanSink {
    fn write_byte(&mut self, addr: u32, _value: u8) -> CoreResult<()> {
        self.lowest = Some(self.lowest.map_or(addr, |low| low.min(addr)));
        self.highest = Some(self.highest.map_or(addr, |high| high.max(addr)));
        Ok(())
    }

    fn flush(&mut self) -> CoreResult<()> {
        Ok(())
    }
}

/// Parse `hex` the way the bootloader would, without programming anything
pub fn scan_hex(hex: &[u8], target: &TargetConfig) -> Result<(ParseStats, ScanSink), UpdateError> {
    let mut reader = SliceReader::new(hex);
    let mut parser = HexParser::new(target.update.protected_start);
    let mut sink = ScanSink::default();
    let stats = apply_image(
        &mut reader,
        hex.len() as u32,
        &mut parser,
        &mut sink,
        &mut NoProgress,
    )?;
    Ok((stats, sink))
}

/// Print the parse summary shared by `pack` and `inspect`
fn print_scan(stats: &ParseStats, sink: &ScanSink) {
    println!("Records:         {}", stats.records);
    println!("Data bytes:      {}", stats.data_bytes);
    if let (Some(low), Some(high)) = (sink.lowest, sink.highest) {
        println!("Address span:    0x{:05X} - 0x{:05X}", low, high);
    }
    if stats.discarded_bytes > 0 {
        println!(
            "Protected:       {} bytes in the bootloader region will be skipped",
            stats.discarded_bytes
        );
    }
}
