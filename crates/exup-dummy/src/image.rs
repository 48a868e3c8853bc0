//! Staged image builders
//!
//! [`HexWriter`] produces Intel HEX text the way common toolchains do
//! (16-byte data rows, extended linear address records when the upper
//! address bits change). [`stage_image`] lays hex text out on an external
//! flash image with a matching footer.

use std::fmt::Write as _;

use exup_core::config::UpdateConfig;
use exup_core::footer::{Footer, FOOTER_LEN};
use exup_core::hash::Fnv1a;
use exup_core::hex::{RecordType, MAX_PAYLOAD};
use thiserror::Error;

/// Data bytes per row written by [`HexWriter::new`]
pub const DEFAULT_ROW_LEN: usize = 16;

/// Errors from building images
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImageError {
    /// Nothing to stage
    #[error("hex image is empty")]
    Empty,
    /// Image does not fit below the footer sector
    #[error("hex image is {size} bytes, at most {max} bytes fit below the footer")]
    TooLarge {
        /// Image length
        size: usize,
        /// Largest allowed image
        max: u32,
    },
    /// Payload cannot be described by an 8-bit byte count
    #[error("payload of {0} bytes does not fit in one record")]
    RecordTooLong(usize),
    /// Row length outside `1..=MAX_PAYLOAD`
    #[error("row length {0} must be between 1 and 64")]
    InvalidRowLength(usize),
}

/// Encode one record, including the leading `:` and a trailing `\n`
pub fn encode_record(
    kind: RecordType,
    offset: u16,
    payload: &[u8],
) -> Result<String, ImageError> {
    if payload.len() > u8::MAX as usize {
        return Err(ImageError::RecordTooLong(payload.len()));
    }
    let mut line = String::new();
    write_record(&mut line, kind, offset, payload);
    Ok(line)
}

fn write_record(out: &mut String, kind: RecordType, offset: u16, payload: &[u8]) {
    let [hi, lo] = offset.to_be_bytes();
    let header = [payload.len() as u8, hi, lo, kind.code()];
    let sum = header
        .iter()
        .chain(payload)
        .fold(0u8, |sum, &b| sum.wrapping_add(b));

    out.push(':');
    for byte in header.iter().chain(payload) {
        let _ = write!(out, "{:02X}", byte);
    }
    let _ = writeln!(out, "{:02X}", sum.wrapping_neg());
}

/// Incremental Intel HEX writer
#[derive(Debug, Clone)]
pub struct HexWriter {
    out: String,
    upper: u16,
    row_len: usize,
}

impl Default for HexWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl HexWriter {
    /// Writer emitting 16-byte rows
    pub fn new() -> Self {
        Self {
            out: String::new(),
            upper: 0,
            row_len: DEFAULT_ROW_LEN,
        }
    }

    /// Writer emitting rows of `row_len` bytes
    pub fn with_row_len(row_len: usize) -> Result<Self, ImageError> {
        if row_len == 0 || row_len > MAX_PAYLOAD {
            return Err(ImageError::InvalidRowLength(row_len));
        }
        Ok(Self {
            row_len,
            ..Self::new()
        })
    }

    /// Append data records for `bytes` starting at absolute address `addr`
    ///
    /// Rows never cross a 64 KiB boundary. An extended linear address
    /// record is emitted whenever the upper 16 bits change.
    pub fn data(&mut self, addr: u32, bytes: &[u8]) -> &mut Self {
        let mut addr = addr;
        let mut rest = bytes;
        while !rest.is_empty() {
            let upper = (addr >> 16) as u16;
            if upper != self.upper {
                write_record(
                    &mut self.out,
                    RecordType::ExtendedLinearAddress,
                    0,
                    &upper.to_be_bytes(),
                );
                self.upper = upper;
            }

            let offset = addr as u16;
            let to_boundary = 0x1_0000 - offset as usize;
            let n = rest.len().min(self.row_len).min(to_boundary);
            write_record(&mut self.out, RecordType::Data, offset, &rest[..n]);

            rest = &rest[n..];
            addr = addr.wrapping_add(n as u32);
        }
        self
    }

    /// Append an arbitrary record
    pub fn record(
        &mut self,
        kind: RecordType,
        offset: u16,
        payload: &[u8],
    ) -> Result<&mut Self, ImageError> {
        self.out.push_str(&encode_record(kind, offset, payload)?);
        Ok(self)
    }

    /// Text written so far, without the EndOfFile record
    pub fn as_str(&self) -> &str {
        &self.out
    }

    /// Append the EndOfFile record and return the text
    pub fn finish(mut self) -> String {
        write_record(&mut self.out, RecordType::EndOfFile, 0, &[]);
        self.out
    }
}

/// Footer describing `hex`
pub fn footer_for(hex: &[u8]) -> Footer {
    Footer {
        image_size: hex.len() as u32,
        image_hash: Fnv1a::digest(hex),
    }
}

/// Build a full external flash image staging `hex`
///
/// The hex text sits at address 0, the footer at
/// [`UpdateConfig::footer_addr`], and everything else is erased (0xFF).
pub fn stage_image(config: &UpdateConfig, hex: &[u8]) -> Result<Vec<u8>, ImageError> {
    if hex.is_empty() {
        return Err(ImageError::Empty);
    }
    let max = config.max_image_size();
    if hex.len() > max as usize {
        return Err(ImageError::TooLarge {
            size: hex.len(),
            max,
        });
    }

    let footer = footer_for(hex);
    let mut image = vec![0xFF; config.flash_size as usize];
    image[..hex.len()].copy_from_slice(hex);
    let at = config.footer_addr() as usize;
    image[at..at + FOOTER_LEN].copy_from_slice(&footer.encode(&config.magic));

    log::debug!(
        "staged {} bytes (hash 0x{:08X}), footer at 0x{:X}",
        footer.image_size,
        footer.image_hash,
        at
    );
    Ok(image)
}
