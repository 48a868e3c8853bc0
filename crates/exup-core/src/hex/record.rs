//! Intel HEX record decoding

use core::fmt;

use heapless::Vec;

/// Largest payload accepted in a single record
pub const MAX_PAYLOAD: usize = 64;

/// Longest record line accepted, in characters after the `:`
///
/// Byte count, 16-bit offset, type, payload and checksum, two hex digits
/// per byte.
pub const MAX_LINE: usize = 2 * (4 + MAX_PAYLOAD + 1);

/// Characters taken by byte count, offset and type
const HEADER_CHARS: usize = 8;

/// Record type field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    /// 0x00 - payload bytes at `extended_base + offset`
    Data,
    /// 0x01 - end of the image
    EndOfFile,
    /// 0x04 - upper 16 bits of subsequent data addresses
    ExtendedLinearAddress,
    /// Any other type; consumed and ignored
    Other(u8),
}

impl RecordType {
    /// Map a type byte to a record type
    pub const fn from_code(code: u8) -> Self {
        match code {
            0x00 => Self::Data,
            0x01 => Self::EndOfFile,
            0x04 => Self::ExtendedLinearAddress,
            other => Self::Other(other),
        }
    }

    /// Type byte as written in the record
    pub const fn code(self) -> u8 {
        match self {
            Self::Data => 0x00,
            Self::EndOfFile => 0x01,
            Self::ExtendedLinearAddress => 0x04,
            Self::Other(code) => code,
        }
    }
}

/// Structural failures of a single record
///
/// Positions count characters after the leading `:`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    /// A character that is not a hex digit where one was required
    InvalidDigit {
        /// Position of the offending character
        position: usize,
    },
    /// Line ends before the checksum
    TooShort {
        /// Characters required by the byte count
        expected: usize,
        /// Characters present
        actual: usize,
    },
    /// Byte count exceeds [`MAX_PAYLOAD`]
    PayloadTooLong {
        /// Declared byte count
        byte_count: u8,
    },
    /// Sum of all record bytes is not zero
    ChecksumMismatch {
        /// Sum of all record bytes including the checksum, mod 256
        sum: u8,
    },
    /// Extended linear address record without exactly two payload bytes
    ExtendedAddressLength {
        /// Declared byte count
        byte_count: u8,
    },
    /// Line exceeds [`MAX_LINE`] characters
    LineOverflow,
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDigit { position } => {
                write!(f, "invalid hex digit at position {}", position)
            }
            Self::TooShort { expected, actual } => write!(
                f,
                "record too short: need {} characters, got {}",
                expected, actual
            ),
            Self::PayloadTooLong { byte_count } => write!(
                f,
                "payload of {} bytes exceeds {} byte limit",
                byte_count, MAX_PAYLOAD
            ),
            Self::ChecksumMismatch { sum } => {
                write!(f, "checksum mismatch (sum 0x{:02X})", sum)
            }
            Self::ExtendedAddressLength { byte_count } => write!(
                f,
                "extended linear address record with {} payload bytes",
                byte_count
            ),
            Self::LineOverflow => write!(f, "line longer than {} characters", MAX_LINE),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RecordError {}

/// One decoded, checksum-verified record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// 16-bit load offset
    pub offset: u16,
    /// Record type
    pub kind: RecordType,
    /// Payload bytes; the byte count is `payload.len()`
    pub payload: Vec<u8, MAX_PAYLOAD>,
}

impl Record {
    /// Decode a record from the characters between `:` and the line end
    ///
    /// Characters beyond the checksum are ignored.
    pub fn decode(line: &[u8]) -> Result<Self, RecordError> {
        if line.len() < HEADER_CHARS {
            return Err(RecordError::TooShort {
                expected: HEADER_CHARS + 2,
                actual: line.len(),
            });
        }

        let byte_count = hex_byte_at(line, 0)?;
        let offset_hi = hex_byte_at(line, 2)?;
        let offset_lo = hex_byte_at(line, 4)?;
        let kind = hex_byte_at(line, 6)?;

        if byte_count as usize > MAX_PAYLOAD {
            return Err(RecordError::PayloadTooLong { byte_count });
        }
        let expected = HEADER_CHARS + 2 * byte_count as usize + 2;
        if line.len() < expected {
            return Err(RecordError::TooShort {
                expected,
                actual: line.len(),
            });
        }

        let mut sum = byte_count
            .wrapping_add(offset_hi)
            .wrapping_add(offset_lo)
            .wrapping_add(kind);

        let mut payload = Vec::new();
        let mut pos = HEADER_CHARS;
        for _ in 0..byte_count {
            let byte = hex_byte_at(line, pos)?;
            payload
                .push(byte)
                .map_err(|_| RecordError::PayloadTooLong { byte_count })?;
            sum = sum.wrapping_add(byte);
            pos += 2;
        }

        let checksum = hex_byte_at(line, pos)?;
        sum = sum.wrapping_add(checksum);
        if sum != 0 {
            return Err(RecordError::ChecksumMismatch { sum });
        }

        Ok(Self {
            offset: u16::from_be_bytes([offset_hi, offset_lo]),
            kind: RecordType::from_code(kind),
            payload,
        })
    }

    /// Declared byte count
    pub fn byte_count(&self) -> u8 {
        self.payload.len() as u8
    }

    /// Address base carried by an extended linear address record
    ///
    /// The two payload bytes are the big-endian upper 16 bits.
    pub fn extended_base(&self) -> Result<u32, RecordError> {
        match self.payload.as_slice() {
            [hi, lo] => Ok(u32::from(u16::from_be_bytes([*hi, *lo])) << 16),
            _ => Err(RecordError::ExtendedAddressLength {
                byte_count: self.byte_count(),
            }),
        }
    }
}

/// Value of one hex digit
fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'F' => Some(c - b'A' + 10),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}

/// Decode the two hex digits at `pos`
fn hex_byte_at(line: &[u8], pos: usize) -> Result<u8, RecordError> {
    let hi = nibble(line[pos]).ok_or(RecordError::InvalidDigit { position: pos })?;
    let lo = nibble(line[pos + 1]).ok_or(RecordError::InvalidDigit { position: pos + 1 })?;
    Ok((hi << 4) | lo)
}
