//! Staged image footer
//!
//! The footer is a 16-byte record at the start of the last sector of the
//! external flash:
//!
//! | Offset | Size | Field                          |
//! |--------|------|--------------------------------|
//! | 0      | 6    | magic (`"EXUPv1"`)             |
//! | 6      | 2    | reserved                       |
//! | 8      | 4    | image size, little endian      |
//! | 12     | 4    | FNV-1a of the image, little endian |
//!
//! A footer that does not validate means "no update pending".

use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::UpdateConfig;
use crate::error::Result;
use crate::flash::BlockReader;

/// Size of the footer record in bytes
pub const FOOTER_LEN: usize = 16;

/// Size of the magic tag in bytes
pub const MAGIC_LEN: usize = 6;

/// On-flash layout of the footer
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct RawFooter {
    /// Tag identifying a valid footer
    pub magic: [u8; MAGIC_LEN],
    /// Unused
    pub reserved: [u8; 2],
    /// Length of the staged image in bytes
    pub image_size: U32<LittleEndian>,
    /// FNV-1a hash of the staged image
    pub image_hash: U32<LittleEndian>,
}

/// A validated footer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    /// Length of the staged image in bytes, `0 < image_size <= max_image_size`
    pub image_size: u32,
    /// FNV-1a hash the staged image must have
    pub image_hash: u32,
}

impl Footer {
    /// Validate a raw 16-byte footer
    ///
    /// Returns `None` if the magic does not match or the size is zero or
    /// larger than the space below the footer sector.
    pub fn parse(bytes: &[u8; FOOTER_LEN], config: &UpdateConfig) -> Option<Self> {
        let raw = RawFooter::ref_from_bytes(bytes.as_slice()).ok()?;
        if raw.magic != config.magic {
            return None;
        }

        let image_size = raw.image_size.get();
        if image_size == 0 || image_size > config.max_image_size() {
            return None;
        }

        Some(Self {
            image_size,
            image_hash: raw.image_hash.get(),
        })
    }

    /// Encode the footer with the given magic (reserved bytes are 0xFF)
    pub fn encode(&self, magic: &[u8; MAGIC_LEN]) -> [u8; FOOTER_LEN] {
        let raw = RawFooter {
            magic: *magic,
            reserved: [0xFF; 2],
            image_size: U32::new(self.image_size),
            image_hash: U32::new(self.image_hash),
        };
        let mut out = [0u8; FOOTER_LEN];
        out.copy_from_slice(raw.as_bytes());
        out
    }
}

/// Read and validate the footer
///
/// Reads exactly [`FOOTER_LEN`] bytes at [`UpdateConfig::footer_addr`].
/// `Ok(None)` means no update is pending; `Err` means the read itself failed.
pub fn read_footer<R: BlockReader + ?Sized>(
    reader: &mut R,
    config: &UpdateConfig,
) -> Result<Option<Footer>> {
    let mut bytes = [0u8; FOOTER_LEN];
    reader.read(config.footer_addr(), &mut bytes)?;

    let footer = Footer::parse(&bytes, config);
    match &footer {
        Some(f) => log::debug!(
            "footer: image {} bytes, hash 0x{:08X}",
            f.image_size,
            f.image_hash
        ),
        None => log::debug!("footer: none at 0x{:X}", config.footer_addr()),
    }
    Ok(footer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flash::SliceReader;

    fn raw(magic: &[u8; 6], size: u32, hash: u32) -> [u8; FOOTER_LEN] {
        let mut bytes = [0u8; FOOTER_LEN];
        bytes[..6].copy_from_slice(magic);
        bytes[8..12].copy_from_slice(&size.to_le_bytes());
        bytes[12..16].copy_from_slice(&hash.to_le_bytes());
        bytes
    }

    #[test]
    fn test_layout_is_packed() {
        assert_eq!(core::mem::size_of::<RawFooter>(), FOOTER_LEN);
    }

    #[test]
    fn test_parse_valid() {
        let config = UpdateConfig::default();
        let footer = Footer::parse(&raw(b"EXUPv1", 32, 0xDEADBEEF), &config).unwrap();
        assert_eq!(footer.image_size, 32);
        assert_eq!(footer.image_hash, 0xDEADBEEF);
    }

    #[test]
    fn test_parse_rejects() {
        let config = UpdateConfig::default();
        let max = config.max_image_size();
        assert!(Footer::parse(&raw(b"EXUPv0", 32, 0), &config).is_none());
        assert!(Footer::parse(&raw(b"EXUPv1", 0, 0), &config).is_none());
        assert!(Footer::parse(&raw(b"EXUPv1", max + 1, 0), &config).is_none());
        assert!(Footer::parse(&raw(b"EXUPv1", max, 0), &config).is_some());
        assert!(Footer::parse(&[0xFF; FOOTER_LEN], &config).is_none());
    }

    #[test]
    fn test_encode_matches_layout() {
        let footer = Footer {
            image_size: 0x0001_0304,
            image_hash: 0xA1B2_C3D4,
        };
        let bytes = footer.encode(b"EXUPv1");
        assert_eq!(&bytes[..6], b"EXUPv1");
        assert_eq!(&bytes[8..12], &[0x04, 0x03, 0x01, 0x00]);
        assert_eq!(&bytes[12..16], &[0xD4, 0xC3, 0xB2, 0xA1]);
        assert_eq!(Footer::parse(&bytes, &UpdateConfig::default()), Some(footer));
    }

    #[test]
    fn test_read_footer() {
        let config = UpdateConfig {
            flash_size: 0x2000,
            sector_size: 0x1000,
            ..Default::default()
        };
        let mut image = [0xFFu8; 0x2000];
        image[0x1000..0x1010].copy_from_slice(&raw(b"EXUPv1", 10, 7));
        let mut reader = SliceReader::new(&image);
        let footer = read_footer(&mut reader, &config).unwrap().unwrap();
        assert_eq!(footer.image_size, 10);

        let blank = [0xFFu8; 0x2000];
        let mut reader = SliceReader::new(&blank);
        assert_eq!(read_footer(&mut reader, &config), Ok(None));
    }
}
