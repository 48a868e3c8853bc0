//! `inspect` command

use std::path::Path;

use exup_core::config::TargetConfig;
use exup_core::flash::SliceReader;
use exup_core::footer::read_footer;
use exup_core::hash::hash_range;
use exup_core::update::NoProgress;
use exup_core::UpdateError;

use super::{print_scan, read_file, scan_hex, CommandError};

/// Check a staged flash image the way the bootloader would
pub fn run(target: &TargetConfig, input: &Path) -> Result<(), CommandError> {
    let image = read_file(input)?;
    let config = &target.update;
    if image.len() != config.flash_size as usize {
        return Err(CommandError::ImageSize {
            size: image.len(),
            expected: config.flash_size,
        });
    }

    let mut reader = SliceReader::new(&image);
    let footer = match read_footer(&mut reader, config)? {
        Some(footer) => footer,
        None => {
            println!("No update pending (no valid footer at 0x{:X})", config.footer_addr());
            return Ok(());
        }
    };

    println!("Footer address:  0x{:X}", config.footer_addr());
    println!("Image size:      {} bytes", footer.image_size);
    println!("Footer hash:     0x{:08X}", footer.image_hash);

    let actual = hash_range(&mut reader, footer.image_size, &mut NoProgress)?;
    if actual != footer.image_hash {
        println!("Computed hash:   0x{:08X} (MISMATCH)", actual);
        return Err(UpdateError::IntegrityMismatch {
            expected: footer.image_hash,
            actual,
        }
        .into());
    }
    println!("Computed hash:   0x{:08X} (OK)", actual);

    let (stats, span) = scan_hex(&image[..footer.image_size as usize], target)?;
    print_scan(&stats, &span);
    Ok(())
}
