//! `pack` command

use std::path::Path;

use exup_core::config::TargetConfig;
use exup_dummy::image::{footer_for, stage_image};

use super::{print_scan, read_file, scan_hex, write_file, CommandError};

/// Whether `data` starts like Intel HEX text
fn looks_like_hex(data: &[u8]) -> bool {
    data.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b':')
}

/// Build a staged flash image from an Intel HEX file
pub fn run(target: &TargetConfig, input: &Path, output: &Path) -> Result<(), CommandError> {
    let hex = read_file(input)?;
    if !looks_like_hex(&hex) {
        return Err(CommandError::NotHex(input.to_path_buf()));
    }

    let (stats, span) = scan_hex(&hex, target)?;
    let image = stage_image(&target.update, &hex)?;
    let footer = footer_for(&hex);
    write_file(output, &image)?;

    println!("Image size:      {} bytes", footer.image_size);
    println!("Image hash:      0x{:08X}", footer.image_hash);
    println!("Footer address:  0x{:X}", target.update.footer_addr());
    print_scan(&stats, &span);
    println!("Wrote {} bytes to {:?}", image.len(), output);
    Ok(())
}
