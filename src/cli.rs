//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

#[derive(Parser)]
#[command(name = "exup")]
#[command(author, version, about = "EXUP staged firmware update tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Target description (TOML). Defaults to an ATmega2560 with a 2 MiB
    /// SPI flash
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the start of the protected bootloader region (hex, e.g. 0x3F000)
    #[arg(long, global = true, value_parser = parse_hex_u32)]
    pub protected_start: Option<u32>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pack an Intel HEX file into a staged external flash image
    Pack {
        /// Intel HEX input file
        #[arg(short, long)]
        input: PathBuf,

        /// Flash image output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show and check the footer of a staged flash image
    Inspect {
        /// Flash image file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Run the update engine against emulated hardware
    Simulate {
        /// Flash image file
        #[arg(short, long)]
        input: PathBuf,

        /// Initial program memory content (raw binary, default all 0xFF)
        #[arg(long)]
        app: Option<PathBuf>,

        /// Write the resulting program memory to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0x3F000"), Ok(0x3F000));
        assert_eq!(parse_hex_u32("4096"), Ok(4096));
        assert!(parse_hex_u32("0xZZ").is_err());
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "exup",
            "simulate",
            "-i",
            "flash.bin",
            "-vv",
            "--protected-start",
            "0x1E000",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.protected_start, Some(0x1E000));
        assert!(matches!(cli.command, Commands::Simulate { app: None, .. }));
    }
}
