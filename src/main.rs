//! exup - Host tool for EXUP staged firmware updates
//!
//! The bootloader side lives in `exup-core`. This tool covers the host side:
//!
//! - **pack** turns an Intel HEX file into a full external flash image with
//!   the hex text at address 0 and a footer in the last sector
//! - **inspect** validates the footer and hash of such an image
//! - **simulate** runs the real update engine against emulated SPI flash
//!   and program memory

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::CommandError;
use exup_core::config::{load_config, TargetConfig};
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let target = load_target(cli.config.as_deref(), cli.protected_start)?;

    match cli.command {
        Commands::Pack { input, output } => commands::pack::run(&target, &input, &output)?,
        Commands::Inspect { input } => commands::inspect::run(&target, &input)?,
        Commands::Simulate { input, app, output } => {
            commands::simulate::run(&target, &input, app.as_deref(), output.as_deref())?
        }
    }

    Ok(())
}

/// Load the target description, falling back to the built-in default
fn load_target(
    path: Option<&Path>,
    protected_start: Option<u32>,
) -> Result<TargetConfig, CommandError> {
    let mut target = match path {
        Some(path) => {
            let target = load_config(path).map_err(|source| CommandError::Config {
                path: path.to_path_buf(),
                source,
            })?;
            log::info!("Loaded target description from {:?}", path);
            target
        }
        None => TargetConfig::default(),
    };

    if let Some(addr) = protected_start {
        target.update.protected_start = addr;
        target.validate()?;
    }

    log::debug!("Target: {:?}", target);
    Ok(target)
}
