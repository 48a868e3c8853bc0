//! exup-core - Firmware update engine for bootloaders
//!
//! This crate decides, right after reset, whether a firmware image staged on
//! an external SPI NOR flash should be validated and burned over the
//! resident application. It is `no_std` and allocation free so it can run
//! inside a bootloader.
//!
//! The pipeline is:
//!
//! 1. [`footer`] - read and validate the descriptor near the top of flash
//! 2. [`hash`] - stream an FNV-1a hash over the staged bytes
//! 3. [`hex`] - parse the staged bytes as Intel HEX records
//! 4. [`page`] - coalesce data bytes into pages and erase/program them
//! 5. [`update`] - sequence the above inside an interrupt-free section
//!
//! The platform supplies three capabilities: a [`programmer::SpiMaster`]
//! (or any [`flash::BlockReader`]) for the external flash, a
//! [`programmer::ProgramMemory`] for the internal flash, and an
//! [`critical::InterruptControl`] for the interrupt-enable flag.
//!
//! # Features
//!
//! - `std` - Enable TOML configuration loading and `std::error::Error` impls
//!
//! # Example
//!
//! ```ignore
//! use exup_core::{config::UpdateConfig, flash::SpiFlashReader, update};
//!
//! fn boot<M: SpiMaster, P: ProgramMemory>(spi: &mut M, nvm: &mut P) {
//!     let mut reader = SpiFlashReader::new(spi);
//!     let mut irq = GlobalCriticalSection;
//!     // Never returns if an update was applied.
//!     update::attempt_update(UpdateConfig::default(), &mut reader, nvm, &mut irq, &mut Wdt);
//!     jump_to_app();
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "std")]
extern crate std;

pub mod config;
pub mod critical;
pub mod error;
pub mod flash;
pub mod footer;
pub mod hash;
pub mod hex;
pub mod page;
pub mod programmer;
pub mod protocol;
pub mod spi;
pub mod update;

pub use error::{Error, Result, UpdateError};
