//! External flash access
//!
//! The engine only ever reads the external flash. Everything goes through
//! [`BlockReader`], which is implemented for SPI masters and for images
//! already in RAM.

mod reader;

pub use reader::{BlockReader, SliceReader, SpiFlashReader};
