//! Protocol implementations
//!
//! This module contains the SPI25 command sequences the engine issues to
//! the external flash.

mod spi25;

pub use spi25::*;
