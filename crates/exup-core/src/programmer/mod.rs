//! Platform capability traits and adapters
//!
//! This module defines the traits the target platform implements so the
//! engine can read the external flash, reprogram the internal flash and
//! restart the device.

mod byte_bus;
mod traits;

pub use byte_bus::{ByteSpiBus, ByteSpiMaster};
pub use traits::*;
