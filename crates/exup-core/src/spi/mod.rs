//! SPI types and command structures
//!
//! This module provides the transaction type exchanged with an SPI master
//! and the handful of JEDEC opcodes the update engine needs.

mod command;

pub use command::SpiCommand;

/// Read Data (3-byte address, no dummy cycles)
pub const READ: u8 = 0x03;
/// Fast Read (3-byte address, one dummy byte)
pub const FAST_READ: u8 = 0x0B;

/// Number of address bytes sent with addressed commands
pub const ADDRESS_BYTES: usize = 3;

/// Highest address reachable with 3-byte addressing
pub const MAX_3B_ADDRESS: u32 = 0x00FF_FFFF;
