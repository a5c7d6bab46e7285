//! Protocol module - Defines the 2ping wire format
//!
//! Every packet uses the same big-endian layout:
//! - 2 bytes magic number
//! - 2 bytes checksum (Internet checksum over the packet, this field zeroed)
//! - 6 bytes message id
//! - 2 bytes opcode flags, one bit per opcode present
//! - One `{length:2, body}` segment per set flag, lowest bit first
//! - Optional padding

mod checksum;
mod codec;
mod extended;
mod map;
mod opcode;
mod packet;

pub use checksum::*;
pub use codec::*;
pub use extended::*;
pub use map::*;
pub use opcode::*;
pub use packet::*;

/// Default UDP port for 2ping
pub const DEFAULT_PORT: u16 = 15998;

/// Magic bytes for protocol identification
pub const MAGIC_BYTES: [u8; 2] = [0x32, 0x50];

/// Length of a message id on the wire
pub const MESSAGE_ID_LEN: usize = 6;

/// Magic + checksum + message id
pub const HEADER_SIZE: usize = 2 + 2 + MESSAGE_ID_LEN;

/// Byte offset of the checksum field
pub const CHECKSUM_OFFSET: usize = 2;

/// Largest body a single opcode segment can declare
pub const MAX_SEGMENT_LEN: usize = u16::MAX as usize;
