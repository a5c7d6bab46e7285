//! twoping - Wire format for the 2ping bi-directional ping protocol
//!
//! The [`protocol`] module holds the packet and opcode codec. The other
//! modules are the collaborators around it: signing, UDP transport and
//! configuration.

pub mod config;
pub mod crypto;
pub mod network;
pub mod protocol;

pub use protocol::{CodecError, ExtendedOpcode, MessageId, Opcode, Packet};
