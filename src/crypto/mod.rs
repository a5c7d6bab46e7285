//! Crypto module - Keyed digests over encoded packets
//!
//! The codec only reserves a zeroed digest area inside the HMAC opcode.
//! This module fills it in after encoding and checks it on receipt.

mod signer;

pub use signer::*;
