//! Network module - Moves 2ping packets over UDP
//!
//! Provides:
//! - An endpoint that encodes, signs and sends packets
//! - Receiving with a timeout, decoding and digest checks

mod endpoint;

pub use endpoint::*;

pub use crate::config::NetworkConfig;
