//! Extended sub-opcodes
//!
//! Carried inside the body of the Extended opcode, each under a 32-bit id
//! derived from an ASCII tag.

use std::borrow::Cow;
use std::fmt;

/// Sub-opcodes carried by the Extended opcode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtendedOpcode {
    /// Free-form version string of the sending program
    Version(Vec<u8>),
    /// Human-readable notice
    Notice(Vec<u8>),
    /// Unregistered sub-opcode, kept as raw bytes
    Unknown(Vec<u8>),
}

impl ExtendedOpcode {
    pub const VERSION: u32 = 0x3250564e;
    pub const NOTICE: u32 = 0xa837b44e;

    pub fn version(text: &str) -> Self {
        ExtendedOpcode::Version(text.as_bytes().to_vec())
    }

    pub fn notice(text: &str) -> Self {
        ExtendedOpcode::Notice(text.as_bytes().to_vec())
    }

    /// Get the sub-opcode id, or `None` for unknown sub-opcodes
    pub fn id(&self) -> Option<u32> {
        match self {
            ExtendedOpcode::Version(_) => Some(Self::VERSION),
            ExtendedOpcode::Notice(_) => Some(Self::NOTICE),
            ExtendedOpcode::Unknown(_) => None,
        }
    }

    /// Whether this sub-opcode decodes back to itself under `id`
    pub fn fits(&self, id: u32) -> bool {
        match self.id() {
            Some(own) => own == id,
            None => id != Self::VERSION && id != Self::NOTICE,
        }
    }

    pub fn load(id: u32, body: &[u8]) -> Self {
        match id {
            Self::VERSION => ExtendedOpcode::Version(body.to_vec()),
            Self::NOTICE => ExtendedOpcode::Notice(body.to_vec()),
            _ => ExtendedOpcode::Unknown(body.to_vec()),
        }
    }

    pub fn dump(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ExtendedOpcode::Version(raw)
            | ExtendedOpcode::Notice(raw)
            | ExtendedOpcode::Unknown(raw) => raw,
        }
    }

    /// Body as text, replacing invalid UTF-8
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }
}

impl fmt::Display for ExtendedOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtendedOpcode::Version(_) => write!(f, "version: {}", self.text()),
            ExtendedOpcode::Notice(_) => write!(f, "notice: {}", self.text()),
            ExtendedOpcode::Unknown(raw) => write!(f, "unknown: {} bytes", raw.len()),
        }
    }
}
