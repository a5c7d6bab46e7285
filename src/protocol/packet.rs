//! Packet model
//!
//! A packet is a message id plus the opcodes it carries. Encoding and
//! decoding live in the codec module.

use std::fmt;

use super::{CodecError, Opcode, OpcodeMap, MESSAGE_ID_LEN};

/// Opaque 6-byte token correlating requests and replies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId([u8; MESSAGE_ID_LEN]);

impl MessageId {
    pub const fn new(bytes: [u8; MESSAGE_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh random message id
    pub fn random() -> Self {
        // The first six bytes of a v4 UUID carry no version or variant bits
        let uuid = uuid::Uuid::new_v4();
        let mut bytes = [0u8; MESSAGE_ID_LEN];
        bytes.copy_from_slice(&uuid.as_bytes()[..MESSAGE_ID_LEN]);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; MESSAGE_ID_LEN] {
        &self.0
    }
}

impl From<[u8; MESSAGE_ID_LEN]> for MessageId {
    fn from(bytes: [u8; MESSAGE_ID_LEN]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for MessageId {
    type Error = CodecError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; MESSAGE_ID_LEN] = bytes
            .try_into()
            .map_err(|_| CodecError::InvalidMessageId(bytes.len()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// A single 2ping packet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packet {
    /// Correlation token for this packet
    pub message_id: MessageId,
    /// Opcodes keyed by their flag bit, in insertion order
    pub opcodes: OpcodeMap<u16, Opcode>,
}

impl Packet {
    pub fn new(message_id: MessageId) -> Self {
        Self {
            message_id,
            opcodes: OpcodeMap::new(),
        }
    }

    /// Insert a registered opcode under its own id, returning any opcode it
    /// replaced.
    ///
    /// Unknown opcodes have no id and are handed back as `Err`; insert those
    /// through `opcodes` with an explicit flag.
    pub fn insert(&mut self, opcode: Opcode) -> Result<Option<Opcode>, Opcode> {
        match opcode.id() {
            Some(id) => Ok(self.opcodes.insert(id, opcode)),
            None => Err(opcode),
        }
    }

    pub fn get(&self, id: u16) -> Option<&Opcode> {
        self.opcodes.get(id)
    }

    pub fn reply_requested(&self) -> bool {
        self.opcodes.contains(Opcode::REPLY_REQUESTED)
    }

    /// Message id this packet answers, if any
    pub fn in_reply_to(&self) -> Option<MessageId> {
        match self.opcodes.get(Opcode::IN_REPLY_TO) {
            Some(Opcode::InReplyTo(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn rtt_us(&self) -> Option<u32> {
        match self.opcodes.get(Opcode::RTT_ENCLOSED) {
            Some(Opcode::RttEnclosed { rtt_us }) => Some(*rtt_us),
            _ => None,
        }
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "message {}", self.message_id)?;
        for (id, opcode) in self.opcodes.iter() {
            write!(f, "\n  [{:#06x}] {}", id, opcode)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id_display() {
        let id = MessageId::new([0, 0, 0, 0, 0xa0, 0x01]);
        assert_eq!(id.to_string(), "00000000a001");
    }

    #[test]
    fn test_message_id_from_slice() {
        let id = MessageId::try_from(&[1u8, 2, 3, 4, 5, 6][..]).unwrap();
        assert_eq!(id.as_bytes(), &[1, 2, 3, 4, 5, 6]);

        let err = MessageId::try_from(&[1u8, 2, 3][..]).unwrap_err();
        assert!(matches!(err, CodecError::InvalidMessageId(3)));
    }

    #[test]
    fn test_random_ids_differ() {
        assert_ne!(MessageId::random(), MessageId::random());
    }

    #[test]
    fn test_insert_known_and_unknown() {
        let mut packet = Packet::new(MessageId::default());
        assert_eq!(packet.insert(Opcode::ReplyRequested), Ok(None));
        assert_eq!(
            packet.insert(Opcode::ReplyRequested),
            Ok(Some(Opcode::ReplyRequested))
        );
        assert!(packet.reply_requested());

        let unknown = Opcode::Unknown(vec![1, 2, 3]);
        assert_eq!(packet.insert(unknown.clone()), Err(unknown));
        assert_eq!(packet.opcodes.len(), 1);
    }

    #[test]
    fn test_accessors() {
        let mut packet = Packet::new(MessageId::default());
        let peer = MessageId::new([0, 0, 0, 0, 0xa0, 0x01]);
        packet.insert(Opcode::InReplyTo(peer)).unwrap();
        packet.insert(Opcode::RttEnclosed { rtt_us: 12345 }).unwrap();

        assert_eq!(packet.in_reply_to(), Some(peer));
        assert_eq!(packet.rtt_us(), Some(12345));
        assert!(!packet.reply_requested());
    }
}
