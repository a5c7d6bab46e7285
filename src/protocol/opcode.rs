//! Top-level opcode definitions
//!
//! Each opcode is identified by a single bit in the packet's opcode flags.
//! Bodies are decoded best-effort: `load` never fails, and anything the
//! registry does not recognise is kept verbatim as [`Opcode::Unknown`].

use std::fmt;

use bytes::{Buf, BufMut};

use super::{CodecError, ExtendedOpcode, MessageId, OpcodeMap, MAX_SEGMENT_LEN, MESSAGE_ID_LEN};

/// Length of the digest area reserved by an HMAC opcode
pub const HMAC_DIGEST_LEN: usize = 4;

/// All opcodes understood by this codec
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opcode {
    /// Sender wants a reply
    ReplyRequested,

    /// This packet answers the given message
    InReplyTo(MessageId),

    /// Round-trip time the sender measured for the packet it is replying to
    RttEnclosed { rtt_us: u32 },

    /// Investigated messages the sender did receive
    InvestigationSeen(Vec<MessageId>),

    /// Investigated messages the sender never received
    InvestigationUnseen(Vec<MessageId>),

    /// Ask the peer whether it saw these messages
    Investigate(Vec<MessageId>),

    /// Messages the sender has given up on and the peer may forget
    CourtesyExpiration(Vec<MessageId>),

    /// Reserved digest area, filled in by a signer after encoding
    Hmac { digest_len: u16, digest: Vec<u8> },

    /// Time spent by the host between receive and reply
    HostLatency { latency_us: u32 },

    /// Nested low-priority sub-opcodes
    Extended(OpcodeMap<u32, ExtendedOpcode>),

    /// Opcode not present in the registry, kept as raw bytes
    Unknown(Vec<u8>),
}

impl Opcode {
    pub const REPLY_REQUESTED: u16 = 0x0001;
    pub const IN_REPLY_TO: u16 = 0x0002;
    pub const RTT_ENCLOSED: u16 = 0x0004;
    pub const INVESTIGATION_SEEN: u16 = 0x0008;
    pub const INVESTIGATION_UNSEEN: u16 = 0x0010;
    pub const INVESTIGATE: u16 = 0x0020;
    pub const COURTESY_EXPIRATION: u16 = 0x0040;
    pub const HMAC: u16 = 0x0080;
    pub const HOST_LATENCY: u16 = 0x0100;
    pub const EXTENDED: u16 = 0x8000;

    /// An HMAC opcode with a zeroed digest area
    pub fn hmac() -> Self {
        Opcode::Hmac {
            digest_len: HMAC_DIGEST_LEN as u16,
            digest: vec![0; HMAC_DIGEST_LEN],
        }
    }

    /// Get the opcode flag, or `None` for unknown opcodes
    pub fn id(&self) -> Option<u16> {
        let id = match self {
            Opcode::ReplyRequested => Self::REPLY_REQUESTED,
            Opcode::InReplyTo(_) => Self::IN_REPLY_TO,
            Opcode::RttEnclosed { .. } => Self::RTT_ENCLOSED,
            Opcode::InvestigationSeen(_) => Self::INVESTIGATION_SEEN,
            Opcode::InvestigationUnseen(_) => Self::INVESTIGATION_UNSEEN,
            Opcode::Investigate(_) => Self::INVESTIGATE,
            Opcode::CourtesyExpiration(_) => Self::COURTESY_EXPIRATION,
            Opcode::Hmac { .. } => Self::HMAC,
            Opcode::HostLatency { .. } => Self::HOST_LATENCY,
            Opcode::Extended(_) => Self::EXTENDED,
            Opcode::Unknown(_) => return None,
        };
        Some(id)
    }

    /// Whether the registry assigns a variant to `id`
    pub fn is_registered(id: u16) -> bool {
        matches!(
            id,
            Self::REPLY_REQUESTED
                | Self::IN_REPLY_TO
                | Self::RTT_ENCLOSED
                | Self::INVESTIGATION_SEEN
                | Self::INVESTIGATION_UNSEEN
                | Self::INVESTIGATE
                | Self::COURTESY_EXPIRATION
                | Self::HMAC
                | Self::HOST_LATENCY
                | Self::EXTENDED
        )
    }

    /// Whether this opcode decodes back to itself when framed under `id`
    pub fn fits(&self, id: u16) -> bool {
        match self.id() {
            Some(own) => own == id,
            None => !Self::is_registered(id),
        }
    }

    /// Decode an opcode body, dispatching on the flag it was found under
    pub fn load(id: u16, body: &[u8]) -> Self {
        match id {
            Self::REPLY_REQUESTED => Opcode::ReplyRequested,
            Self::IN_REPLY_TO => Opcode::InReplyTo(read_message_id(body)),
            Self::RTT_ENCLOSED => Opcode::RttEnclosed {
                rtt_us: read_u32(body),
            },
            Self::INVESTIGATION_SEEN => Opcode::InvestigationSeen(read_id_list(body)),
            Self::INVESTIGATION_UNSEEN => Opcode::InvestigationUnseen(read_id_list(body)),
            Self::INVESTIGATE => Opcode::Investigate(read_id_list(body)),
            Self::COURTESY_EXPIRATION => Opcode::CourtesyExpiration(read_id_list(body)),
            Self::HMAC => {
                let mut buf = body;
                let digest_len = if buf.remaining() >= 2 { buf.get_u16() } else { 0 };
                let take = usize::from(digest_len).min(buf.remaining());
                Opcode::Hmac {
                    digest_len,
                    digest: buf[..take].to_vec(),
                }
            }
            Self::HOST_LATENCY => Opcode::HostLatency {
                latency_us: read_u32(body),
            },
            Self::EXTENDED => Opcode::Extended(load_extended(body)),
            _ => Opcode::Unknown(body.to_vec()),
        }
    }

    /// Encode the opcode body (without its length prefix)
    pub fn dump(&self) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::new();
        match self {
            Opcode::ReplyRequested => {}
            Opcode::InReplyTo(id) => buf.put_slice(id.as_bytes()),
            Opcode::RttEnclosed { rtt_us } => buf.put_u32(*rtt_us),
            Opcode::InvestigationSeen(ids)
            | Opcode::InvestigationUnseen(ids)
            | Opcode::Investigate(ids)
            | Opcode::CourtesyExpiration(ids) => {
                let count = u16::try_from(ids.len()).map_err(|_| CodecError::PayloadTooLarge {
                    id: u32::from(self.id().unwrap_or_default()),
                    len: 2 + ids.len() * MESSAGE_ID_LEN,
                })?;
                buf.put_u16(count);
                for id in ids {
                    buf.put_slice(id.as_bytes());
                }
            }
            Opcode::Hmac { .. } => {
                // The digest is always written zeroed; signing patches it later
                buf.put_u16(HMAC_DIGEST_LEN as u16);
                buf.put_bytes(0, HMAC_DIGEST_LEN);
            }
            Opcode::HostLatency { latency_us } => buf.put_u32(*latency_us),
            Opcode::Extended(subs) => {
                for (id, sub) in subs.iter() {
                    if !sub.fits(id) {
                        return Err(CodecError::MisplacedOpcode { id });
                    }
                    let body = sub.dump();
                    if body.len() > MAX_SEGMENT_LEN {
                        return Err(CodecError::PayloadTooLarge { id, len: body.len() });
                    }
                    buf.put_u32(id);
                    buf.put_u16(body.len() as u16);
                    buf.put_slice(&body);
                }
            }
            Opcode::Unknown(raw) => buf.put_slice(raw),
        }
        Ok(buf)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Opcode::ReplyRequested => "reply requested",
            Opcode::InReplyTo(_) => "in reply to",
            Opcode::RttEnclosed { .. } => "RTT enclosed",
            Opcode::InvestigationSeen(_) => "investigation seen",
            Opcode::InvestigationUnseen(_) => "investigation unseen",
            Opcode::Investigate(_) => "investigate",
            Opcode::CourtesyExpiration(_) => "courtesy expiration",
            Opcode::Hmac { .. } => "HMAC",
            Opcode::HostLatency { .. } => "host latency",
            Opcode::Extended(_) => "extended",
            Opcode::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        match self {
            Opcode::ReplyRequested => Ok(()),
            Opcode::InReplyTo(id) => write!(f, ": {}", id),
            Opcode::RttEnclosed { rtt_us } => write!(f, ": {} us", rtt_us),
            Opcode::InvestigationSeen(ids)
            | Opcode::InvestigationUnseen(ids)
            | Opcode::Investigate(ids)
            | Opcode::CourtesyExpiration(ids) => {
                f.write_str(":")?;
                for id in ids {
                    write!(f, " {}", id)?;
                }
                Ok(())
            }
            Opcode::Hmac { digest_len, .. } => write!(f, ": {} byte digest", digest_len),
            Opcode::HostLatency { latency_us } => write!(f, ": {} us", latency_us),
            Opcode::Extended(subs) => {
                for (id, sub) in subs.iter() {
                    write!(f, "\n    [{:#010x}] {}", id, sub)?;
                }
                Ok(())
            }
            Opcode::Unknown(raw) => write!(f, ": {} bytes", raw.len()),
        }
    }
}

/// Read a big-endian u32, zero-extending a short body
fn read_u32(body: &[u8]) -> u32 {
    let mut bytes = [0u8; 4];
    let take = body.len().min(4);
    bytes[..take].copy_from_slice(&body[..take]);
    u32::from_be_bytes(bytes)
}

fn read_message_id(body: &[u8]) -> MessageId {
    let mut bytes = [0u8; MESSAGE_ID_LEN];
    let take = body.len().min(MESSAGE_ID_LEN);
    bytes[..take].copy_from_slice(&body[..take]);
    MessageId::new(bytes)
}

/// Count-prefixed list of message ids. Stops at the declared count or at the
/// last whole id, whichever comes first.
fn read_id_list(body: &[u8]) -> Vec<MessageId> {
    let mut buf = body;
    if buf.remaining() < 2 {
        return Vec::new();
    }
    let count = usize::from(buf.get_u16());
    buf.chunks_exact(MESSAGE_ID_LEN)
        .take(count)
        .map(read_message_id)
        .collect()
}

fn load_extended(body: &[u8]) -> OpcodeMap<u32, ExtendedOpcode> {
    let mut entries = Vec::new();
    let mut buf = body;

    while buf.remaining() >= 6 {
        let id = buf.get_u32();
        let len = usize::from(buf.get_u16());
        if buf.remaining() < len {
            tracing::trace!(
                "Extended opcode {:#010x} declares {} bytes, only {} left",
                id,
                len,
                buf.remaining()
            );
            return entries.into_iter().collect();
        }
        entries.push((id, ExtendedOpcode::load(id, &buf[..len])));
        buf.advance(len);
    }

    if buf.has_remaining() {
        tracing::trace!("Dropping {} trailing bytes of extended data", buf.remaining());
    }
    entries.into_iter().collect()
}
