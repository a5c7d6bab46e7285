//! Packet codec for encoding/decoding 2ping packets
//!
//! Handles the outer envelope: magic, checksum, message id, opcode flags and
//! the length-prefixed opcode segments.

use std::ops::Range;

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

use super::{
    checksum, MessageId, Opcode, Packet, CHECKSUM_OFFSET, HEADER_SIZE, MAGIC_BYTES,
    MAX_SEGMENT_LEN, MESSAGE_ID_LEN,
};

/// Codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Packet too short: {0} bytes (min: {})", HEADER_SIZE)]
    TooShort(usize),

    #[error("Invalid magic bytes: {0:02x?}")]
    InvalidMagic([u8; 2]),

    #[error("Checksum mismatch: packet says {expected:#06x}, computed {computed:#06x}")]
    ChecksumMismatch { expected: u16, computed: u16 },

    #[error("Truncated packet at offset {offset}: need {needed} bytes, {available} left")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Invalid message id length: {0} bytes")]
    InvalidMessageId(usize),

    #[error("Opcode {id:#x} payload too large: {len} bytes (max: {})", MAX_SEGMENT_LEN)]
    PayloadTooLarge { id: u32, len: usize },

    #[error("Opcode id {0:#06x} is not a single flag bit")]
    InvalidOpcodeId(u16),

    #[error("Opcode stored under id {id:#x} does not belong to it")]
    MisplacedOpcode { id: u32 },
}

impl CodecError {
    /// Whether the error describes a corrupt or hostile packet on decode
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            CodecError::TooShort(_)
                | CodecError::InvalidMagic(_)
                | CodecError::ChecksumMismatch { .. }
                | CodecError::Truncated { .. }
                | CodecError::InvalidMessageId(_)
        )
    }
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Options controlling how a packet is laid out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Pad the packet up to this many bytes
    pub min_length: usize,
    /// Bytes repeated to fill the padding
    pub padding_pattern: Vec<u8>,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            min_length: 0,
            padding_pattern: vec![0],
        }
    }
}

/// An encoded packet plus the layout details a signer needs
#[derive(Debug, Clone)]
pub struct Encoded {
    pub bytes: BytesMut,
    /// Offsets of the zeroed HMAC digest bytes, if the packet carries one
    pub hmac_region: Option<Range<usize>>,
}

impl Encoded {
    /// Recompute the checksum after the buffer was modified
    pub fn reseal(&mut self) {
        seal(&mut self.bytes);
    }
}

impl Packet {
    /// Encode the packet with default options
    pub fn dump(&self) -> CodecResult<Vec<u8>> {
        Ok(self.dump_with(&EncodeOptions::default())?.bytes.to_vec())
    }

    /// Encode the packet
    pub fn dump_with(&self, options: &EncodeOptions) -> CodecResult<Encoded> {
        let mut flags: u16 = 0;
        let mut segments = Vec::with_capacity(self.opcodes.len());

        for (id, opcode) in self.opcodes.iter() {
            if !id.is_power_of_two() {
                return Err(CodecError::InvalidOpcodeId(id));
            }
            if !opcode.fits(id) {
                return Err(CodecError::MisplacedOpcode { id: u32::from(id) });
            }
            let body = opcode.dump()?;
            if body.len() > MAX_SEGMENT_LEN {
                return Err(CodecError::PayloadTooLarge {
                    id: u32::from(id),
                    len: body.len(),
                });
            }
            flags |= id;
            segments.push((id, matches!(opcode, Opcode::Hmac { .. }), body));
        }

        // Receivers walk the flag bits from the lowest up
        segments.sort_by_key(|(id, _, _)| *id);

        let segments_len: usize = segments.iter().map(|(_, _, body)| 2 + body.len()).sum();
        let mut buf = BytesMut::with_capacity((HEADER_SIZE + 2 + segments_len).max(options.min_length));
        buf.put_slice(&MAGIC_BYTES);
        buf.put_u16(0);
        buf.put_slice(self.message_id.as_bytes());
        buf.put_u16(flags);

        let mut hmac_region = None;
        for (_, is_hmac, body) in &segments {
            buf.put_u16(body.len() as u16);
            if *is_hmac {
                // Skip the digest length field
                let start = buf.len() + 2;
                hmac_region = Some(start..buf.len() + body.len());
            }
            buf.put_slice(body);
        }

        if buf.len() < options.min_length {
            let pad = options.min_length - buf.len();
            if options.padding_pattern.is_empty() {
                buf.put_bytes(0, pad);
            } else {
                buf.extend(options.padding_pattern.iter().copied().cycle().take(pad));
            }
        }

        seal(&mut buf);

        tracing::trace!(
            "Encoded packet {} ({} bytes, flags {:#06x})",
            self.message_id,
            buf.len(),
            flags
        );

        Ok(Encoded {
            bytes: buf,
            hmac_region,
        })
    }

    /// Decode a packet from raw bytes
    pub fn load(data: &[u8]) -> CodecResult<Packet> {
        if data.len() < HEADER_SIZE {
            return Err(CodecError::TooShort(data.len()));
        }

        if data[0..2] != MAGIC_BYTES {
            return Err(CodecError::InvalidMagic([data[0], data[1]]));
        }

        let expected = u16::from_be_bytes([data[CHECKSUM_OFFSET], data[CHECKSUM_OFFSET + 1]]);
        let computed = checksum_zeroed(data);
        if expected != computed {
            return Err(CodecError::ChecksumMismatch { expected, computed });
        }

        let message_id = MessageId::try_from(&data[4..4 + MESSAGE_ID_LEN])?;
        let mut packet = Packet::new(message_id);

        let mut buf = &data[HEADER_SIZE..];
        if !buf.has_remaining() {
            return Ok(packet);
        }

        let flags = read_u16(&mut buf, data.len())?;
        for flag in (0..16).map(|bit| 1u16 << bit).filter(|flag| flags & flag != 0) {
            let len = usize::from(read_u16(&mut buf, data.len())?);
            if buf.remaining() < len {
                return Err(CodecError::Truncated {
                    offset: data.len() - buf.remaining(),
                    needed: len,
                    available: buf.remaining(),
                });
            }

            let opcode = Opcode::load(flag, &buf[..len]);
            if let Opcode::Unknown(_) = opcode {
                tracing::debug!("Keeping unknown opcode {:#06x} ({} bytes)", flag, len);
            }
            packet.opcodes.insert(flag, opcode);
            buf.advance(len);
        }

        if buf.has_remaining() {
            tracing::trace!("Ignoring {} bytes of padding", buf.remaining());
        }

        Ok(packet)
    }
}

/// Locate the HMAC digest bytes inside an encoded packet without decoding it.
///
/// Returns `None` when the packet carries no HMAC opcode or its framing is
/// broken.
pub fn hmac_region(data: &[u8]) -> Option<Range<usize>> {
    let mut buf = data.get(HEADER_SIZE..)?;
    let flags = read_u16(&mut buf, data.len()).ok()?;
    if flags & Opcode::HMAC == 0 {
        return None;
    }

    for flag in (0..16).map(|bit| 1u16 << bit).filter(|flag| flags & flag != 0) {
        let len = usize::from(read_u16(&mut buf, data.len()).ok()?);
        if buf.remaining() < len {
            return None;
        }
        if flag == Opcode::HMAC {
            let start = data.len() - buf.remaining();
            return (len >= 2).then(|| start + 2..start + len);
        }
        buf.advance(len);
    }
    None
}

fn read_u16(buf: &mut &[u8], total: usize) -> CodecResult<u16> {
    if buf.remaining() < 2 {
        return Err(CodecError::Truncated {
            offset: total - buf.remaining(),
            needed: 2,
            available: buf.remaining(),
        });
    }
    Ok(buf.get_u16())
}

/// Checksum of `data` as if its checksum field were zero
pub(crate) fn checksum_zeroed(data: &[u8]) -> u16 {
    let mut scratch = data.to_vec();
    scratch[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 2].fill(0);
    checksum(&scratch)
}

/// Write the checksum of `buf` into its checksum field
fn seal(buf: &mut [u8]) {
    let sum = checksum_zeroed(buf);
    buf[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 2].copy_from_slice(&sum.to_be_bytes());
}
