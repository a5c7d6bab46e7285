//! Internet checksum (RFC 1071 style)

/// Compute the 16-bit one's-complement checksum of `data`.
///
/// The buffer is read as big-endian 16-bit words; an odd trailing byte is
/// treated as if followed by a zero byte.
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;

    let mut words = data.chunks_exact(2);
    for word in &mut words {
        sum += u32::from(u16::from_be_bytes([word[0], word[1]]));
        // Fold early so the accumulator never overflows on large buffers
        sum = (sum & 0xffff) + (sum >> 16);
    }
    if let [last] = words.remainder() {
        sum += u32::from(*last) << 8;
    }

    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }

    !(sum as u16)
}
