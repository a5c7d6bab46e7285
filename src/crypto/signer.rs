//! Packet signing
//!
//! The digest is computed over the whole encoded packet with both the
//! checksum field and the digest area zeroed. The checksum is recomputed
//! once the digest is in place.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::protocol::{hmac_region, Encoded, CHECKSUM_OFFSET, HMAC_DIGEST_LEN};

type HmacSha256 = Hmac<Sha256>;

/// Signing errors
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Packet has no HMAC opcode")]
    NoHmacRegion,

    #[error("Digest length mismatch: region holds {expected} bytes, signer produced {actual}")]
    DigestLength { expected: usize, actual: usize },

    #[error("Digest verification failed")]
    BadDigest,

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Something that can produce and check a keyed digest
pub trait Signer: Send + Sync {
    /// Number of digest bytes `sign` produces
    fn digest_len(&self) -> usize;

    /// Compute the digest of `data`
    fn sign(&self, data: &[u8]) -> Vec<u8>;

    /// Check `digest` against `data` in constant time
    fn verify(&self, data: &[u8], digest: &[u8]) -> bool;
}

/// HMAC-SHA256 truncated to the digest area of the HMAC opcode
#[derive(Clone)]
pub struct HmacSigner {
    mac: HmacSha256,
}

impl HmacSigner {
    pub fn new(key: &[u8]) -> CryptoResult<Self> {
        let mac = HmacSha256::new_from_slice(key)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self { mac })
    }
}

impl std::fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSigner").finish_non_exhaustive()
    }
}

impl Signer for HmacSigner {
    fn digest_len(&self) -> usize {
        HMAC_DIGEST_LEN
    }

    fn sign(&self, data: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(data);
        let tag = mac.finalize().into_bytes();
        tag[..HMAC_DIGEST_LEN].to_vec()
    }

    fn verify(&self, data: &[u8], digest: &[u8]) -> bool {
        if digest.len() != HMAC_DIGEST_LEN {
            return false;
        }
        let mut mac = self.mac.clone();
        mac.update(data);
        mac.verify_truncated_left(digest).is_ok()
    }
}

/// Fill in the digest area of an encoded packet and reseal its checksum
pub fn sign_packet(encoded: &mut Encoded, signer: &dyn Signer) -> CryptoResult<()> {
    let region = encoded.hmac_region.clone().ok_or(CryptoError::NoHmacRegion)?;
    if signer.digest_len() != region.len() {
        return Err(CryptoError::DigestLength {
            expected: region.len(),
            actual: signer.digest_len(),
        });
    }

    encoded.bytes[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 2].fill(0);
    encoded.bytes[region.clone()].fill(0);

    let digest = signer.sign(&encoded.bytes);
    if digest.len() != region.len() {
        return Err(CryptoError::DigestLength {
            expected: region.len(),
            actual: digest.len(),
        });
    }
    encoded.bytes[region].copy_from_slice(&digest);
    encoded.reseal();

    Ok(())
}

/// Check the digest carried by a received packet
pub fn verify_packet(data: &[u8], signer: &dyn Signer) -> CryptoResult<()> {
    let region = hmac_region(data).ok_or(CryptoError::NoHmacRegion)?;
    let digest = data[region.clone()].to_vec();

    let mut scratch = data.to_vec();
    scratch[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 2].fill(0);
    scratch[region].fill(0);

    if signer.verify(&scratch, &digest) {
        Ok(())
    } else {
        tracing::debug!("Rejecting packet with bad digest");
        Err(CryptoError::BadDigest)
    }
}
