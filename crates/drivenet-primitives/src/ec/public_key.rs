//! secp256k1 public key as it appears inside scripts.
//!
//! Accepts compressed, uncompressed and hybrid SEC1 encodings, matching
//! what consensus code would accept before any STRICTENC policy applies.

use k256::ecdsa::VerifyingKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use std::fmt;

use crate::ec::signature::Signature;
use crate::hash::hash160;
use crate::PrimitivesError;

/// Length of a compressed public key in bytes.
pub const COMPRESSED_LEN: usize = 33;

/// Length of an uncompressed public key in bytes.
pub const UNCOMPRESSED_LEN: usize = 65;

/// A secp256k1 public key for signature verification.
#[derive(Clone, Debug)]
pub struct PublicKey {
    inner: VerifyingKey,
}

impl PublicKey {
    /// Create a PublicKey from SEC1 encoded bytes.
    ///
    /// Hybrid keys (`06`/`07` prefix) are accepted when the prefix parity
    /// matches the Y coordinate, and are treated as uncompressed.
    ///
    /// # Arguments
    /// * `bytes` - SEC1-encoded public key bytes.
    ///
    /// # Returns
    /// `Ok(PublicKey)` on success, or an error if the bytes are not a point.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PrimitivesError> {
        if bytes.is_empty() {
            return Err(PrimitivesError::InvalidPublicKey("pubkey is empty".to_string()));
        }
        let vk = if bytes.len() == UNCOMPRESSED_LEN && (bytes[0] == 0x06 || bytes[0] == 0x07) {
            if bytes[0] & 1 != bytes[64] & 1 {
                return Err(PrimitivesError::InvalidPublicKey(
                    "hybrid prefix does not match y parity".to_string(),
                ));
            }
            let mut plain = [0u8; UNCOMPRESSED_LEN];
            plain.copy_from_slice(bytes);
            plain[0] = 0x04;
            VerifyingKey::from_sec1_bytes(&plain)
        } else {
            VerifyingKey::from_sec1_bytes(bytes)
        }
        .map_err(|e| PrimitivesError::InvalidPublicKey(e.to_string()))?;
        Ok(PublicKey { inner: vk })
    }

    /// Create a PublicKey from a hex-encoded SEC1 string.
    pub fn from_hex(hex_str: &str) -> Result<Self, PrimitivesError> {
        let bytes = hex::decode(hex_str)?;
        Self::from_bytes(&bytes)
    }

    /// Serialize the public key in compressed SEC1 format (33 bytes).
    pub fn to_compressed(&self) -> [u8; COMPRESSED_LEN] {
        let point = self.inner.to_encoded_point(true);
        let mut out = [0u8; COMPRESSED_LEN];
        out.copy_from_slice(point.as_bytes());
        out
    }

    /// Serialize the public key in uncompressed SEC1 format (65 bytes).
    pub fn to_uncompressed(&self) -> [u8; UNCOMPRESSED_LEN] {
        let point = self.inner.to_encoded_point(false);
        let mut out = [0u8; UNCOMPRESSED_LEN];
        out.copy_from_slice(point.as_bytes());
        out
    }

    /// Hash160 of the compressed encoding, as committed by P2PKH and P2WPKH.
    pub fn hash160(&self) -> [u8; 20] {
        hash160(&self.to_compressed())
    }

    /// Verify an ECDSA signature against a 32-byte digest.
    pub fn verify(&self, hash: &[u8; 32], sig: &Signature) -> bool {
        sig.verify(hash, self)
    }

    pub(crate) fn from_k256_verifying_key(vk: &VerifyingKey) -> Self {
        PublicKey { inner: vk.clone() }
    }

    pub(crate) fn verifying_key(&self) -> &VerifyingKey {
        &self.inner
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_compressed() == other.to_compressed()
    }
}

impl Eq for PublicKey {}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.to_compressed()))
    }
}
