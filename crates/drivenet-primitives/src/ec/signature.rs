//! ECDSA signature with lax DER parsing and low-S handling.
//!
//! Script signatures are parsed the way Bitcoin Core parses them before
//! consensus verification: a permissive BER-ish reader that tolerates
//! excess padding and length-byte oddities, followed by S normalisation.
//! Strict DER policy is enforced separately by the interpreter.

use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa;

use crate::ec::private_key::PrivateKey;
use crate::ec::public_key::PublicKey;
use crate::PrimitivesError;

/// The secp256k1 curve order N.
const CURVE_ORDER: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFE, 0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36,
    0x41, 0x41,
];

/// Half of the secp256k1 curve order (N/2), the LOW_S ceiling.
pub const HALF_ORDER: [u8; 32] = [
    0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0x5D, 0x57, 0x6E, 0x73, 0x57, 0xA4, 0x50, 0x1D, 0xDF, 0xE9, 0x2F, 0x46, 0x68, 0x1B,
    0x20, 0xA0,
];

/// An ECDSA signature with R and S components.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    /// The R component of the signature (32 bytes, big-endian).
    r: [u8; 32],
    /// The S component of the signature (32 bytes, big-endian).
    s: [u8; 32],
}

impl Signature {
    /// Create a signature from raw R and S 32-byte arrays.
    pub fn new(r: [u8; 32], s: [u8; 32]) -> Self {
        Signature { r, s }
    }

    /// Access the R component of the signature.
    pub fn r(&self) -> &[u8; 32] {
        &self.r
    }

    /// Access the S component of the signature.
    pub fn s(&self) -> &[u8; 32] {
        &self.s
    }

    /// Parse a DER-ish signature with the same leniency as consensus code.
    ///
    /// Accepts long-form lengths, leading zero padding on R and S, and
    /// trailing garbage after S. Integers wider than 32 significant bytes
    /// or not below the curve order produce an all-zero signature, which
    /// never verifies.
    ///
    /// # Arguments
    /// * `input` - Signature bytes without the trailing sighash byte.
    ///
    /// # Returns
    /// `Ok(Signature)` when the structure parses, or an error for input
    /// that is not even loosely shaped like DER.
    pub fn from_der_lax(input: &[u8]) -> Result<Self, PrimitivesError> {
        let malformed = |what: &str| PrimitivesError::InvalidSignature(format!("malformed signature: {}", what));
        let len = input.len();
        let mut pos = 0usize;

        // Sequence tag and length.
        if pos == len || input[pos] != 0x30 {
            return Err(malformed("no sequence tag"));
        }
        pos += 1;
        if pos == len {
            return Err(malformed("no sequence length"));
        }
        let lenbyte = input[pos] as usize;
        pos += 1;
        if lenbyte & 0x80 != 0 {
            let n = lenbyte - 0x80;
            if n > len - pos {
                return Err(malformed("sequence length overruns"));
            }
            pos += n;
        }

        let (rpos, rlen) = read_lax_integer(input, &mut pos).ok_or_else(|| malformed("bad R"))?;
        let (spos, slen) = read_lax_integer(input, &mut pos).ok_or_else(|| malformed("bad S"))?;

        let r = lax_scalar(&input[rpos..rpos + rlen]);
        let s = lax_scalar(&input[spos..spos + slen]);
        match (r, s) {
            (Some(r), Some(s)) => Ok(Signature { r, s }),
            _ => Ok(Signature { r: [0u8; 32], s: [0u8; 32] }),
        }
    }

    /// Serialize the signature in strict DER with low-S normalization.
    pub fn to_der(&self) -> Vec<u8> {
        let s = if self.is_low_s() { self.s } else { subtract_from_order(&self.s) };

        let rb = canonicalize_int(&self.r);
        let sb = canonicalize_int(&s);

        let total_len = 6 + rb.len() + sb.len();
        let mut out = Vec::with_capacity(total_len);
        out.push(0x30);
        out.push((total_len - 2) as u8);
        out.push(0x02);
        out.push(rb.len() as u8);
        out.extend_from_slice(&rb);
        out.push(0x02);
        out.push(sb.len() as u8);
        out.extend_from_slice(&sb);
        out
    }

    /// Check that S is not above half the curve order.
    pub fn is_low_s(&self) -> bool {
        !is_greater_than(&self.s, &HALF_ORDER)
    }

    /// Return a copy with S mapped into the lower half of the order.
    pub fn normalize_s(&self) -> Self {
        if self.is_low_s() {
            self.clone()
        } else {
            Signature { r: self.r, s: subtract_from_order(&self.s) }
        }
    }

    /// Sign a 32-byte digest with RFC6979 deterministic nonces.
    ///
    /// Produces a low-S normalized signature.
    pub fn sign(hash: &[u8; 32], priv_key: &PrivateKey) -> Result<Self, PrimitivesError> {
        let (k256_sig, _recovery_id) = priv_key
            .signing_key()
            .sign_prehash_recoverable(hash)
            .map_err(|e| PrimitivesError::InvalidSignature(e.to_string()))?;

        let (r_bytes, s_bytes) = k256_sig.split_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&r_bytes);
        s.copy_from_slice(&s_bytes);

        Ok(Signature { r, s }.normalize_s())
    }

    /// Verify this signature against a digest and public key.
    ///
    /// S is normalized first, so high-S signatures verify. Whether high S
    /// is acceptable is a script policy decision, not a curve one.
    pub fn verify(&self, hash: &[u8; 32], pub_key: &PublicKey) -> bool {
        let normalized = self.normalize_s();
        let k256_sig = match ecdsa::Signature::from_scalars(
            k256::FieldBytes::from(normalized.r),
            k256::FieldBytes::from(normalized.s),
        ) {
            Ok(sig) => sig,
            Err(_) => return false,
        };

        pub_key
            .verifying_key()
            .verify_prehash(hash, &k256_sig)
            .is_ok()
    }
}

/// Read one `0x02 <len> <bytes>` element, tolerating long-form lengths.
///
/// Returns the payload offset and length.
fn read_lax_integer(input: &[u8], pos: &mut usize) -> Option<(usize, usize)> {
    let len = input.len();
    if *pos == len || input[*pos] != 0x02 {
        return None;
    }
    *pos += 1;
    if *pos == len {
        return None;
    }
    let mut lenbyte = input[*pos] as usize;
    *pos += 1;
    let ilen = if lenbyte & 0x80 != 0 {
        lenbyte -= 0x80;
        if lenbyte > len - *pos {
            return None;
        }
        while lenbyte > 0 && input[*pos] == 0 {
            *pos += 1;
            lenbyte -= 1;
        }
        if lenbyte >= std::mem::size_of::<usize>() {
            return None;
        }
        let mut ilen = 0usize;
        while lenbyte > 0 {
            ilen = (ilen << 8) + input[*pos] as usize;
            *pos += 1;
            lenbyte -= 1;
        }
        ilen
    } else {
        lenbyte
    };
    if ilen > len - *pos {
        return None;
    }
    let start = *pos;
    *pos += ilen;
    Some((start, ilen))
}

/// Strip leading zeros and left-pad to 32 bytes; `None` on overflow.
fn lax_scalar(bytes: &[u8]) -> Option<[u8; 32]> {
    let mut trimmed = bytes;
    while let [0, rest @ ..] = trimmed {
        trimmed = rest;
    }
    if trimmed.len() > 32 {
        return None;
    }
    let mut out = [0u8; 32];
    out[32 - trimmed.len()..].copy_from_slice(trimmed);
    if !is_less_than(&out, &CURVE_ORDER) {
        return None;
    }
    Some(out)
}

/// Strip leading zeros and add a 0x00 pad when the high bit is set.
fn canonicalize_int(val: &[u8; 32]) -> Vec<u8> {
    let mut start = 0;
    while start < 31 && val[start] == 0 {
        start += 1;
    }
    let trimmed = &val[start..];

    if trimmed[0] & 0x80 != 0 {
        let mut out = Vec::with_capacity(trimmed.len() + 1);
        out.push(0x00);
        out.extend_from_slice(trimmed);
        out
    } else {
        trimmed.to_vec()
    }
}

/// Compare two 32-byte big-endian integers: a < b.
fn is_less_than(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a < b
}

/// Compare two 32-byte big-endian integers: a > b.
fn is_greater_than(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a > b
}

/// Compute N - val where N is the secp256k1 curve order.
fn subtract_from_order(val: &[u8; 32]) -> [u8; 32] {
    let mut result = [0u8; 32];
    let mut borrow: i32 = 0;
    for i in (0..32).rev() {
        let diff = CURVE_ORDER[i] as i32 - val[i] as i32 - borrow;
        if diff < 0 {
            result[i] = (diff + 256) as u8;
            borrow = 1;
        } else {
            result[i] = diff as u8;
            borrow = 0;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha256;

    const VALID_SIG: &str = "304402204e45e16932b8af514961a1d3a1a25fdf3f4f7732e9d624c6c61548ab5fb8cd41\
                             0220181522ec8eca07de4860a4acdd12909d831cc56cbbac4622082221a8768d1d09";

    #[test]
    fn test_lax_der_parsing() {
        let valid_sig = hex::decode(VALID_SIG).unwrap();
        let sig = Signature::from_der_lax(&valid_sig).unwrap();
        assert_eq!(sig.to_der(), valid_sig);

        assert!(Signature::from_der_lax(&[]).is_err());

        let mut bad_magic = valid_sig.clone();
        bad_magic[0] = 0x31;
        assert!(Signature::from_der_lax(&bad_magic).is_err());

        let mut bad_marker = valid_sig.clone();
        bad_marker[2] = 0x03;
        assert!(Signature::from_der_lax(&bad_marker).is_err());
    }

    #[test]
    fn test_lax_der_tolerates_padding_and_trailing_bytes() {
        let valid_sig = hex::decode(VALID_SIG).unwrap();
        let expected = Signature::from_der_lax(&valid_sig).unwrap();

        // R padded with two extra zero bytes, sequence length left stale.
        let mut padded = vec![0x30, 0x44, 0x02, 0x22, 0x00, 0x00];
        padded.extend_from_slice(&valid_sig[4..]);
        padded.extend_from_slice(&[0xde, 0xad]);
        assert_eq!(Signature::from_der_lax(&padded).unwrap(), expected);
    }

    #[test]
    fn test_lax_der_overflow_yields_zero_signature() {
        let mut sig = vec![0x30, 0x26, 0x02, 0x21, 0x01];
        sig.extend_from_slice(&[0xff; 32]);
        sig.extend_from_slice(&[0x02, 0x01, 0x01]);
        let parsed = Signature::from_der_lax(&sig).unwrap();
        assert_eq!(parsed.r(), &[0u8; 32]);
        assert_eq!(parsed.s(), &[0u8; 32]);
    }

    #[test]
    fn test_signature_serialize_low_s() {
        let sig = Signature::new(
            hex_to_32("a196ed0e7ebcbe7b63fe1d8eecbdbde03a67ceba4fc8f6482bdcb9606a911404"),
            hex_to_32("971729c7fa944b465b35250c6570a2f31acbb14b13d1565fab7330dcb2b3dfb1"),
        );
        assert!(!sig.is_low_s());
        let expected = hex::decode(
            "3045022100a196ed0e7ebcbe7b63fe1d8eecbdbde03a67ceba4fc8f6482bdcb9606a911404\
             022068e8d638056bb4b9a4cadaf39a8f5d0b9fe32b9b9b7749dc145f2db01d826190",
        )
        .unwrap();
        assert_eq!(sig.to_der(), expected);
        assert!(sig.normalize_s().is_low_s());
    }

    /// RFC6979 vectors (Trezor / CoreBitcoin).
    #[test]
    fn test_rfc6979() {
        let tests = vec![
            (
                "cca9fbcc1b41e5a95d369eaa6ddcff73b61a4efaa279cfc6567e8daa39cbaf50",
                "sample",
                "3045022100af340daf02cc15c8d5d08d7735dfe6b98a474ed373bdb5fbecf7571be52b384202205009fb27f37034a9b24b707b7c6b79ca23ddef9e25f7282e8a797efe53a8f124",
            ),
            (
                "0000000000000000000000000000000000000000000000000000000000000001",
                "Satoshi Nakamoto",
                "3045022100934b1ea10a4b3c1757e2b0c017d0b6143ce3c9a7e6a4a49860d7a6ab210ee3d802202442ce9d2b916064108014783e923ec36b49743e2ffa1c4496f01a512aafd9e5",
            ),
            (
                "f8b8af8ce3c7cca5e300d33939540c10d45ce001b8f252bfbc57ba0342904181",
                "Alan Turing",
                "304402207063ae83e7f62bbb171798131b4a0564b956930092b33b07b395615d9ec7e15c022058dfcc1e00a35e1572f366ffe34ba0fc47db1e7189759b9fb233c5b05ab388ea",
            ),
        ];

        for (key_hex, msg, expected_sig_hex) in &tests {
            let priv_key = PrivateKey::from_hex(key_hex).unwrap();
            let hash = sha256(msg.as_bytes());

            let sig = priv_key.sign(&hash).unwrap();
            assert_eq!(hex::encode(sig.to_der()), *expected_sig_hex, "RFC6979 for '{}'", msg);
            assert!(priv_key.pub_key().verify(&hash, &sig));
        }
    }

    #[test]
    fn test_high_s_still_verifies() {
        let priv_key = PrivateKey::from_hex(
            "cca9fbcc1b41e5a95d369eaa6ddcff73b61a4efaa279cfc6567e8daa39cbaf50",
        )
        .unwrap();
        let hash = sha256(b"high s");
        let sig = priv_key.sign(&hash).unwrap();
        let high = Signature::new(*sig.r(), subtract_from_order(sig.s()));
        assert!(!high.is_low_s());
        assert!(priv_key.pub_key().verify(&hash, &high));
    }

    #[test]
    fn test_wrong_digest_fails() {
        let priv_key = PrivateKey::from_hex(
            "0000000000000000000000000000000000000000000000000000000000000001",
        )
        .unwrap();
        let sig = priv_key.sign(&sha256(b"one")).unwrap();
        assert!(!priv_key.pub_key().verify(&sha256(b"two"), &sig));
    }

    fn hex_to_32(s: &str) -> [u8; 32] {
        let bytes = hex::decode(s).unwrap();
        let mut out = [0u8; 32];
        out[32 - bytes.len()..].copy_from_slice(&bytes);
        out
    }
}
