//! Digests behind the script hash opcodes and output commitments.

use ripemd::Ripemd160;
use sha1::Sha1;
use sha2::digest::Output;
use sha2::{Digest, Sha256};

fn digest<D: Digest>(data: &[u8]) -> Output<D> {
    D::digest(data)
}

/// OP_SHA1.
pub fn sha1(data: &[u8]) -> [u8; 20] {
    digest::<Sha1>(data).into()
}

/// OP_SHA256, and the commitment inside a 32-byte witness program.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    digest::<Sha256>(data).into()
}

/// OP_HASH256: SHA-256 applied twice.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// OP_RIPEMD160.
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    digest::<Ripemd160>(data).into()
}

/// OP_HASH160: RIPEMD-160 of SHA-256. Keys and scripts in P2PKH, P2SH and
/// P2WPKH outputs are committed this way.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    ripemd160(&sha256(data))
}
