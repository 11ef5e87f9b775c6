/// Drivenet primitives - hashing, byte cursors and secp256k1 ECDSA.
///
/// This crate provides the building blocks the script engine leans on:
/// - Hash functions (SHA-1, SHA-256, SHA-256d, RIPEMD-160, Hash160)
/// - Little-endian byte cursors and Bitcoin variable-length integers
/// - secp256k1 public keys and ECDSA signatures with Bitcoin's lax DER rules

pub mod hash;
pub mod util;
pub mod ec;

mod error;
pub use error::PrimitivesError;
