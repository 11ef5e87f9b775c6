/// Elliptic curve cryptography on secp256k1.
///
/// Public key parsing (including hybrid encodings), lax-DER ECDSA
/// signatures and deterministic signing for test fixtures.

pub mod private_key;
pub mod public_key;
pub mod signature;

pub use private_key::PrivateKey;
pub use public_key::PublicKey;
pub use signature::Signature;
