#![deny(missing_docs)]

//! Drivenet SDK - script engine facade.
//!
//! Re-exports the primitives and script crates for single-crate usage.

/// Hashing, byte cursors and secp256k1 keys and signatures.
pub use drivenet_primitives as primitives;
/// Scripts, witnesses, the interpreter and sidechain critical data.
pub use drivenet_script as script;
