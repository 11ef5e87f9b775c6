//! Script interpreter and verifier.
//!
//! Executes scriptSig, scriptPubKey, P2SH redeem scripts and version 0
//! witness programs under a set of verification flags.
//!
//! # Architecture
//!
//! The interpreter knows nothing about transactions. Callers provide a
//! [`TxContext`] implementation that supplies the signature hash and the
//! locktime fields of the spending input.
//!
//! # Example
//!
//! ```ignore
//! use drivenet_script::interpreter::{Engine, ScriptFlags};
//!
//! let engine = Engine::new();
//! engine.verify(
//!     &script_sig,
//!     &witness,
//!     &script_pubkey,
//!     Some(&tx_context),
//!     ScriptFlags::STANDARD,
//! )?;
//! ```

pub mod config;
pub mod error;
pub mod flags;
pub mod scriptnum;
pub mod stack;
pub mod thread;

mod ops_arithmetic;
mod ops_crypto;
mod ops_data;
mod ops_flow;
mod ops_stack;
mod verify;

pub use config::{Config, DisabledOpcodePolicy};
pub use error::{InterpreterError, InterpreterErrorCode};
pub use flags::ScriptFlags;
pub use scriptnum::ScriptNum;
pub use stack::Stack;

use drivenet_primitives::ec::{PublicKey, Signature};

use crate::{Script, Witness};
use thread::Thread;

/// Which signature-hash and script-code rules apply to an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigVersion {
    /// Legacy scripts: scriptSig, scriptPubKey and P2SH redeem scripts.
    Base,
    /// Version 0 witness programs.
    WitnessV0,
}

/// Transaction context for signature and locktime checks.
///
/// Implementors describe the input being verified.
pub trait TxContext {
    /// The transaction lock time.
    fn lock_time(&self) -> u32;

    /// The transaction version.
    fn tx_version(&self) -> u32;

    /// Index of the input being verified.
    fn input_index(&self) -> usize;

    /// Sequence number of the given input.
    fn input_sequence(&self, input_idx: usize) -> u32;

    /// Value of the output being spent, used by witness signature hashes.
    fn input_value(&self) -> u64;

    /// Digest to sign for `script_code` under `hash_type`.
    fn signature_hash(&self, script_code: &Script, hash_type: u32, sig_version: SigVersion) -> [u8; 32];

    /// Verify a signature (DER plus trailing hash-type byte) against a
    /// serialized public key.
    ///
    /// Malformed signatures or keys verify as false.
    fn check_signature(
        &self,
        full_sig: &[u8],
        pub_key: &[u8],
        script_code: &Script,
        sig_version: SigVersion,
    ) -> bool {
        let Some((&hash_type, der)) = full_sig.split_last() else {
            return false;
        };
        let Ok(pub_key) = PublicKey::from_bytes(pub_key) else {
            return false;
        };
        let Ok(sig) = Signature::from_der_lax(der) else {
            return false;
        };
        let hash = self.signature_hash(script_code, hash_type as u32, sig_version);
        pub_key.verify(&hash, &sig)
    }
}

/// The script execution engine.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: Config,
}

impl Engine {
    /// Engine with consensus limits.
    pub fn new() -> Self {
        Engine { config: Config::default() }
    }

    /// Engine with custom limits and disabled-opcode policy.
    pub fn with_config(config: Config) -> Self {
        Engine { config }
    }

    /// Limits this engine runs with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run a single script against `stack`.
    ///
    /// # Arguments
    /// * `script` - The script to run. It is never modified.
    /// * `stack` - Initial stack; holds the final stack on success.
    /// * `flags` - Verification flags.
    /// * `tx_context` - Optional transaction context for checksig and locktime.
    /// * `sig_version` - Legacy or witness v0 rules.
    pub fn execute(
        &self,
        script: &Script,
        stack: &mut Stack,
        flags: ScriptFlags,
        tx_context: Option<&dyn TxContext>,
        sig_version: SigVersion,
    ) -> Result<(), InterpreterError> {
        Thread::new(script, stack, flags, tx_context, sig_version, &self.config).execute()
    }

    /// Verify an input: scriptSig and witness against the scriptPubKey.
    pub fn verify(
        &self,
        script_sig: &Script,
        witness: &Witness,
        script_pubkey: &Script,
        tx_context: Option<&dyn TxContext>,
        flags: ScriptFlags,
    ) -> Result<(), InterpreterError> {
        verify::verify_script(self, script_sig, witness, script_pubkey, tx_context, flags)
    }
}

/// Run a single script with consensus limits.
pub fn execute(
    script: &Script,
    stack: &mut Stack,
    flags: ScriptFlags,
    tx_context: Option<&dyn TxContext>,
    sig_version: SigVersion,
) -> Result<(), InterpreterError> {
    Engine::new().execute(script, stack, flags, tx_context, sig_version)
}

/// Verify an input with consensus limits.
pub fn verify(
    script_sig: &Script,
    witness: &Witness,
    script_pubkey: &Script,
    tx_context: Option<&dyn TxContext>,
    flags: ScriptFlags,
) -> Result<(), InterpreterError> {
    Engine::new().verify(script_sig, witness, script_pubkey, tx_context, flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcodes::*;

    fn run(script: &Script, engine: &Engine) -> Result<Stack, InterpreterError> {
        let mut stack = Stack::new();
        engine.execute(script, &mut stack, ScriptFlags::NONE, None, SigVersion::Base)?;
        Ok(stack)
    }

    #[test]
    fn test_disabled_opcode_policy() {
        // OP_0 OP_IF OP_CAT OP_ENDIF OP_1
        let script = Script::from_bytes(&[OP_0, OP_IF, OP_CAT, OP_ENDIF, OP_1]);

        let err = run(&script, &Engine::new()).unwrap_err();
        assert_eq!(err.code, InterpreterErrorCode::DisabledOpcode);

        let lenient = Engine::with_config(Config::with_disabled_opcode_policy(
            DisabledOpcodePolicy::ExecutedOnly,
        ));
        let stack = run(&script, &lenient).unwrap();
        assert_eq!(stack.items(), &[vec![1u8]]);

        // Executed disabled opcodes fail under both policies.
        let script = Script::from_bytes(&[OP_1, OP_1, OP_CAT]);
        assert_eq!(run(&script, &lenient).unwrap_err().code, InterpreterErrorCode::DisabledOpcode);
    }

    #[test]
    fn test_engine_limits_come_from_config() {
        let engine = Engine::with_config(Config { max_ops: 2, ..Config::default() });
        let script = Script::from_bytes(&[OP_1, OP_DUP, OP_DUP, OP_DUP]);
        assert_eq!(run(&script, &engine).unwrap_err().code, InterpreterErrorCode::OpCountExceeded);
        assert_eq!(engine.config().max_ops, 2);
        assert_eq!(run(&script, &Engine::new()).unwrap().len(), 4);
    }

    #[test]
    fn test_free_functions_use_defaults() {
        let script_pubkey = Script::from_bytes(&[OP_1]);
        verify(&Script::new(), &Witness::new(), &script_pubkey, None, ScriptFlags::STANDARD).unwrap();

        let mut stack = Stack::new();
        execute(&Script::from_bytes(&[OP_16]), &mut stack, ScriptFlags::NONE, None, SigVersion::Base)
            .unwrap();
        assert_eq!(stack.items(), &[vec![16u8]]);
    }
}
