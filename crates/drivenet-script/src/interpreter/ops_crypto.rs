//! Hashing and signature-checking operations for the script interpreter.

use drivenet_primitives::ec::Signature;
use drivenet_primitives::hash;

use crate::opcode::Opcode;
use crate::Script;

use super::error::{InterpreterError, InterpreterErrorCode};
use super::flags::ScriptFlags;
use super::thread::Thread;
use super::SigVersion;

const SIGHASH_ANYONECANPAY: u8 = 0x80;

pub(crate) enum HashType {
    Ripemd160,
    Sha1,
    Sha256,
    Hash160,
    Hash256,
}

/// Strict DER check for a signature with its trailing hash-type byte.
///
/// Format: 0x30 [total-length] 0x02 [R-length] [R] 0x02 [S-length] [S] [sighash]
pub fn is_valid_signature_encoding(sig: &[u8]) -> bool {
    let len = sig.len();
    if !(9..=73).contains(&len) {
        return false;
    }
    if sig[0] != 0x30 || sig[1] as usize != len - 3 {
        return false;
    }

    let len_r = sig[3] as usize;
    if 5 + len_r >= len {
        return false;
    }
    let len_s = sig[5 + len_r] as usize;
    if len_r + len_s + 7 != len {
        return false;
    }

    if sig[2] != 0x02 || len_r == 0 || sig[4] & 0x80 != 0 {
        return false;
    }
    if len_r > 1 && sig[4] == 0x00 && sig[5] & 0x80 == 0 {
        return false;
    }

    if sig[len_r + 4] != 0x02 || len_s == 0 || sig[len_r + 6] & 0x80 != 0 {
        return false;
    }
    if len_s > 1 && sig[len_r + 6] == 0x00 && sig[len_r + 7] & 0x80 == 0 {
        return false;
    }
    true
}

fn is_compressed_pub_key(pub_key: &[u8]) -> bool {
    pub_key.len() == 33 && (pub_key[0] == 0x02 || pub_key[0] == 0x03)
}

fn is_compressed_or_uncompressed_pub_key(pub_key: &[u8]) -> bool {
    is_compressed_pub_key(pub_key) || (pub_key.len() == 65 && pub_key[0] == 0x04)
}

impl<'a> Thread<'a> {
    pub(crate) fn op_hash(&mut self, hash_type: HashType) -> Result<(), InterpreterError> {
        let buf = self.dstack.pop()?;
        let result = match hash_type {
            HashType::Ripemd160 => hash::ripemd160(&buf).to_vec(),
            HashType::Sha1 => hash::sha1(&buf).to_vec(),
            HashType::Sha256 => hash::sha256(&buf).to_vec(),
            HashType::Hash160 => hash::hash160(&buf).to_vec(),
            HashType::Hash256 => hash::sha256d(&buf).to_vec(),
        };
        self.dstack.push(result);
        Ok(())
    }

    /// The script from just past the last executed OP_CODESEPARATOR.
    pub(crate) fn script_code(&self) -> Script {
        self.script.subscript(self.last_code_sep)
    }

    /// Strip a signature push from legacy script code.
    fn delete_signature(&self, script_code: &mut Script, sig: &[u8]) -> Result<(), InterpreterError> {
        if self.sig_version != SigVersion::Base {
            return Ok(());
        }
        let found = script_code.find_and_delete(&Opcode::from_data(sig).to_bytes());
        if found > 0 && self.has_flag(ScriptFlags::CONST_SCRIPTCODE) {
            return Err(InterpreterError::new(
                InterpreterErrorCode::SigFindAndDelete,
                "signature found in script code".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn check_signature_encoding(&self, sig: &[u8]) -> Result<(), InterpreterError> {
        // Empty signatures are a compact way to fail a CHECK(MULTI)SIG.
        if sig.is_empty() {
            return Ok(());
        }

        let strict = self.has_any(&[ScriptFlags::DERSIG, ScriptFlags::LOW_S, ScriptFlags::STRICTENC]);
        if strict && !is_valid_signature_encoding(sig) {
            return Err(InterpreterError::new(
                InterpreterErrorCode::SigDer,
                "signature is not strict DER".to_string(),
            ));
        }

        if self.has_flag(ScriptFlags::LOW_S) {
            let low = Signature::from_der_lax(&sig[..sig.len() - 1])
                .map(|s| s.is_low_s())
                .unwrap_or(false);
            if !low {
                return Err(InterpreterError::new(
                    InterpreterErrorCode::SigHighS,
                    "signature S value is unnecessarily high".to_string(),
                ));
            }
        }

        if self.has_flag(ScriptFlags::STRICTENC) {
            self.check_hash_type_encoding(sig[sig.len() - 1])?;
        }
        Ok(())
    }

    pub(crate) fn check_hash_type_encoding(&self, hash_type: u8) -> Result<(), InterpreterError> {
        let base = hash_type & !SIGHASH_ANYONECANPAY;
        if !(1..=3).contains(&base) {
            return Err(InterpreterError::new(
                InterpreterErrorCode::SigHashType,
                format!("invalid hash type 0x{:x}", hash_type),
            ));
        }
        Ok(())
    }

    pub(crate) fn check_pub_key_encoding(&self, pub_key: &[u8]) -> Result<(), InterpreterError> {
        if self.has_flag(ScriptFlags::STRICTENC) && !is_compressed_or_uncompressed_pub_key(pub_key) {
            return Err(InterpreterError::new(
                InterpreterErrorCode::PubkeyType,
                "unsupported public key type".to_string(),
            ));
        }
        if self.has_flag(ScriptFlags::WITNESS_PUBKEYTYPE)
            && self.sig_version == SigVersion::WitnessV0
            && !is_compressed_pub_key(pub_key)
        {
            return Err(InterpreterError::new(
                InterpreterErrorCode::WitnessPubkeyType,
                "witness public key must be compressed".to_string(),
            ));
        }
        Ok(())
    }

    fn check_sig(&self, sig: &[u8], pub_key: &[u8], script_code: &Script) -> bool {
        match self.tx_context {
            Some(ctx) => ctx.check_signature(sig, pub_key, script_code, self.sig_version),
            None => false,
        }
    }

    pub(crate) fn op_checksig(&mut self, verify: bool) -> Result<(), InterpreterError> {
        if self.dstack.len() < 2 {
            return Err(InterpreterError::new(
                InterpreterErrorCode::Underflow,
                "OP_CHECKSIG requires two stack items".to_string(),
            ));
        }
        let sig = self.dstack.peek(-2)?.to_vec();
        let pub_key = self.dstack.peek(-1)?.to_vec();

        let mut script_code = self.script_code();
        self.delete_signature(&mut script_code, &sig)?;

        self.check_signature_encoding(&sig)?;
        self.check_pub_key_encoding(&pub_key)?;

        let success = self.check_sig(&sig, &pub_key, &script_code);
        if !success && self.has_flag(ScriptFlags::NULLFAIL) && !sig.is_empty() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::NullFail,
                "signature not empty on failed checksig".to_string(),
            ));
        }

        self.dstack.drop()?;
        self.dstack.drop()?;
        if verify {
            if !success {
                return Err(InterpreterError::new(
                    InterpreterErrorCode::CheckSigVerify,
                    "OP_CHECKSIGVERIFY failed".to_string(),
                ));
            }
        } else {
            self.dstack.push_bool(success);
        }
        Ok(())
    }

    /// Read a count operand at `depth` items below the top.
    fn multisig_count(&self, depth: usize) -> Result<i32, InterpreterError> {
        self.require_depth(depth)?;
        Ok(self
            .dstack
            .get_num(-(depth as isize), self.require_minimal(), self.cfg.max_num_size)?
            .to_i32())
    }

    fn require_depth(&self, depth: usize) -> Result<(), InterpreterError> {
        if self.dstack.len() < depth {
            return Err(InterpreterError::new(
                InterpreterErrorCode::Underflow,
                format!("OP_CHECKMULTISIG needs {} stack items, have {}", depth, self.dstack.len()),
            ));
        }
        Ok(())
    }

    /// Stack layout, top first:
    /// `<n> <pubkey_n>..<pubkey_1> <m> <sig_m>..<sig_1> <dummy>`.
    pub(crate) fn op_checkmultisig(&mut self, verify: bool) -> Result<(), InterpreterError> {
        let mut i: usize = 1;
        let key_count = self.multisig_count(i)?;
        if key_count < 0 || key_count as usize > self.cfg.max_pubkeys_per_multisig {
            return Err(InterpreterError::new(
                InterpreterErrorCode::PubkeyCount,
                format!("invalid pubkey count {}", key_count),
            ));
        }
        let mut keys_left = key_count as usize;
        self.num_ops += keys_left;
        if self.num_ops > self.cfg.max_ops {
            return Err(InterpreterError::new(
                InterpreterErrorCode::OpCountExceeded,
                format!("exceeded max operation limit of {}", self.cfg.max_ops),
            ));
        }

        i += 1;
        let mut ikey = i;
        // Items still holding keys once the cleanup loop reaches them.
        let mut ikey2 = keys_left + 2;
        i += keys_left;

        let sig_count = self.multisig_count(i)?;
        if sig_count < 0 || sig_count as usize > keys_left {
            return Err(InterpreterError::new(
                InterpreterErrorCode::SigCount,
                format!("invalid signature count {} for {} keys", sig_count, keys_left),
            ));
        }
        let mut sigs_left = sig_count as usize;

        i += 1;
        let mut isig = i;
        i += sigs_left;
        // The dummy element is included in the depth check.
        self.require_depth(i)?;

        let mut script_code = self.script_code();
        for k in 0..sigs_left {
            let sig = self.dstack.peek(-((isig + k) as isize))?.to_vec();
            self.delete_signature(&mut script_code, &sig)?;
        }

        let mut success = true;
        while success && sigs_left > 0 {
            let sig = self.dstack.peek(-(isig as isize))?.to_vec();
            let pub_key = self.dstack.peek(-(ikey as isize))?.to_vec();

            self.check_signature_encoding(&sig)?;
            self.check_pub_key_encoding(&pub_key)?;

            if self.check_sig(&sig, &pub_key, &script_code) {
                isig += 1;
                sigs_left -= 1;
            }
            ikey += 1;
            keys_left -= 1;

            // More signatures left than keys means it can never succeed.
            if sigs_left > keys_left {
                success = false;
            }
        }

        while i > 1 {
            i -= 1;
            if !success
                && self.has_flag(ScriptFlags::NULLFAIL)
                && ikey2 == 0
                && !self.dstack.peek(-1)?.is_empty()
            {
                return Err(InterpreterError::new(
                    InterpreterErrorCode::NullFail,
                    "not all signatures empty on failed checkmultisig".to_string(),
                ));
            }
            ikey2 = ikey2.saturating_sub(1);
            self.dstack.drop()?;
        }

        let dummy = self.dstack.pop()?;
        if self.has_flag(ScriptFlags::NULLDUMMY) && !dummy.is_empty() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::SigNullDummy,
                format!("multisig dummy argument has length {} instead of 0", dummy.len()),
            ));
        }

        if verify {
            if !success {
                return Err(InterpreterError::new(
                    InterpreterErrorCode::CheckMultisigVerify,
                    "OP_CHECKMULTISIGVERIFY failed".to_string(),
                ));
            }
        } else {
            self.dstack.push_bool(success);
        }
        Ok(())
    }

    fn has_any(&self, flags: &[ScriptFlags]) -> bool {
        self.flags.has_any(flags)
    }
}
