//! Flow control and locktime operations for the script interpreter.

use crate::opcode::Opcode;

use super::config::LOCKTIME_NUMBER_LENGTH;
use super::error::{InterpreterError, InterpreterErrorCode};
use super::flags::ScriptFlags;
use super::scriptnum::ScriptNum;
use super::stack::as_bool;
use super::thread::Thread;
use super::SigVersion;

/// Lock time threshold (block height vs timestamp).
const LOCK_TIME_THRESHOLD: i64 = 500_000_000;

/// Sequence value that disables locktime for an input.
const SEQUENCE_FINAL: u32 = 0xffff_ffff;
/// Sequence lock time disabled bit.
const SEQUENCE_LOCK_TIME_DISABLED: i64 = 1 << 31;
/// Sequence lock time is seconds flag.
const SEQUENCE_LOCK_TIME_IS_SECONDS: i64 = 1 << 22;
/// Sequence lock time mask.
const SEQUENCE_LOCK_TIME_MASK: i64 = 0x0000_ffff;

fn unsatisfied(msg: &str) -> InterpreterError {
    InterpreterError::new(InterpreterErrorCode::UnsatisfiedLocktime, msg.to_string())
}

impl<'a> Thread<'a> {
    /// OP_IF / OP_NOTIF. In an untaken branch only the nesting is tracked.
    pub(crate) fn op_if(&mut self, negate: bool) -> Result<(), InterpreterError> {
        let mut cond = false;
        if self.is_branch_executing() {
            if self.dstack.is_empty() {
                return Err(InterpreterError::new(
                    InterpreterErrorCode::UnbalancedConditional,
                    "conditional requires a value on the stack".to_string(),
                ));
            }
            let top = self.dstack.pop()?;
            if self.sig_version == SigVersion::WitnessV0 && self.has_flag(ScriptFlags::MINIMALIF) {
                if top.len() > 1 {
                    return Err(InterpreterError::new(
                        InterpreterErrorCode::MinimalIf,
                        format!("conditional has data of length {}", top.len()),
                    ));
                }
                if top.len() == 1 && top[0] != 1 {
                    return Err(InterpreterError::new(
                        InterpreterErrorCode::MinimalIf,
                        "conditional failed".to_string(),
                    ));
                }
            }
            cond = as_bool(&top) != negate;
        }
        self.cond_stack.push(cond);
        Ok(())
    }

    pub(crate) fn op_verify(&mut self) -> Result<(), InterpreterError> {
        if !self.dstack.get_bool(-1)? {
            return Err(InterpreterError::new(
                InterpreterErrorCode::Verify,
                "OP_VERIFY failed".to_string(),
            ));
        }
        self.dstack.drop()
    }

    pub(crate) fn op_return(&self) -> Result<(), InterpreterError> {
        Err(InterpreterError::new(
            InterpreterErrorCode::OpReturn,
            "script returned early".to_string(),
        ))
    }

    pub(crate) fn op_upgradable_nop(&self, op: &Opcode) -> Result<(), InterpreterError> {
        if self.has_flag(ScriptFlags::DISCOURAGE_UPGRADABLE_NOPS) {
            return Err(InterpreterError::new(
                InterpreterErrorCode::DiscourageUpgradableNops,
                format!("{} reserved for soft-fork upgrades", op.name()),
            ));
        }
        Ok(())
    }

    /// Peek the 5-byte locktime operand, rejecting negatives.
    fn peek_locktime_operand(&self) -> Result<i64, InterpreterError> {
        let n = self
            .dstack
            .get_num(-1, self.require_minimal(), LOCKTIME_NUMBER_LENGTH)?;
        if n.is_negative() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::NegativeLocktime,
                format!("negative lock time: {}", n.to_i64()),
            ));
        }
        Ok(n.to_i64())
    }

    pub(crate) fn op_check_locktime_verify(&mut self, op: &Opcode) -> Result<(), InterpreterError> {
        if !self.has_flag(ScriptFlags::CHECKLOCKTIMEVERIFY) {
            return self.op_upgradable_nop(op);
        }

        let lock_time = self.peek_locktime_operand()?;
        let ctx = self
            .tx_context
            .ok_or_else(|| unsatisfied("locktime requires a transaction context"))?;

        let tx_lock_time = ctx.lock_time() as i64;
        let same_kind = (tx_lock_time < LOCK_TIME_THRESHOLD) == (lock_time < LOCK_TIME_THRESHOLD);
        if !same_kind {
            return Err(unsatisfied("mismatched locktime types"));
        }
        if lock_time > tx_lock_time {
            return Err(InterpreterError::new(
                InterpreterErrorCode::UnsatisfiedLocktime,
                format!(
                    "locktime requirement not satisfied -- locktime is greater than the transaction locktime: {} > {}",
                    lock_time, tx_lock_time
                ),
            ));
        }
        if ctx.input_sequence(ctx.input_index()) == SEQUENCE_FINAL {
            return Err(unsatisfied("transaction input is finalized"));
        }
        Ok(())
    }

    pub(crate) fn op_check_sequence_verify(&mut self, op: &Opcode) -> Result<(), InterpreterError> {
        if !self.has_flag(ScriptFlags::CHECKSEQUENCEVERIFY) {
            return self.op_upgradable_nop(op);
        }

        let sequence = self.peek_locktime_operand()?;
        if sequence & SEQUENCE_LOCK_TIME_DISABLED != 0 {
            return Ok(());
        }

        let ctx = self
            .tx_context
            .ok_or_else(|| unsatisfied("sequence lock requires a transaction context"))?;

        if ctx.tx_version() < 2 {
            return Err(InterpreterError::new(
                InterpreterErrorCode::UnsatisfiedLocktime,
                format!("invalid transaction version: {}", ctx.tx_version()),
            ));
        }

        let tx_sequence = ctx.input_sequence(ctx.input_index()) as i64;
        if tx_sequence & SEQUENCE_LOCK_TIME_DISABLED != 0 {
            return Err(InterpreterError::new(
                InterpreterErrorCode::UnsatisfiedLocktime,
                format!("transaction sequence has sequence locktime disabled bit set: 0x{:x}", tx_sequence),
            ));
        }

        let mask = SEQUENCE_LOCK_TIME_IS_SECONDS | SEQUENCE_LOCK_TIME_MASK;
        let tx_masked = tx_sequence & mask;
        let masked = sequence & mask;
        let same_kind = (tx_masked < SEQUENCE_LOCK_TIME_IS_SECONDS)
            == (masked < SEQUENCE_LOCK_TIME_IS_SECONDS);
        if !same_kind {
            return Err(unsatisfied("mismatched sequence lock types"));
        }
        if masked > tx_masked {
            return Err(InterpreterError::new(
                InterpreterErrorCode::UnsatisfiedLocktime,
                format!("sequence lock {} is greater than input sequence {}", masked, tx_masked),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::interpreter::{
        execute, InterpreterErrorCode, ScriptFlags, SigVersion, Stack, TxContext,
    };
    use crate::Script;

    struct LockCtx {
        lock_time: u32,
        version: u32,
        sequence: u32,
    }

    impl TxContext for LockCtx {
        fn lock_time(&self) -> u32 {
            self.lock_time
        }
        fn tx_version(&self) -> u32 {
            self.version
        }
        fn input_index(&self) -> usize {
            0
        }
        fn input_sequence(&self, _input_idx: usize) -> u32 {
            self.sequence
        }
        fn input_value(&self) -> u64 {
            0
        }
        fn signature_hash(&self, _: &Script, _: u32, _: SigVersion) -> [u8; 32] {
            [0u8; 32]
        }
    }

    fn run(text: &str, flags: ScriptFlags, ctx: Option<&dyn TxContext>) -> Result<Stack, InterpreterErrorCode> {
        let script = Script::from_string(text).unwrap();
        let mut stack = Stack::new();
        execute(&script, &mut stack, flags, ctx, SigVersion::Base).map_err(|e| e.code)?;
        Ok(stack)
    }

    #[test]
    fn test_if_empty_stack_is_unbalanced() {
        assert_eq!(run("IF ENDIF", ScriptFlags::NONE, None).unwrap_err(), InterpreterErrorCode::UnbalancedConditional);
        assert_eq!(run("NOTIF 1 ENDIF", ScriptFlags::NONE, None).unwrap_err(), InterpreterErrorCode::UnbalancedConditional);
        assert_eq!(run("1 IF", ScriptFlags::NONE, None).unwrap_err(), InterpreterErrorCode::UnbalancedConditional);
        assert_eq!(run("ELSE", ScriptFlags::NONE, None).unwrap_err(), InterpreterErrorCode::UnbalancedConditional);
        assert_eq!(run("1 ENDIF", ScriptFlags::NONE, None).unwrap_err(), InterpreterErrorCode::UnbalancedConditional);
    }

    #[test]
    fn test_nested_untaken_branches() {
        let stack = run("0 IF IF 2 ELSE 3 ENDIF ELSE 4 ENDIF", ScriptFlags::NONE, None).unwrap();
        assert_eq!(stack.items(), &[vec![4u8]]);
        let stack = run("1 IF 0 ELSE 2 ELSE 3 ENDIF", ScriptFlags::NONE, None).unwrap();
        assert_eq!(stack.items(), &[vec![], vec![3u8]]);
    }

    #[test]
    fn test_verif_fails_even_when_skipped() {
        assert_eq!(run("0 IF VERIF ENDIF 1", ScriptFlags::NONE, None).unwrap_err(), InterpreterErrorCode::BadOpcode);
        // OP_VER is only rejected when executed.
        assert!(run("0 IF VER ENDIF 1", ScriptFlags::NONE, None).is_ok());
        assert_eq!(run("VER", ScriptFlags::NONE, None).unwrap_err(), InterpreterErrorCode::BadOpcode);
    }

    #[test]
    fn test_verify_and_return() {
        assert_eq!(run("0 VERIFY", ScriptFlags::NONE, None).unwrap_err(), InterpreterErrorCode::Verify);
        assert!(run("1 VERIFY", ScriptFlags::NONE, None).unwrap().is_empty());
        assert_eq!(run("1 RETURN", ScriptFlags::NONE, None).unwrap_err(), InterpreterErrorCode::OpReturn);
        assert!(run("0 IF RETURN ENDIF", ScriptFlags::NONE, None).is_ok());
    }

    #[test]
    fn test_upgradable_nops() {
        assert!(run("NOP1 NOP10 NOP2 NOP3", ScriptFlags::NONE, None).is_ok());
        let flags = ScriptFlags::DISCOURAGE_UPGRADABLE_NOPS;
        assert!(run("NOP", flags, None).is_ok());
        assert_eq!(run("NOP4", flags, None).unwrap_err(), InterpreterErrorCode::DiscourageUpgradableNops);
        assert_eq!(run("NOP2", flags, None).unwrap_err(), InterpreterErrorCode::DiscourageUpgradableNops);
        assert!(run("0 IF NOP4 ENDIF", flags, None).is_ok());
    }

    #[test]
    fn test_checklocktimeverify() {
        let flags = ScriptFlags::CHECKLOCKTIMEVERIFY;
        let ctx = LockCtx { lock_time: 100, version: 1, sequence: 0 };

        assert!(run("100 CHECKLOCKTIMEVERIFY", flags, Some(&ctx)).is_ok());
        assert_eq!(run("101 CHECKLOCKTIMEVERIFY", flags, Some(&ctx)).unwrap_err(), InterpreterErrorCode::UnsatisfiedLocktime);
        assert_eq!(run("-1 CHECKLOCKTIMEVERIFY", flags, Some(&ctx)).unwrap_err(), InterpreterErrorCode::NegativeLocktime);
        assert_eq!(run("500000000 CHECKLOCKTIMEVERIFY", flags, Some(&ctx)).unwrap_err(), InterpreterErrorCode::UnsatisfiedLocktime);
        assert_eq!(run("CHECKLOCKTIMEVERIFY", flags, Some(&ctx)).unwrap_err(), InterpreterErrorCode::Underflow);
        assert_eq!(run("1 CHECKLOCKTIMEVERIFY", flags, None).unwrap_err(), InterpreterErrorCode::UnsatisfiedLocktime);

        // Five-byte operands are accepted, six-byte ones are not.
        assert_eq!(run("0x05 0x0000000000 CHECKLOCKTIMEVERIFY", flags, Some(&ctx)).unwrap(), stack_of(&[&[0, 0, 0, 0, 0]]));
        assert_eq!(run("0x06 0x000000000000 CHECKLOCKTIMEVERIFY", flags, Some(&ctx)).unwrap_err(), InterpreterErrorCode::ScriptNumError);

        let final_ctx = LockCtx { lock_time: 100, version: 1, sequence: 0xffff_ffff };
        assert_eq!(run("1 CHECKLOCKTIMEVERIFY", flags, Some(&final_ctx)).unwrap_err(), InterpreterErrorCode::UnsatisfiedLocktime);
    }

    #[test]
    fn test_checksequenceverify() {
        let flags = ScriptFlags::CHECKSEQUENCEVERIFY;
        let ctx = LockCtx { lock_time: 0, version: 2, sequence: 10 };

        assert!(run("10 CHECKSEQUENCEVERIFY", flags, Some(&ctx)).is_ok());
        assert_eq!(run("11 CHECKSEQUENCEVERIFY", flags, Some(&ctx)).unwrap_err(), InterpreterErrorCode::UnsatisfiedLocktime);
        assert_eq!(run("-1 CHECKSEQUENCEVERIFY", flags, Some(&ctx)).unwrap_err(), InterpreterErrorCode::NegativeLocktime);
        // Disable bit set on the operand: no-op, even without a context.
        assert!(run("0x05 0x0000008000 CHECKSEQUENCEVERIFY", flags, None).is_ok());
        // Type flag mismatch.
        assert_eq!(run("0x03 0x000040 CHECKSEQUENCEVERIFY", flags, Some(&ctx)).unwrap_err(), InterpreterErrorCode::UnsatisfiedLocktime);

        let v1 = LockCtx { lock_time: 0, version: 1, sequence: 10 };
        assert_eq!(run("1 CHECKSEQUENCEVERIFY", flags, Some(&v1)).unwrap_err(), InterpreterErrorCode::UnsatisfiedLocktime);
        let disabled = LockCtx { lock_time: 0, version: 2, sequence: 0x8000_0000 };
        assert_eq!(run("1 CHECKSEQUENCEVERIFY", flags, Some(&disabled)).unwrap_err(), InterpreterErrorCode::UnsatisfiedLocktime);
    }

    #[test]
    fn test_minimalif_witness_only() {
        let script = Script::from_string("IF 1 ENDIF").unwrap();
        let flags = ScriptFlags::MINIMALIF;

        let mut stack = Stack::from_items(vec![vec![2]]);
        let err = execute(&script, &mut stack, flags, None, SigVersion::WitnessV0).unwrap_err();
        assert_eq!(err.code, InterpreterErrorCode::MinimalIf);

        let mut stack = Stack::from_items(vec![vec![1, 0]]);
        let err = execute(&script, &mut stack, flags, None, SigVersion::WitnessV0).unwrap_err();
        assert_eq!(err.code, InterpreterErrorCode::MinimalIf);

        let mut stack = Stack::from_items(vec![vec![2]]);
        execute(&script, &mut stack, flags, None, SigVersion::Base).unwrap();

        let mut stack = Stack::from_items(vec![Vec::<u8>::new()]);
        execute(&script, &mut stack, flags, None, SigVersion::WitnessV0).unwrap();
        assert!(stack.is_empty());
    }

    fn stack_of(items: &[&[u8]]) -> Stack {
        Stack::from_items(items.iter().map(|i| i.to_vec()).collect())
    }
}
