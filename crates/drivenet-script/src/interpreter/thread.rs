//! Script execution thread, the core interpreter loop.

use crate::opcode::Opcode;
use crate::opcodes::*;
use crate::Script;

use super::config::{Config, DisabledOpcodePolicy};
use super::error::{InterpreterError, InterpreterErrorCode};
use super::flags::ScriptFlags;
use super::ops_crypto::HashType;
use super::scriptnum::ScriptNum;
use super::stack::{ConditionStack, Stack};
use super::{SigVersion, TxContext};

/// Execution state for one script run against one stack.
pub struct Thread<'a> {
    /// The main data stack, shared with the caller.
    pub dstack: &'a mut Stack,
    /// The alternate stack used by OP_TOALTSTACK and OP_FROMALTSTACK.
    pub astack: Stack,
    /// Taken/untaken state of the enclosing IF blocks.
    pub cond_stack: ConditionStack,
    /// Interpreter limits.
    pub cfg: &'a Config,
    /// The script being run.
    pub script: &'a Script,
    /// Byte offset just past the last executed OP_CODESEPARATOR.
    pub last_code_sep: usize,
    /// Running count of non-push opcodes (checked against max_ops).
    pub num_ops: usize,
    /// Active script verification flags.
    pub flags: ScriptFlags,
    /// Legacy or witness v0 rules.
    pub sig_version: SigVersion,
    /// Optional transaction context for signature and locktime checks.
    pub tx_context: Option<&'a dyn TxContext>,
}

impl<'a> Thread<'a> {
    pub fn new(
        script: &'a Script,
        dstack: &'a mut Stack,
        flags: ScriptFlags,
        tx_context: Option<&'a dyn TxContext>,
        sig_version: SigVersion,
        cfg: &'a Config,
    ) -> Self {
        Thread {
            dstack,
            astack: Stack::new(),
            cond_stack: ConditionStack::new(),
            cfg,
            script,
            last_code_sep: 0,
            num_ops: 0,
            flags,
            sig_version,
            tx_context,
        }
    }

    /// Check if a specific script verification flag is set.
    pub fn has_flag(&self, flag: ScriptFlags) -> bool {
        self.flags.has_flag(flag)
    }

    /// Whether numeric operands and pushes must be minimally encoded.
    pub fn require_minimal(&self) -> bool {
        self.has_flag(ScriptFlags::MINIMALDATA)
    }

    /// Return true if every enclosing branch is taken.
    pub fn is_branch_executing(&self) -> bool {
        self.cond_stack.all_true()
    }

    /// Pop a numeric operand of the default width.
    pub(crate) fn pop_num(&mut self) -> Result<ScriptNum, InterpreterError> {
        let minimal = self.require_minimal();
        self.dstack.pop_num(minimal, self.cfg.max_num_size)
    }

    /// Run the script to completion.
    pub fn execute(&mut self) -> Result<(), InterpreterError> {
        if self.script.len() > self.cfg.max_script_size {
            return Err(InterpreterError::new(
                InterpreterErrorCode::ScriptSize,
                format!(
                    "script size {} is larger than the max allowed size {}",
                    self.script.len(),
                    self.cfg.max_script_size
                ),
            ));
        }

        for (op, end) in self.script.opcodes_with_offsets() {
            self.step(&op, end)?;
        }

        if !self.cond_stack.is_empty() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::UnbalancedConditional,
                "end of script reached in conditional execution".to_string(),
            ));
        }
        Ok(())
    }

    /// Execute one opcode. `end` is the byte offset just past it.
    fn step(&mut self, op: &Opcode, end: usize) -> Result<(), InterpreterError> {
        let exec = self.is_branch_executing();
        log::trace!(
            "{:>5} {:<22} exec={} depth={}",
            end - op.size(),
            op.name(),
            exec,
            self.dstack.len()
        );

        if op.truncated {
            return Err(InterpreterError::new(
                InterpreterErrorCode::BadOpcode,
                format!("opcode {} requires more bytes than the script holds", op.name()),
            ));
        }

        if op.data.len() > self.cfg.max_element_size {
            return Err(InterpreterError::new(
                InterpreterErrorCode::PushSize,
                format!(
                    "element size {} exceeds max allowed size {}",
                    op.data.len(),
                    self.cfg.max_element_size
                ),
            ));
        }

        if op.value > OP_16 {
            self.num_ops += 1;
            if self.num_ops > self.cfg.max_ops {
                return Err(InterpreterError::new(
                    InterpreterErrorCode::OpCountExceeded,
                    format!("exceeded max operation limit of {}", self.cfg.max_ops),
                ));
            }
        }

        if op.is_disabled()
            && (exec || self.cfg.disabled_opcode_policy == DisabledOpcodePolicy::Always)
        {
            return Err(InterpreterError::new(
                InterpreterErrorCode::DisabledOpcode,
                format!("attempt to execute disabled opcode {}", op.name()),
            ));
        }

        if op.value == OP_CODESEPARATOR
            && self.sig_version == SigVersion::Base
            && self.has_flag(ScriptFlags::CONST_SCRIPTCODE)
        {
            return Err(InterpreterError::new(
                InterpreterErrorCode::OpCodeSeparator,
                "OP_CODESEPARATOR in non-segwit script".to_string(),
            ));
        }

        if exec && op.is_push() {
            if self.require_minimal() && !op.is_minimal() {
                return Err(InterpreterError::new(
                    InterpreterErrorCode::MinimalData,
                    format!(
                        "data push of {} bytes encoded with opcode {} is not minimal",
                        op.data.len(),
                        op.name()
                    ),
                ));
            }
            self.dstack.push(op.data.clone());
        } else if exec || (OP_IF..=OP_ENDIF).contains(&op.value) {
            self.dispatch_opcode(op, end)?;
        }

        let combined = self.dstack.len() + self.astack.len();
        if combined > self.cfg.max_stack_size {
            return Err(InterpreterError::new(
                InterpreterErrorCode::StackSize,
                format!(
                    "combined stack size {} > max allowed {}",
                    combined, self.cfg.max_stack_size
                ),
            ));
        }
        Ok(())
    }

    fn dispatch_opcode(&mut self, op: &Opcode, end: usize) -> Result<(), InterpreterError> {
        match op.value {
            OP_1NEGATE => {
                self.dstack.push_num(&ScriptNum::new(-1));
                Ok(())
            }
            OP_1..=OP_16 => {
                self.dstack.push(vec![op.value - (OP_1 - 1)]);
                Ok(())
            }

            // Flow control
            OP_NOP => Ok(()),
            OP_IF => self.op_if(false),
            OP_NOTIF => self.op_if(true),
            OP_ELSE => self.cond_stack.toggle_top(),
            OP_ENDIF => self.cond_stack.pop().map(|_| ()),
            OP_VERIFY => self.op_verify(),
            OP_RETURN => self.op_return(),

            // Locktime
            OP_CHECKLOCKTIMEVERIFY => self.op_check_locktime_verify(op),
            OP_CHECKSEQUENCEVERIFY => self.op_check_sequence_verify(op),

            // Stack ops
            OP_TOALTSTACK => self.op_to_alt_stack(),
            OP_FROMALTSTACK => self.op_from_alt_stack(),
            OP_2DROP => self.op_2drop(),
            OP_2DUP => self.dstack.dup_n(2),
            OP_3DUP => self.dstack.dup_n(3),
            OP_2OVER => self.dstack.over_n(2),
            OP_2ROT => self.dstack.rot_n(2),
            OP_2SWAP => self.dstack.swap_n(2),
            OP_IFDUP => self.op_ifdup(),
            OP_DEPTH => {
                let d = self.dstack.len() as i64;
                self.dstack.push_num(&ScriptNum::new(d));
                Ok(())
            }
            OP_DROP => self.dstack.drop(),
            OP_DUP => self.dstack.dup(),
            OP_NIP => self.dstack.nip(),
            OP_OVER => self.dstack.over(),
            OP_PICK => self.op_pick(),
            OP_ROLL => self.op_roll(),
            OP_ROT => self.dstack.rot(),
            OP_SWAP => self.dstack.swap_n(1),
            OP_TUCK => self.dstack.tuck(),

            // Splice & bitwise
            OP_SIZE => self.op_size(),
            OP_EQUAL => self.op_equal(),
            OP_EQUALVERIFY => self.op_equalverify(),

            // Arithmetic
            OP_1ADD => self.op_unary_int(|m| {
                m.incr();
            }),
            OP_1SUB => self.op_unary_int(|m| {
                m.decr();
            }),
            OP_NEGATE => self.op_unary_int(|m| {
                m.neg();
            }),
            OP_ABS => self.op_unary_int(|m| {
                m.abs();
            }),
            OP_NOT => self.op_unary_bool(|m| m.is_zero()),
            OP_0NOTEQUAL => self.op_unary_bool(|m| !m.is_zero()),
            OP_ADD => self.op_binary_int(|a, b| {
                a.add(b);
            }),
            OP_SUB => self.op_binary_int(|a, b| {
                a.sub(b);
            }),
            OP_BOOLAND => self.op_bool_binop(|a, b| !a.is_zero() && !b.is_zero()),
            OP_BOOLOR => self.op_bool_binop(|a, b| !a.is_zero() || !b.is_zero()),
            OP_NUMEQUAL => self.op_bool_binop(|a, b| a.equal(b)),
            OP_NUMEQUALVERIFY => self.op_numequalverify(),
            OP_NUMNOTEQUAL => self.op_bool_binop(|a, b| !a.equal(b)),
            OP_LESSTHAN => self.op_bool_binop(|a, b| a.less_than(b)),
            OP_GREATERTHAN => self.op_bool_binop(|a, b| a.greater_than(b)),
            OP_LESSTHANOREQUAL => self.op_bool_binop(|a, b| a.less_than_or_equal(b)),
            OP_GREATERTHANOREQUAL => self.op_bool_binop(|a, b| a.greater_than_or_equal(b)),
            OP_MIN => self.op_binary_int(|a, b| {
                if b.less_than(a) {
                    *a = b.clone();
                }
            }),
            OP_MAX => self.op_binary_int(|a, b| {
                if b.greater_than(a) {
                    *a = b.clone();
                }
            }),
            OP_WITHIN => self.op_within(),

            // Crypto
            OP_RIPEMD160 => self.op_hash(HashType::Ripemd160),
            OP_SHA1 => self.op_hash(HashType::Sha1),
            OP_SHA256 => self.op_hash(HashType::Sha256),
            OP_HASH160 => self.op_hash(HashType::Hash160),
            OP_HASH256 => self.op_hash(HashType::Hash256),
            OP_CODESEPARATOR => {
                self.last_code_sep = end;
                Ok(())
            }
            OP_CHECKSIG => self.op_checksig(false),
            OP_CHECKSIGVERIFY => self.op_checksig(true),
            OP_CHECKMULTISIG => self.op_checkmultisig(false),
            OP_CHECKMULTISIGVERIFY => self.op_checkmultisig(true),

            // Upgradable NOPs
            OP_NOP1 | OP_NOP4 | OP_NOP5 | OP_NOP6 | OP_NOP7 | OP_NOP8 | OP_NOP9 | OP_NOP10 => {
                self.op_upgradable_nop(op)
            }

            // OP_RESERVED, OP_VER, OP_VERIF, OP_VERNOTIF, OP_RESERVED1,
            // OP_RESERVED2 and everything above OP_NOP10.
            _ => Err(InterpreterError::new(
                InterpreterErrorCode::BadOpcode,
                format!("attempt to execute invalid opcode {}", op.name()),
            )),
        }
    }
}
