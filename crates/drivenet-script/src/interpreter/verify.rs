//! Full input verification: scriptSig, scriptPubKey, P2SH and witness programs.

use drivenet_primitives::hash;

use crate::opcode::Opcode;
use crate::opcodes::*;
use crate::{Script, Witness};

use super::error::{InterpreterError, InterpreterErrorCode};
use super::flags::ScriptFlags;
use super::stack::{as_bool, Stack};
use super::{Engine, SigVersion, TxContext};

fn eval_false(msg: &str) -> InterpreterError {
    InterpreterError::new(InterpreterErrorCode::EvalFalse, msg.to_string())
}

fn top_is_true(stack: &Stack) -> bool {
    stack.items().last().map_or(false, |top| as_bool(top))
}

/// Verify a spending input against the output it spends.
pub(crate) fn verify_script(
    engine: &Engine,
    script_sig: &Script,
    witness: &Witness,
    script_pubkey: &Script,
    tx_context: Option<&dyn TxContext>,
    flags: ScriptFlags,
) -> Result<(), InterpreterError> {
    let result = run_verify(engine, script_sig, witness, script_pubkey, tx_context, flags);
    if let Err(e) = &result {
        log::debug!("script verification failed: {} (script_pubkey {})", e, script_pubkey);
    }
    result
}

fn run_verify(
    engine: &Engine,
    script_sig: &Script,
    witness: &Witness,
    script_pubkey: &Script,
    tx_context: Option<&dyn TxContext>,
    flags: ScriptFlags,
) -> Result<(), InterpreterError> {
    if flags.has_flag(ScriptFlags::SIGPUSHONLY) && !script_sig.is_push_only() {
        return Err(InterpreterError::new(
            InterpreterErrorCode::SigPushOnly,
            "signature script is not push only".to_string(),
        ));
    }

    let mut stack = Stack::new();
    engine.execute(script_sig, &mut stack, flags, tx_context, SigVersion::Base)?;

    let stack_copy = if flags.has_flag(ScriptFlags::P2SH) {
        Some(stack.clone())
    } else {
        None
    };

    engine.execute(script_pubkey, &mut stack, flags, tx_context, SigVersion::Base)?;
    if !top_is_true(&stack) {
        return Err(eval_false("false stack entry at end of script execution"));
    }

    let mut had_witness = false;

    if flags.has_flag(ScriptFlags::WITNESS) {
        if let Some((version, program)) = script_pubkey.witness_program() {
            had_witness = true;
            if !script_sig.is_empty() {
                return Err(InterpreterError::new(
                    InterpreterErrorCode::WitnessMalleated,
                    "native witness program has a non-empty signature script".to_string(),
                ));
            }
            verify_witness_program(engine, witness, version, program, tx_context, flags)?;
            // Bypass the cleanstack check below.
            stack.truncate(1);
        }
    }

    if let Some(copy) = stack_copy {
        if script_pubkey.is_scripthash() {
            if !script_sig.is_push_only() {
                return Err(InterpreterError::new(
                    InterpreterErrorCode::SigPushOnly,
                    "pay-to-script-hash signature script is not push only".to_string(),
                ));
            }

            stack = copy;
            // The scriptSig executed against the scripthash output, so it
            // left at least one item behind.
            let redeem_bytes = stack
                .pop()
                .map_err(|_| eval_false("empty stack before redeem script"))?;
            let redeem = Script::from(redeem_bytes);

            engine.execute(&redeem, &mut stack, flags, tx_context, SigVersion::Base)?;
            if !top_is_true(&stack) {
                return Err(eval_false("false stack entry at end of redeem script execution"));
            }

            if flags.has_flag(ScriptFlags::WITNESS) {
                if let Some((version, program)) = redeem.witness_program() {
                    had_witness = true;
                    let expected = Opcode::from_data(redeem.to_bytes()).to_bytes();
                    if script_sig.to_bytes() != expected.as_slice() {
                        return Err(InterpreterError::new(
                            InterpreterErrorCode::WitnessMalleatedP2sh,
                            "signature script must be exactly a push of the redeem script".to_string(),
                        ));
                    }
                    verify_witness_program(engine, witness, version, program, tx_context, flags)?;
                    stack.truncate(1);
                }
            }
        }
    }

    if flags.has_flag(ScriptFlags::CLEANSTACK) && stack.len() != 1 {
        return Err(InterpreterError::new(
            InterpreterErrorCode::CleanStack,
            format!("stack contains {} unexpected items", stack.len().saturating_sub(1)),
        ));
    }

    if flags.has_flag(ScriptFlags::WITNESS) && !had_witness && !witness.is_empty() {
        return Err(InterpreterError::new(
            InterpreterErrorCode::WitnessUnexpected,
            "witness supplied for a non-witness script".to_string(),
        ));
    }

    Ok(())
}

/// Run a witness program of the given version against its witness.
pub(crate) fn verify_witness_program(
    engine: &Engine,
    witness: &Witness,
    version: u8,
    program: &[u8],
    tx_context: Option<&dyn TxContext>,
    flags: ScriptFlags,
) -> Result<(), InterpreterError> {
    if version != 0 {
        log::debug!("witness program version {} treated as anyone-can-spend", version);
        if flags.has_flag(ScriptFlags::DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM) {
            return Err(InterpreterError::new(
                InterpreterErrorCode::DiscourageUpgradableWitnessProgram,
                format!("witness program version {} is reserved for upgrades", version),
            ));
        }
        return Ok(());
    }

    let (script, mut stack) = match program.len() {
        32 => {
            let Some((script_bytes, rest)) = witness.items().split_last() else {
                return Err(InterpreterError::new(
                    InterpreterErrorCode::WitnessProgramWitnessEmpty,
                    "witness program requires a non-empty witness".to_string(),
                ));
            };
            if hash::sha256(script_bytes)[..] != *program {
                return Err(InterpreterError::new(
                    InterpreterErrorCode::WitnessProgramMismatch,
                    "witness script does not match the program hash".to_string(),
                ));
            }
            log::debug!("executing v0 script-hash witness program");
            (Script::from_bytes(script_bytes), Stack::from_items(rest.to_vec()))
        }
        20 => {
            if witness.len() != 2 {
                return Err(InterpreterError::new(
                    InterpreterErrorCode::WitnessProgramMismatch,
                    format!("key-hash witness program requires 2 items, got {}", witness.len()),
                ));
            }
            log::debug!("executing v0 key-hash witness program");
            let mut script = Script::new();
            script
                .push_opcode(OP_DUP)
                .push_opcode(OP_HASH160)
                .push(&Opcode::from_data(program))
                .push_opcode(OP_EQUALVERIFY)
                .push_opcode(OP_CHECKSIG);
            (script, witness.to_stack())
        }
        n => {
            return Err(InterpreterError::new(
                InterpreterErrorCode::WitnessProgramWrongLength,
                format!("version 0 witness program has invalid length {}", n),
            ))
        }
    };

    let max = engine.config().max_element_size;
    if let Some(item) = stack.items().iter().find(|item| item.len() > max) {
        return Err(InterpreterError::new(
            InterpreterErrorCode::PushSize,
            format!("witness item of {} bytes exceeds max allowed size {}", item.len(), max),
        ));
    }

    engine.execute(&script, &mut stack, flags, tx_context, SigVersion::WitnessV0)?;

    if stack.len() != 1 || !top_is_true(&stack) {
        return Err(eval_false("witness program must leave exactly one true item"));
    }
    Ok(())
}
