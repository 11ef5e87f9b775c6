//! Interpreter error types.
//!
//! Every rejection carries a closed `InterpreterErrorCode`; `as_str`
//! yields the stable code string shared with other implementations'
//! fixtures (`EVAL_FALSE`, `SIG_DER`, ...).

use std::fmt;

/// Error codes for the script interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterpreterErrorCode {
    Underflow,
    AltUnderflow,
    BadOpcode,
    DisabledOpcode,
    UnbalancedConditional,
    OpCountExceeded,
    EvalFalse,
    OpReturn,
    ScriptSize,
    PushSize,
    StackSize,
    SigCount,
    PubkeyCount,
    Verify,
    EqualVerify,
    CheckMultisigVerify,
    CheckSigVerify,
    NumEqualVerify,
    NegativeLocktime,
    UnsatisfiedLocktime,
    SigHashType,
    SigDer,
    MinimalData,
    SigPushOnly,
    SigHighS,
    SigNullDummy,
    PubkeyType,
    CleanStack,
    MinimalIf,
    NullFail,
    DiscourageUpgradableNops,
    DiscourageUpgradableWitnessProgram,
    WitnessProgramWrongLength,
    WitnessProgramWitnessEmpty,
    WitnessProgramMismatch,
    WitnessMalleated,
    WitnessMalleatedP2sh,
    WitnessUnexpected,
    WitnessPubkeyType,
    OpCodeSeparator,
    SigFindAndDelete,
    ScriptNumError,
}

impl InterpreterErrorCode {
    /// Stable code string.
    pub fn as_str(self) -> &'static str {
        use InterpreterErrorCode::*;
        match self {
            Underflow => "INVALID_STACK_OPERATION",
            AltUnderflow => "INVALID_ALTSTACK_OPERATION",
            BadOpcode => "BAD_OPCODE",
            DisabledOpcode => "DISABLED_OPCODE",
            UnbalancedConditional => "UNBALANCED_CONDITIONAL",
            OpCountExceeded => "OP_COUNT",
            EvalFalse => "EVAL_FALSE",
            OpReturn => "OP_RETURN",
            ScriptSize => "SCRIPT_SIZE",
            PushSize => "PUSH_SIZE",
            StackSize => "STACK_SIZE",
            SigCount => "SIG_COUNT",
            PubkeyCount => "PUBKEY_COUNT",
            Verify => "VERIFY",
            EqualVerify => "EQUALVERIFY",
            CheckMultisigVerify => "CHECKMULTISIGVERIFY",
            CheckSigVerify => "CHECKSIGVERIFY",
            NumEqualVerify => "NUMEQUALVERIFY",
            NegativeLocktime => "NEGATIVE_LOCKTIME",
            UnsatisfiedLocktime => "UNSATISFIED_LOCKTIME",
            SigHashType => "SIG_HASHTYPE",
            SigDer => "SIG_DER",
            MinimalData => "MINIMALDATA",
            SigPushOnly => "SIG_PUSHONLY",
            SigHighS => "SIG_HIGH_S",
            SigNullDummy => "SIG_NULLDUMMY",
            PubkeyType => "PUBKEYTYPE",
            CleanStack => "CLEANSTACK",
            MinimalIf => "MINIMALIF",
            NullFail => "NULLFAIL",
            DiscourageUpgradableNops => "DISCOURAGE_UPGRADABLE_NOPS",
            DiscourageUpgradableWitnessProgram => "DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM",
            WitnessProgramWrongLength => "WITNESS_PROGRAM_WRONG_LENGTH",
            WitnessProgramWitnessEmpty => "WITNESS_PROGRAM_WITNESS_EMPTY",
            WitnessProgramMismatch => "WITNESS_PROGRAM_MISMATCH",
            WitnessMalleated => "WITNESS_MALLEATED",
            WitnessMalleatedP2sh => "WITNESS_MALLEATED_P2SH",
            WitnessUnexpected => "WITNESS_UNEXPECTED",
            WitnessPubkeyType => "WITNESS_PUBKEYTYPE",
            OpCodeSeparator => "OP_CODESEPARATOR",
            SigFindAndDelete => "SIG_FINDANDDELETE",
            ScriptNumError => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for InterpreterErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A script interpreter error with an error code and description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterError {
    pub code: InterpreterErrorCode,
    pub description: String,
}

impl InterpreterError {
    pub fn new(code: InterpreterErrorCode, description: String) -> Self {
        InterpreterError { code, description }
    }

    /// Stable code string of this error.
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }
}

impl fmt::Display for InterpreterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.description)
    }
}

impl std::error::Error for InterpreterError {}

/// Check if an error has a specific error code.
pub fn is_error_code(err: &InterpreterError, code: InterpreterErrorCode) -> bool {
    err.code == code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_strings() {
        assert_eq!(InterpreterErrorCode::Underflow.as_str(), "INVALID_STACK_OPERATION");
        assert_eq!(InterpreterErrorCode::OpCountExceeded.as_str(), "OP_COUNT");
        assert_eq!(InterpreterErrorCode::ScriptNumError.as_str(), "UNKNOWN_ERROR");
        let err = InterpreterError::new(InterpreterErrorCode::EvalFalse, "false stack entry at end of script execution".into());
        assert_eq!(err.code_str(), "EVAL_FALSE");
        assert!(err.to_string().starts_with("EVAL_FALSE: "));
        assert!(is_error_code(&err, InterpreterErrorCode::EvalFalse));
    }
}
