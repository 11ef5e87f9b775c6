//! Interpreter limits and policy knobs.

use serde::{Deserialize, Serialize};

pub const MAX_OPS_PER_SCRIPT: usize = 201;
pub const MAX_STACK_SIZE: usize = 1000;
pub const MAX_SCRIPT_SIZE: usize = 10000;
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;
pub const MAX_SCRIPT_NUMBER_LENGTH: usize = 4;
pub const MAX_PUB_KEYS_PER_MULTISIG: usize = 20;

/// Width used by CHECKLOCKTIMEVERIFY and CHECKSEQUENCEVERIFY operands.
pub const LOCKTIME_NUMBER_LENGTH: usize = 5;

/// When a disabled opcode (OP_CAT, OP_MUL, ...) triggers a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisabledOpcodePolicy {
    /// Fail as soon as the opcode is seen, even inside an untaken branch.
    #[default]
    Always,
    /// Fail only when the opcode sits in an executing branch.
    ExecutedOnly,
}

/// Script configuration limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub max_ops: usize,
    pub max_stack_size: usize,
    pub max_script_size: usize,
    pub max_element_size: usize,
    pub max_num_size: usize,
    pub max_pubkeys_per_multisig: usize,
    pub disabled_opcode_policy: DisabledOpcodePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_ops: MAX_OPS_PER_SCRIPT,
            max_stack_size: MAX_STACK_SIZE,
            max_script_size: MAX_SCRIPT_SIZE,
            max_element_size: MAX_SCRIPT_ELEMENT_SIZE,
            max_num_size: MAX_SCRIPT_NUMBER_LENGTH,
            max_pubkeys_per_multisig: MAX_PUB_KEYS_PER_MULTISIG,
            disabled_opcode_policy: DisabledOpcodePolicy::Always,
        }
    }
}

impl Config {
    /// Default limits with a different disabled-opcode policy.
    pub fn with_disabled_opcode_policy(policy: DisabledOpcodePolicy) -> Self {
        Config { disabled_opcode_policy: policy, ..Config::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let cfg: Config = serde_json::from_str(r#"{"max_ops": 50, "disabled_opcode_policy": "executed_only"}"#).unwrap();
        assert_eq!(cfg.max_ops, 50);
        assert_eq!(cfg.max_stack_size, MAX_STACK_SIZE);
        assert_eq!(cfg.disabled_opcode_policy, DisabledOpcodePolicy::ExecutedOnly);
    }
}
