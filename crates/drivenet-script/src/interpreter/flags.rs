//! Script verification flags (bitmask).
//!
//! Bit positions are fixed so that serialized flag sets line up with
//! other implementations' test fixtures.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use crate::ScriptError;

/// Script verification flags controlling interpreter behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScriptFlags(pub u32);

impl ScriptFlags {
    pub const NONE: ScriptFlags = ScriptFlags(0);
    pub const P2SH: ScriptFlags = ScriptFlags(1 << 0);
    pub const STRICTENC: ScriptFlags = ScriptFlags(1 << 1);
    pub const DERSIG: ScriptFlags = ScriptFlags(1 << 2);
    pub const LOW_S: ScriptFlags = ScriptFlags(1 << 3);
    pub const NULLDUMMY: ScriptFlags = ScriptFlags(1 << 4);
    pub const SIGPUSHONLY: ScriptFlags = ScriptFlags(1 << 5);
    pub const MINIMALDATA: ScriptFlags = ScriptFlags(1 << 6);
    pub const DISCOURAGE_UPGRADABLE_NOPS: ScriptFlags = ScriptFlags(1 << 7);
    pub const CLEANSTACK: ScriptFlags = ScriptFlags(1 << 8);
    pub const CHECKLOCKTIMEVERIFY: ScriptFlags = ScriptFlags(1 << 9);
    pub const CHECKSEQUENCEVERIFY: ScriptFlags = ScriptFlags(1 << 10);
    pub const WITNESS: ScriptFlags = ScriptFlags(1 << 11);
    pub const DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM: ScriptFlags = ScriptFlags(1 << 12);
    pub const MINIMALIF: ScriptFlags = ScriptFlags(1 << 13);
    pub const NULLFAIL: ScriptFlags = ScriptFlags(1 << 14);
    pub const WITNESS_PUBKEYTYPE: ScriptFlags = ScriptFlags(1 << 15);
    pub const CONST_SCRIPTCODE: ScriptFlags = ScriptFlags(1 << 16);

    /// Consensus rules every block must satisfy.
    pub const MANDATORY: ScriptFlags = ScriptFlags::P2SH;

    /// Relay policy: every rule except SIGPUSHONLY.
    pub const STANDARD: ScriptFlags = ScriptFlags(
        ScriptFlags::MANDATORY.0
            | ScriptFlags::STRICTENC.0
            | ScriptFlags::DERSIG.0
            | ScriptFlags::LOW_S.0
            | ScriptFlags::NULLDUMMY.0
            | ScriptFlags::MINIMALDATA.0
            | ScriptFlags::DISCOURAGE_UPGRADABLE_NOPS.0
            | ScriptFlags::CLEANSTACK.0
            | ScriptFlags::CHECKLOCKTIMEVERIFY.0
            | ScriptFlags::CHECKSEQUENCEVERIFY.0
            | ScriptFlags::WITNESS.0
            | ScriptFlags::DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM.0
            | ScriptFlags::MINIMALIF.0
            | ScriptFlags::NULLFAIL.0
            | ScriptFlags::WITNESS_PUBKEYTYPE.0
            | ScriptFlags::CONST_SCRIPTCODE.0,
    );

    /// Name table, in bit order.
    pub const NAMES: [(&'static str, ScriptFlags); 17] = [
        ("P2SH", ScriptFlags::P2SH),
        ("STRICTENC", ScriptFlags::STRICTENC),
        ("DERSIG", ScriptFlags::DERSIG),
        ("LOW_S", ScriptFlags::LOW_S),
        ("NULLDUMMY", ScriptFlags::NULLDUMMY),
        ("SIGPUSHONLY", ScriptFlags::SIGPUSHONLY),
        ("MINIMALDATA", ScriptFlags::MINIMALDATA),
        ("DISCOURAGE_UPGRADABLE_NOPS", ScriptFlags::DISCOURAGE_UPGRADABLE_NOPS),
        ("CLEANSTACK", ScriptFlags::CLEANSTACK),
        ("CHECKLOCKTIMEVERIFY", ScriptFlags::CHECKLOCKTIMEVERIFY),
        ("CHECKSEQUENCEVERIFY", ScriptFlags::CHECKSEQUENCEVERIFY),
        ("WITNESS", ScriptFlags::WITNESS),
        ("DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM", ScriptFlags::DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM),
        ("MINIMALIF", ScriptFlags::MINIMALIF),
        ("NULLFAIL", ScriptFlags::NULLFAIL),
        ("WITNESS_PUBKEYTYPE", ScriptFlags::WITNESS_PUBKEYTYPE),
        ("CONST_SCRIPTCODE", ScriptFlags::CONST_SCRIPTCODE),
    ];

    pub fn has_flag(self, flag: ScriptFlags) -> bool {
        self.0 & flag.0 == flag.0
    }

    pub fn has_any(self, flags: &[ScriptFlags]) -> bool {
        flags.iter().any(|f| self.has_flag(*f))
    }

    pub fn add_flag(&mut self, flag: ScriptFlags) {
        self.0 |= flag.0;
    }

    /// Look up a single rule by name, with or without the `VERIFY_` prefix.
    pub fn from_name(name: &str) -> Result<ScriptFlags, ScriptError> {
        let bare = name.strip_prefix("VERIFY_").unwrap_or(name);
        if bare == "NONE" {
            return Ok(ScriptFlags::NONE);
        }
        Self::NAMES
            .iter()
            .find(|(n, _)| *n == bare)
            .map(|(_, f)| *f)
            .ok_or_else(|| ScriptError::UnknownFlag(name.to_string()))
    }

    /// Fold a comma-separated list of rule names into one mask.
    ///
    /// Empty entries are ignored, so `""` parses to `NONE`.
    pub fn parse_names(list: &str) -> Result<ScriptFlags, ScriptError> {
        let mut flags = ScriptFlags::NONE;
        for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            flags |= Self::from_name(name)?;
        }
        Ok(flags)
    }

    /// Names of every set bit, in bit order.
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(_, f)| self.has_flag(*f))
            .map(|(n, _)| *n)
            .collect()
    }
}

impl fmt::Display for ScriptFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "NONE");
        }
        write!(f, "{}", self.names().join(","))
    }
}

impl BitOr for ScriptFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        ScriptFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ScriptFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ScriptFlags {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        ScriptFlags(self.0 & rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_positions() {
        for (i, (_, flag)) in ScriptFlags::NAMES.iter().enumerate() {
            assert_eq!(flag.0, 1 << i);
        }
        assert_eq!(ScriptFlags::MANDATORY, ScriptFlags::P2SH);
        assert!(!ScriptFlags::STANDARD.has_flag(ScriptFlags::SIGPUSHONLY));
        assert_eq!(ScriptFlags::STANDARD.0 | ScriptFlags::SIGPUSHONLY.0, (1 << 17) - 1);
    }

    #[test]
    fn test_parse_names() {
        let flags = ScriptFlags::parse_names("P2SH,STRICTENC").unwrap();
        assert_eq!(flags, ScriptFlags::P2SH | ScriptFlags::STRICTENC);
        assert_eq!(ScriptFlags::parse_names("").unwrap(), ScriptFlags::NONE);
        assert_eq!(ScriptFlags::parse_names("NONE").unwrap(), ScriptFlags::NONE);
        assert_eq!(
            ScriptFlags::from_name("VERIFY_MINIMALIF").unwrap(),
            ScriptFlags::MINIMALIF
        );
        for (name, flag) in ScriptFlags::NAMES {
            assert_eq!(ScriptFlags::from_name(name).unwrap(), flag);
        }
    }

    #[test]
    fn test_unknown_flag() {
        let err = ScriptFlags::parse_names("P2SH,BOGUS").unwrap_err();
        assert!(matches!(err, ScriptError::UnknownFlag(ref n) if n == "BOGUS"));
    }

    #[test]
    fn test_display_and_serde() {
        let flags = ScriptFlags::P2SH | ScriptFlags::WITNESS;
        assert_eq!(flags.to_string(), "P2SH,WITNESS");
        assert_eq!(ScriptFlags::parse_names(&flags.to_string()).unwrap(), flags);
        let json = serde_json::to_string(&flags).unwrap();
        assert_eq!(json, "2049");
        let back: ScriptFlags = serde_json::from_str(&json).unwrap();
        assert_eq!(back, flags);
    }
}
