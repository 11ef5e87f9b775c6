/// Script type: raw bytes decoded on demand into opcodes.
///
/// Scripts appear in inputs (scriptSig), outputs (scriptPubKey) and witness
/// programs. The raw bytes are authoritative; `opcodes()` decodes them
/// leniently so that pattern detectors work on malformed scripts too.

use std::fmt;

use crate::critical_data::CriticalData;
use crate::opcode::Opcode;
use crate::opcodes::*;
use crate::ScriptError;

/// Magic bytes that open a critical hash commitment.
pub const CRITICAL_HASH_MAGIC: [u8; 4] = [0xd1, 0x61, 0x73, 0x68];

/// Largest standard null-data output script.
pub const MAX_NULLDATA_SIZE: usize = 83;

/// A script, represented as a byte vector newtype.
#[derive(Clone, PartialEq, Eq)]
pub struct Script(Vec<u8>);

impl Script {
    // -----------------------------------------------------------------------
    // Constructors
    // -----------------------------------------------------------------------

    /// Create a new empty script.
    pub fn new() -> Self {
        Script(Vec::new())
    }

    /// Create a script from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Script(bytes.to_vec())
    }

    /// Create a script from a hex-encoded string.
    ///
    /// # Arguments
    /// * `hex_str` - A hex string (e.g. "a914...87").
    ///
    /// # Returns
    /// A `Script` wrapping the decoded bytes, or an error if the hex is invalid.
    pub fn from_hex(hex_str: &str) -> Result<Self, ScriptError> {
        let bytes = hex::decode(hex_str).map_err(|e| ScriptError::InvalidHex(e.to_string()))?;
        Ok(Script(bytes))
    }

    /// Serialize a sequence of opcodes into a script.
    pub fn from_opcodes<'a, I>(ops: I) -> Self
    where
        I: IntoIterator<Item = &'a Opcode>,
    {
        let mut script = Script::new();
        for op in ops {
            script.push(op);
        }
        script
    }

    /// Parse the whitespace-separated text form used by script test fixtures.
    ///
    /// Tokens are decimal integers, `0x`-prefixed hex inserted verbatim,
    /// single-quoted strings pushed as data, or opcode mnemonics with or
    /// without the `OP_` prefix.
    pub fn from_string(text: &str) -> Result<Self, ScriptError> {
        let mut script = Script::new();
        for token in text.split_whitespace() {
            if is_decimal(token) {
                script.push_int(parse_int_token(token)?);
            } else if let Some(hex_str) = token.strip_prefix("0x") {
                if hex_str.is_empty() {
                    return Err(ScriptError::InvalidToken(token.to_string()));
                }
                let raw = hex::decode(hex_str)
                    .map_err(|_| ScriptError::InvalidToken(token.to_string()))?;
                script.0.extend_from_slice(&raw);
            } else if token.len() >= 2 && token.starts_with('\'') && token.ends_with('\'') {
                let text = &token[1..token.len() - 1];
                script.push(&Opcode::from_data(text.as_bytes()));
            } else {
                let op = Opcode::from_symbol(token)
                    .map_err(|_| ScriptError::InvalidToken(token.to_string()))?;
                script.push(&op);
            }
        }
        Ok(script)
    }

    // -----------------------------------------------------------------------
    // Builder
    // -----------------------------------------------------------------------

    /// Append an encoded opcode.
    pub fn push(&mut self, op: &Opcode) -> &mut Self {
        self.0.extend_from_slice(&op.to_bytes());
        self
    }

    /// Append a bare opcode byte.
    pub fn push_opcode(&mut self, value: u8) -> &mut Self {
        self.0.push(value);
        self
    }

    /// Append the smallest push of `data`.
    pub fn push_data(&mut self, data: &[u8]) -> &mut Self {
        self.push(&Opcode::from_push(data))
    }

    /// Append a push of the integer `n`.
    pub fn push_int(&mut self, n: i64) -> &mut Self {
        self.push(&Opcode::from_int(n))
    }

    // -----------------------------------------------------------------------
    // Accessors & serialization
    // -----------------------------------------------------------------------

    /// Return a reference to the underlying bytes.
    pub fn to_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume the script and return its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Encode the script as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Length of the script in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the script has no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode every opcode. A cut-short trailing push becomes a truncated
    /// opcode instead of an error.
    pub fn opcodes(&self) -> Vec<Opcode> {
        let mut ops = Vec::new();
        let mut pos = 0;
        while pos < self.0.len() {
            ops.push(Opcode::decode_lenient(&self.0, &mut pos));
        }
        ops
    }

    /// Decode every opcode together with the byte offset just past it.
    pub(crate) fn opcodes_with_offsets(&self) -> Vec<(Opcode, usize)> {
        let mut ops = Vec::new();
        let mut pos = 0;
        while pos < self.0.len() {
            let op = Opcode::decode_lenient(&self.0, &mut pos);
            ops.push((op, pos));
        }
        ops
    }

    /// The script from byte offset `start` to the end.
    pub fn subscript(&self, start: usize) -> Script {
        Script(self.0.get(start..).unwrap_or_default().to_vec())
    }

    /// Render the script as space-separated ASM tokens.
    pub fn to_asm(&self) -> String {
        self.opcodes()
            .iter()
            .map(Opcode::to_asm)
            .collect::<Vec<_>>()
            .join(" ")
    }

    // -----------------------------------------------------------------------
    // Pattern detection
    // -----------------------------------------------------------------------

    /// `OP_HASH160 <20 bytes> OP_EQUAL`.
    pub fn is_scripthash(&self) -> bool {
        let b = &self.0;
        b.len() == 23 && b[0] == OP_HASH160 && b[1] == OP_DATA_20 && b[22] == OP_EQUAL
    }

    /// `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG`.
    pub fn is_pubkeyhash(&self) -> bool {
        let b = &self.0;
        b.len() == 25
            && b[0] == OP_DUP
            && b[1] == OP_HASH160
            && b[2] == OP_DATA_20
            && b[23] == OP_EQUALVERIFY
            && b[24] == OP_CHECKSIG
    }

    /// The 20-byte hash of a pay-to-script-hash output.
    pub fn script_hash(&self) -> Option<&[u8]> {
        self.is_scripthash().then(|| &self.0[2..22])
    }

    /// OP_RETURN followed only by well-formed pushes and small integers.
    pub fn is_nulldata(&self) -> bool {
        if self.0.first() != Some(&OP_RETURN) {
            return false;
        }
        self.opcodes()
            .iter()
            .skip(1)
            .all(|op| !op.truncated && op.value <= OP_16)
    }

    /// A null-data script that relay policy accepts: minimal pushes and at
    /// most 83 bytes.
    pub fn is_standard_nulldata(&self) -> bool {
        self.0.len() <= MAX_NULLDATA_SIZE
            && self.is_nulldata()
            && self.opcodes().iter().all(Opcode::is_minimal)
    }

    /// `OP_RETURN <36-byte push: d1617368 + 32-byte hash>` optionally followed
    /// by a request blob.
    pub fn is_critical_hash_commit(&self) -> bool {
        let b = &self.0;
        b.len() >= 38 && b[0] == OP_RETURN && b[1] == 0x24 && b[2..6] == CRITICAL_HASH_MAGIC
    }

    /// Extract the critical data of a critical hash commitment.
    ///
    /// Returns `None` when the script is not a commitment or the trailing
    /// request blob is too short to form a record.
    pub fn get_critical_data(&self) -> Option<CriticalData> {
        if !self.is_critical_hash_commit() {
            return None;
        }
        CriticalData::new(self.0[38..].to_vec(), &self.0[6..38]).ok()
    }

    /// True when every opcode is a push or small integer (OP_RESERVED
    /// included) and no push is cut short.
    pub fn is_push_only(&self) -> bool {
        self.opcodes().iter().all(|op| !op.truncated && op.value <= OP_16)
    }

    /// A version opcode followed by a single 2..=40 byte direct push.
    pub fn is_witness_program(&self) -> bool {
        let b = &self.0;
        if b.len() < 4 || b.len() > 42 {
            return false;
        }
        if b[0] != OP_0 && !(OP_1..=OP_16).contains(&b[0]) {
            return false;
        }
        b[1] as usize + 2 == b.len()
    }

    /// Witness version and program bytes.
    pub fn witness_program(&self) -> Option<(u8, &[u8])> {
        if !self.is_witness_program() {
            return None;
        }
        let version = if self.0[0] == OP_0 { 0 } else { self.0[0] - OP_1 + 1 };
        Some((version, &self.0[2..]))
    }

    /// Count legacy signature operations.
    ///
    /// With `accurate`, a multisig preceded by OP_1..OP_16 counts that many
    /// keys instead of the 20-key maximum.
    pub fn sigops(&self, accurate: bool) -> usize {
        let mut total = 0;
        let mut last = OP_INVALIDOPCODE;
        for op in self.opcodes() {
            if op.truncated {
                break;
            }
            match op.value {
                OP_CHECKSIG | OP_CHECKSIGVERIFY => total += 1,
                OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
                    if accurate && (OP_1..=OP_16).contains(&last) {
                        total += (last - OP_1 + 1) as usize;
                    } else {
                        total += 20;
                    }
                }
                _ => {}
            }
            last = op.value;
        }
        total
    }

    // -----------------------------------------------------------------------
    // Script code editing
    // -----------------------------------------------------------------------

    /// Remove every opcode-aligned occurrence of the serialized `needle`.
    ///
    /// Matching only starts at opcode boundaries, but a match may span
    /// several opcodes and back-to-back matches are all removed.
    ///
    /// # Returns
    /// The number of occurrences removed.
    pub fn find_and_delete(&mut self, needle: &[u8]) -> usize {
        if needle.is_empty() {
            return 0;
        }
        let raw = &self.0;
        let mut result = Vec::with_capacity(raw.len());
        let mut found = 0;
        let mut pc = 0;
        let mut kept_from = 0;
        loop {
            result.extend_from_slice(&raw[kept_from..pc]);
            while raw.len() - pc >= needle.len() && raw[pc..pc + needle.len()] == *needle {
                pc += needle.len();
                found += 1;
            }
            kept_from = pc;
            if pc >= raw.len() {
                break;
            }
            let mut next = pc;
            if Opcode::decode_lenient(raw, &mut next).truncated {
                break;
            }
            pc = next;
        }
        if found > 0 {
            result.extend_from_slice(&raw[kept_from..]);
            self.0 = result;
        }
        found
    }
}

/// Decimal tokens outside this magnitude are rejected by the text parsers.
const MAX_TOKEN_INT: i64 = 0xffff_ffff;

pub(crate) fn parse_int_token(token: &str) -> Result<i64, ScriptError> {
    token
        .parse::<i64>()
        .ok()
        .filter(|n| (-MAX_TOKEN_INT..=MAX_TOKEN_INT).contains(n))
        .ok_or_else(|| ScriptError::InvalidToken(token.to_string()))
}

pub(crate) fn is_decimal(token: &str) -> bool {
    let digits = token.strip_prefix('-').unwrap_or(token);
    !digits.is_empty() && digits.bytes().all(|c| c.is_ascii_digit())
}

impl Default for Script {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<u8>> for Script {
    fn from(bytes: Vec<u8>) -> Self {
        Script(bytes)
    }
}

impl fmt::Display for Script {
    /// Display the script as a lowercase hex string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", self.to_hex())
    }
}

impl serde::Serialize for Script {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> serde::Deserialize<'de> for Script {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Script::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::critical_data::BmmRequest;

    const CRITICAL_COMMIT: &str = "6a24d16173684273f4fda0dee0a38edd067d5c7deea527e627e8b59f98595cee1545fcc3824300bf00010100";

    fn script(hex_str: &str) -> Script {
        Script::from_hex(hex_str).expect("valid hex should parse")
    }

    // -----------------------------------------------------------------------
    // Detectors
    // -----------------------------------------------------------------------

    #[test]
    fn test_is_scripthash() {
        let s = script("a91419a7d869032368fd1f1e26e5e73a4ad0e474960e87");
        assert!(s.is_scripthash());
        assert_eq!(hex::encode(s.script_hash().unwrap()), "19a7d869032368fd1f1e26e5e73a4ad0e474960e");
        assert!(!script("a91419a7d869032368fd1f1e26e5e73a4ad0e474960e88").is_scripthash());
        assert!(!script("a91419a7d869032368fd1f1e26e5e73a4ad0e474960e8700").is_scripthash());
    }

    #[test]
    fn test_is_nulldata() {
        let s = script(
            "6a28590c080112220a1b353930632e6f7267282a5f5e294f7665726c6179404f7261636c65103b1a010c",
        );
        assert!(s.is_nulldata());
        assert!(s.is_standard_nulldata());
        assert!(script("6a").is_nulldata());
        assert!(script("6a0051").is_nulldata());
        assert!(!script("6a76").is_nulldata());
        assert!(!script("6a05aabb").is_nulldata());
        assert!(!script("76a914").is_nulldata());
    }

    #[test]
    fn test_standard_nulldata_size_and_minimality() {
        let mut s = Script::new();
        s.push_opcode(OP_RETURN).push(&Opcode::from_data(&[0xaa; 80]));
        assert_eq!(s.len(), 83);
        assert!(s.is_standard_nulldata());

        let mut s = Script::new();
        s.push_opcode(OP_RETURN).push(&Opcode::from_data(&[0xaa; 81]));
        assert!(s.is_nulldata());
        assert!(!s.is_standard_nulldata());

        assert!(!script("6a0105").is_standard_nulldata());
    }

    #[test]
    fn test_critical_hash_commit() {
        let s = script(CRITICAL_COMMIT);
        assert!(s.is_critical_hash_commit());
        // The blob after the commitment push does not parse as pushes.
        assert!(!s.is_nulldata());

        let cd = s.get_critical_data().unwrap();
        assert_eq!(
            hex::encode(cd.hash_critical()),
            "4273f4fda0dee0a38edd067d5c7deea527e627e8b59f98595cee1545fcc38243"
        );
        assert_eq!(hex::encode(cd.bytes()), "00bf00010100");
        assert_eq!(
            cd.bmm_request(),
            Some(BmmRequest { sidechain_number: 1, prev_block_ref: 1 })
        );
    }

    #[test]
    fn test_critical_hash_commit_negative() {
        // Wrong magic.
        let mut raw = hex::decode(CRITICAL_COMMIT).unwrap();
        raw[2] = 0xd2;
        assert!(!Script::from_bytes(&raw).is_critical_hash_commit());

        // Commitment push without any request blob.
        let s = script(&CRITICAL_COMMIT[..76]);
        assert!(s.is_critical_hash_commit());
        assert!(s.get_critical_data().is_none());

        // Too short.
        assert!(!script("6a24d1617368").is_critical_hash_commit());
        assert!(script("6a24d1617368").get_critical_data().is_none());
    }

    #[test]
    fn test_witness_program() {
        let s = script("0014751e76e8199196d454941c45d1b3a323f1433bd6");
        assert!(s.is_witness_program());
        let (version, program) = s.witness_program().unwrap();
        assert_eq!(version, 0);
        assert_eq!(program.len(), 20);

        let s = script("5102abcd");
        assert_eq!(s.witness_program(), Some((1, &[0xab, 0xcd][..])));

        assert!(!script("0001ab").is_witness_program());
        assert!(!script("4f02abcd").is_witness_program());
        assert!(!script("0003abcd").is_witness_program());
    }

    #[test]
    fn test_is_push_only() {
        assert!(script("").is_push_only());
        assert!(script("00514f50").is_push_only());
        assert!(script("4c02abcd").is_push_only());
        assert!(!script("0061").is_push_only());
        assert!(!script("02ab").is_push_only());
    }

    #[test]
    fn test_pubkeyhash() {
        assert!(script("76a914e2a623699e81b291c0327f408fea765d534baa2a88ac").is_pubkeyhash());
        assert!(!script("76a914e2a623699e81b291c0327f408fea765d534baa2a88ad").is_pubkeyhash());
    }

    #[test]
    fn test_sigops() {
        let s = Script::from_string("2 CHECKMULTISIG CHECKSIG").unwrap();
        assert_eq!(s.sigops(false), 21);
        assert_eq!(s.sigops(true), 3);
        assert_eq!(Script::from_string("CHECKSIGVERIFY 0x4c").unwrap().sigops(true), 1);
    }

    // -----------------------------------------------------------------------
    // Text form & ASM
    // -----------------------------------------------------------------------

    #[test]
    fn test_from_string() {
        let s = Script::from_string("0 -1 1 16 17 -2 1000").unwrap();
        assert_eq!(s.to_hex(), "004f51600111018202e803");

        let s = Script::from_string("DUP HASH160 0x14 0x89abcdefabbaabbaabbaabbaabbaabbaabbaabba EQUALVERIFY CHECKSIG").unwrap();
        assert_eq!(s.to_hex(), "76a91489abcdefabbaabbaabbaabbaabbaabbaabbaabba88ac");

        let s = Script::from_string("'Az' '' OP_NOP   NOP1\tnop10").unwrap();
        assert_eq!(s.to_hex(), "02417a0061b0b9");

        assert!(matches!(Script::from_string("0x"), Err(ScriptError::InvalidToken(_))));
        assert!(matches!(Script::from_string("0xabc"), Err(ScriptError::InvalidToken(_))));
        assert!(matches!(Script::from_string("FOO"), Err(ScriptError::InvalidToken(_))));
        assert!(Script::from_string("").unwrap().is_empty());
    }

    #[test]
    fn test_from_string_int_range() {
        let s = Script::from_string("4294967295 -4294967295").unwrap();
        assert_eq!(s.to_hex(), "05ffffffff0005ffffffff80");

        for token in ["4294967296", "-4294967296", "99999999999999999999"] {
            assert!(
                matches!(Script::from_string(token), Err(ScriptError::InvalidToken(t)) if t == token),
                "{}",
                token
            );
        }
    }

    #[test]
    fn test_to_asm() {
        let s = script("76a914e2a623699e81b291c0327f408fea765d534baa2a88ac");
        assert_eq!(
            s.to_asm(),
            "OP_DUP OP_HASH160 e2a623699e81b291c0327f408fea765d534baa2a OP_EQUALVERIFY OP_CHECKSIG"
        );
        assert_eq!(script("0005aabb").to_asm(), "OP_0 [error]");
    }

    #[test]
    fn test_opcodes_round_trip_bytes() {
        for hex_str in [CRITICAL_COMMIT, "4d0300aabb", "4c", "76a9"] {
            let s = script(hex_str);
            assert_eq!(Script::from_opcodes(&s.opcodes()), s, "{}", hex_str);
        }
    }

    #[test]
    fn test_builder() {
        let mut s = Script::new();
        s.push_int(2).push_data(&[0x03]).push_data(&[0xde, 0xad]).push_opcode(OP_ADD);
        assert_eq!(s.to_hex(), "525302dead93");
    }

    // -----------------------------------------------------------------------
    // FindAndDelete
    // -----------------------------------------------------------------------

    fn fad(script_hex: &str, needle_hex: &str) -> (String, usize) {
        let mut s = script(script_hex);
        let n = s.find_and_delete(&hex::decode(needle_hex).unwrap());
        (s.to_hex(), n)
    }

    #[test]
    fn test_find_and_delete() {
        assert_eq!(fad("0302ff030302ff03", "0302ff03"), (String::new(), 2));
        assert_eq!(fad("0302ff030302ff03", "02"), ("0302ff030302ff03".to_string(), 0));
        assert_eq!(fad("0302ff030302ff03", "ff"), ("0302ff030302ff03".to_string(), 0));
        // Matches must start on an opcode boundary.
        assert_eq!(fad("02feed5169", "feed51"), ("02feed5169".to_string(), 0));
        assert_eq!(fad("02feed5169", "02feed51"), ("69".to_string(), 1));
        assert_eq!(fad("516902feed5169", "feed51"), ("516902feed5169".to_string(), 0));
        assert_eq!(fad("516902feed5169", "02feed51"), ("516969".to_string(), 1));
        assert_eq!(fad("0003feed", "03feed"), ("00".to_string(), 1));
        assert_eq!(fad("0003feed", "00"), ("03feed".to_string(), 1));
        assert_eq!(fad("aa", ""), ("aa".to_string(), 0));
    }

    #[test]
    fn test_serde_hex() {
        let s = script("a91419a7d869032368fd1f1e26e5e73a4ad0e474960e87");
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, "\"a91419a7d869032368fd1f1e26e5e73a4ad0e474960e87\"");
        let back: Script = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
