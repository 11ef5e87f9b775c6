//! A single decoded script instruction.
//!
//! An `Opcode` is the opcode byte plus, for push opcodes, the pushed bytes.
//! Pushes that run past the end of the script decode leniently into a
//! *truncated* opcode so that scripts with garbage tails can still be
//! inspected and re-serialized byte for byte.

use std::fmt;

use drivenet_primitives::util::{ByteReader, ByteWriter};

use crate::interpreter::scriptnum::ScriptNum;
use crate::opcodes::*;
use crate::ScriptError;

/// Push encoding to use when building a data push explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushEncoding {
    /// Opcode byte is the length (0..=75).
    Direct,
    /// OP_PUSHDATA1 with a 1-byte length.
    PushData1,
    /// OP_PUSHDATA2 with a 2-byte little-endian length.
    PushData2,
    /// OP_PUSHDATA4 with a 4-byte little-endian length.
    PushData4,
}

/// A single script instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opcode {
    /// The opcode byte. For direct pushes this is the data length.
    pub value: u8,
    /// Pushed bytes. For a truncated push, the raw bytes that followed the
    /// opcode byte.
    pub data: Vec<u8>,
    /// Set when the push ran out of script bytes.
    pub truncated: bool,
}

impl Opcode {
    // -----------------------------------------------------------------------
    // Constructors
    // -----------------------------------------------------------------------

    /// Create a non-push opcode (or an empty push for `OP_0`).
    pub fn from_op(value: u8) -> Self {
        Opcode { value, data: Vec::new(), truncated: false }
    }

    /// Create the opcode that pushes `n`.
    ///
    /// -1 and 0..=16 use their dedicated opcodes; anything else is a push of
    /// the minimal script-number encoding.
    pub fn from_int(n: i64) -> Self {
        match n {
            -1 => Opcode::from_op(OP_1NEGATE),
            0 => Opcode::from_op(OP_0),
            1..=16 => Opcode::from_op(OP_1 + (n as u8) - 1),
            _ => Opcode::from_data(&ScriptNum::new(n).to_bytes()),
        }
    }

    /// Resolve a mnemonic such as `OP_CHECKSIG` or `checksig`.
    pub fn from_symbol(name: &str) -> Result<Self, ScriptError> {
        string_to_opcode(name)
            .map(Opcode::from_op)
            .ok_or_else(|| ScriptError::UnknownOpcode(name.to_string()))
    }

    /// Build the smallest push for `data`.
    ///
    /// Empty data becomes OP_0, a single byte 1..=16 becomes OP_1..OP_16 and
    /// `0x81` becomes OP_1NEGATE. Everything else is length based.
    pub fn from_push(data: &[u8]) -> Self {
        match data {
            [] => Opcode::from_op(OP_0),
            [b @ 1..=16] => Opcode::from_op(OP_1 + b - 1),
            [0x81] => Opcode::from_op(OP_1NEGATE),
            _ => Opcode::from_data(data),
        }
    }

    /// Build a direct or PUSHDATA push chosen by length alone.
    pub fn from_data(data: &[u8]) -> Self {
        let value = match data.len() {
            0..=75 => data.len() as u8,
            76..=0xff => OP_PUSHDATA1,
            0x100..=0xffff => OP_PUSHDATA2,
            _ => OP_PUSHDATA4,
        };
        Opcode { value, data: data.to_vec(), truncated: false }
    }

    /// Build a push with an explicit encoding, possibly non-minimal.
    ///
    /// Fails with `DataTooBig` when the data does not fit the encoding.
    pub fn from_data_with(data: &[u8], encoding: PushEncoding) -> Result<Self, ScriptError> {
        let (value, max) = match encoding {
            PushEncoding::Direct => (data.len() as u8, 75),
            PushEncoding::PushData1 => (OP_PUSHDATA1, 0xff),
            PushEncoding::PushData2 => (OP_PUSHDATA2, 0xffff),
            PushEncoding::PushData4 => (OP_PUSHDATA4, u32::MAX as usize),
        };
        if data.len() > max {
            return Err(ScriptError::DataTooBig);
        }
        Ok(Opcode { value, data: data.to_vec(), truncated: false })
    }

    // -----------------------------------------------------------------------
    // Decoding
    // -----------------------------------------------------------------------

    /// Read one opcode from the cursor.
    ///
    /// Fails with `DataTooSmall` when a push length or payload is cut short.
    pub fn read(reader: &mut ByteReader<'_>) -> Result<Self, ScriptError> {
        let value = reader.read_u8()?;
        let len = match value {
            1..=75 => value as usize,
            OP_PUSHDATA1 => reader.read_u8().map_err(|_| ScriptError::DataTooSmall)? as usize,
            OP_PUSHDATA2 => {
                reader.read_u16_le().map_err(|_| ScriptError::DataTooSmall)? as usize
            }
            OP_PUSHDATA4 => {
                reader.read_u32_le().map_err(|_| ScriptError::DataTooSmall)? as usize
            }
            _ => return Ok(Opcode::from_op(value)),
        };
        let data = reader.read_bytes(len).map_err(|_| ScriptError::DataTooSmall)?;
        Ok(Opcode { value, data: data.to_vec(), truncated: false })
    }

    /// Decode the opcode starting at `*pos`, never failing.
    ///
    /// A cut-short push swallows the rest of the script as a truncated
    /// opcode. `*pos` is advanced past whatever was consumed.
    pub(crate) fn decode_lenient(bytes: &[u8], pos: &mut usize) -> Self {
        let rest = &bytes[*pos..];
        let mut reader = ByteReader::new(rest);
        match Opcode::read(&mut reader) {
            Ok(op) => {
                *pos += reader.position();
                op
            }
            Err(_) => {
                *pos = bytes.len();
                Opcode { value: rest[0], data: rest[1..].to_vec(), truncated: true }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Encoding
    // -----------------------------------------------------------------------

    /// Serialize the opcode.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(self.size());
        self.write(&mut w);
        w.into_bytes()
    }

    /// Append the serialized opcode to a writer.
    pub fn write(&self, w: &mut ByteWriter) {
        w.write_u8(self.value);
        if self.truncated {
            w.write_bytes(&self.data);
            return;
        }
        match self.value {
            OP_PUSHDATA1 => w.write_u8(self.data.len() as u8),
            OP_PUSHDATA2 => w.write_u16_le(self.data.len() as u16),
            OP_PUSHDATA4 => w.write_u32_le(self.data.len() as u32),
            _ => {}
        }
        if self.value <= OP_PUSHDATA4 {
            w.write_bytes(&self.data);
        }
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> usize {
        let prefix = match self.value {
            _ if self.truncated => 0,
            OP_PUSHDATA1 => 1,
            OP_PUSHDATA2 => 2,
            OP_PUSHDATA4 => 4,
            _ => 0,
        };
        let data = if self.truncated || self.value <= OP_PUSHDATA4 { self.data.len() } else { 0 };
        1 + prefix + data
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// True for OP_0, direct pushes and the PUSHDATA opcodes.
    pub fn is_push(&self) -> bool {
        self.value <= OP_PUSHDATA4
    }

    /// True for OP_0, OP_1NEGATE and OP_1..OP_16.
    pub fn is_small_int(&self) -> bool {
        self.value == OP_0 || self.value == OP_1NEGATE || (OP_1..=OP_16).contains(&self.value)
    }

    /// Value of a small-int opcode.
    pub fn to_num(&self) -> Option<i64> {
        match self.value {
            OP_0 => Some(0),
            OP_1NEGATE => Some(-1),
            OP_1..=OP_16 => Some((self.value - OP_1) as i64 + 1),
            _ => None,
        }
    }

    /// Whether a push uses the smallest possible encoding for its data.
    ///
    /// Non-push opcodes are always minimal.
    pub fn is_minimal(&self) -> bool {
        if !self.is_push() {
            return true;
        }
        let len = self.data.len();
        match self.data.as_slice() {
            [] => self.value == OP_0,
            [b @ 1..=16] => self.value == OP_1 + b - 1,
            [0x81] => self.value == OP_1NEGATE,
            _ if len <= 75 => self.value as usize == len,
            _ if len <= 0xff => self.value == OP_PUSHDATA1,
            _ if len <= 0xffff => self.value == OP_PUSHDATA2,
            _ => true,
        }
    }

    /// Opcodes that fail whenever they are encountered.
    pub fn is_disabled(&self) -> bool {
        matches!(
            self.value,
            OP_CAT
                | OP_SUBSTR
                | OP_LEFT
                | OP_RIGHT
                | OP_INVERT
                | OP_AND
                | OP_OR
                | OP_XOR
                | OP_2MUL
                | OP_2DIV
                | OP_MUL
                | OP_DIV
                | OP_MOD
                | OP_LSHIFT
                | OP_RSHIFT
        )
    }

    /// Mnemonic of the opcode byte.
    pub fn name(&self) -> &'static str {
        opcode_to_string(self.value)
    }

    /// ASM token: hex for data pushes, the mnemonic otherwise.
    pub fn to_asm(&self) -> String {
        if self.truncated {
            return "[error]".to_string();
        }
        if self.value > OP_0 && self.value <= OP_PUSHDATA4 {
            return hex::encode(&self.data);
        }
        self.name().to_string()
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_asm())
    }
}
