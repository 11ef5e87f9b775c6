//! Segregated witness stack attached to a transaction input.

use std::fmt;

use drivenet_primitives::util::{ByteReader, ByteWriter, VarInt};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::interpreter::scriptnum::ScriptNum;
use crate::interpreter::stack::Stack;
use crate::script::{is_decimal, parse_int_token};
use crate::ScriptError;

/// Ordered witness items, bottom of the stack first.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Witness(Vec<Vec<u8>>);

impl Witness {
    pub fn new() -> Self {
        Witness(Vec::new())
    }

    pub fn from_items(items: Vec<Vec<u8>>) -> Self {
        Witness(items)
    }

    /// Build a witness from hex-encoded items, as found in test fixtures.
    pub fn from_hex_items<S: AsRef<str>>(items: &[S]) -> Result<Self, ScriptError> {
        items
            .iter()
            .map(|s| hex::decode(s.as_ref()).map_err(ScriptError::from))
            .collect::<Result<Vec<_>, _>>()
            .map(Witness)
    }

    /// Parse a whitespace-separated item list.
    ///
    /// Decimal tokens become minimally encoded numbers (so `0` is the empty
    /// item), `0x` tokens are raw bytes and quoted tokens are their text.
    pub fn from_string(text: &str) -> Result<Self, ScriptError> {
        text.split_whitespace().map(parse_item).collect::<Result<Vec<_>, _>>().map(Witness)
    }

    pub fn items(&self) -> &[Vec<u8>] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, item: Vec<u8>) {
        self.0.push(item);
    }

    /// Copy the items into a fresh execution stack.
    pub fn to_stack(&self) -> Stack {
        Stack::from_items(self.0.clone())
    }

    /// Read a varint item count followed by varint-prefixed items.
    pub fn decode(reader: &mut ByteReader<'_>) -> Result<Self, ScriptError> {
        let count = reader.read_varint()?.value();
        // Each item needs at least its one-byte length prefix.
        if count > reader.remaining() as u64 {
            return Err(ScriptError::DataTooSmall);
        }
        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            items.push(reader.read_var_bytes()?.to_vec());
        }
        Ok(Witness(items))
    }

    /// Serialize the witness in its wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        self.write(&mut w);
        w.into_bytes()
    }

    pub fn write(&self, w: &mut ByteWriter) {
        w.write_varint(VarInt::from(self.0.len()));
        for item in &self.0 {
            w.write_var_bytes(item);
        }
    }
}

fn parse_item(token: &str) -> Result<Vec<u8>, ScriptError> {
    if is_decimal(token) {
        return Ok(ScriptNum::new(parse_int_token(token)?).to_bytes());
    }
    if let Some(hex_str) = token.strip_prefix("0x") {
        if !hex_str.is_empty() {
            if let Ok(raw) = hex::decode(hex_str) {
                return Ok(raw);
            }
        }
    } else if token.len() >= 2 && token.starts_with('\'') && token.ends_with('\'') {
        return Ok(token.as_bytes()[1..token.len() - 1].to_vec());
    }
    Err(ScriptError::InvalidToken(token.to_string()))
}

impl From<Vec<Vec<u8>>> for Witness {
    fn from(items: Vec<Vec<u8>>) -> Self {
        Witness(items)
    }
}

impl fmt::Debug for Witness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter().map(hex::encode)).finish()
    }
}

impl Serialize for Witness {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(hex::encode))
    }
}

impl<'de> Deserialize<'de> for Witness {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Vec::<String>::deserialize(deserializer)?;
        Witness::from_hex_items(&items).map_err(serde::de::Error::custom)
    }
}
