//! Script number arithmetic with consensus rules.
//!
//! Numbers on the script stack are little-endian byte strings with a sign
//! bit in the most significant bit of the last byte. Numeric opcodes accept
//! operands of at most 4 bytes (5 for the locktime opcodes), but results may
//! overflow that width and remain valid as long as they are not read back
//! as numbers.

use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive, Zero};

use super::error::{InterpreterError, InterpreterErrorCode};

/// A script number using big integer arithmetic for overflow safety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptNum {
    /// The numeric value stored as a big integer.
    pub val: BigInt,
}

impl ScriptNum {
    /// Create a new ScriptNum from an i64 value.
    pub fn new(val: i64) -> Self {
        ScriptNum { val: BigInt::from(val) }
    }

    /// Parse a byte array into a ScriptNum.
    ///
    /// `max_len` is the max allowed byte length and `require_minimal`
    /// rejects encodings with superfluous trailing bytes, negative zero
    /// included. Both failures are `ScriptNumError`.
    pub fn from_bytes(
        bb: &[u8],
        max_len: usize,
        require_minimal: bool,
    ) -> Result<Self, InterpreterError> {
        if bb.len() > max_len {
            return Err(InterpreterError::new(
                InterpreterErrorCode::ScriptNumError,
                format!(
                    "numeric value encoded as {:02x?} is {} bytes which exceeds the max allowed of {}",
                    bb, bb.len(), max_len
                ),
            ));
        }

        if require_minimal {
            check_minimal_data_encoding(bb)?;
        }

        if bb.is_empty() {
            return Ok(ScriptNum { val: BigInt::zero() });
        }

        let mut v = BigInt::zero();
        for (i, &b) in bb.iter().enumerate() {
            v |= BigInt::from(b) << (8 * i);
        }

        // Sign bit set: clear it and negate.
        if bb[bb.len() - 1] & 0x80 != 0 {
            let mask = !(BigInt::from(0x80_i64) << (8 * (bb.len() - 1)));
            v &= mask;
            v = -v;
        }

        Ok(ScriptNum { val: v })
    }

    /// Serialize the number to its minimal little-endian form.
    pub fn to_bytes(&self) -> Vec<u8> {
        if self.val.is_zero() {
            return vec![];
        }

        let is_negative = self.val.is_negative();
        let (_, mut result) = self.val.abs().to_bytes_le();

        // Magnitude already uses the top bit: the sign needs its own byte.
        let last = result.len() - 1;
        if result[last] & 0x80 != 0 {
            result.push(if is_negative { 0x80 } else { 0x00 });
        } else if is_negative {
            result[last] |= 0x80;
        }

        result
    }

    /// Add another script number to this one and return self for chaining.
    pub fn add(&mut self, other: &ScriptNum) -> &mut Self {
        self.val = &self.val + &other.val;
        self
    }

    /// Subtract another script number from this one and return self for chaining.
    pub fn sub(&mut self, other: &ScriptNum) -> &mut Self {
        self.val = &self.val - &other.val;
        self
    }

    /// Increment this number by one and return self for chaining.
    pub fn incr(&mut self) -> &mut Self {
        self.val = &self.val + BigInt::one();
        self
    }

    /// Decrement this number by one and return self for chaining.
    pub fn decr(&mut self) -> &mut Self {
        self.val = &self.val - BigInt::one();
        self
    }

    /// Negate this number and return self for chaining.
    pub fn neg(&mut self) -> &mut Self {
        self.val = -self.val.clone();
        self
    }

    /// Replace this number with its absolute value and return self for chaining.
    pub fn abs(&mut self) -> &mut Self {
        if self.val.is_negative() {
            self.val = -self.val.clone();
        }
        self
    }

    /// Set this number to the given i64 value and return self for chaining.
    pub fn set(&mut self, i: i64) -> &mut Self {
        self.val = BigInt::from(i);
        self
    }

    pub fn is_zero(&self) -> bool {
        self.val.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.val.is_negative()
    }

    pub fn less_than(&self, other: &ScriptNum) -> bool {
        self.val < other.val
    }

    pub fn less_than_or_equal(&self, other: &ScriptNum) -> bool {
        self.val <= other.val
    }

    pub fn greater_than(&self, other: &ScriptNum) -> bool {
        self.val > other.val
    }

    pub fn greater_than_or_equal(&self, other: &ScriptNum) -> bool {
        self.val >= other.val
    }

    pub fn equal(&self, other: &ScriptNum) -> bool {
        self.val == other.val
    }

    /// Convert to i32, clamping to [i32::MIN, i32::MAX] on overflow.
    pub fn to_i32(&self) -> i32 {
        match self.val.to_i64() {
            Some(v) => v.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
            None if self.val.is_positive() => i32::MAX,
            None => i32::MIN,
        }
    }

    /// Convert to i64, clamping to [i64::MIN, i64::MAX] on overflow.
    pub fn to_i64(&self) -> i64 {
        match self.val.to_i64() {
            Some(v) => v,
            None if self.val.is_positive() => i64::MAX,
            None => i64::MIN,
        }
    }
}

impl From<i64> for ScriptNum {
    fn from(v: i64) -> Self {
        ScriptNum::new(v)
    }
}

/// Check that a byte array uses minimal numeric encoding.
pub fn check_minimal_data_encoding(v: &[u8]) -> Result<(), InterpreterError> {
    if let Some(&last) = v.last() {
        if last & 0x7f == 0 && (v.len() == 1 || v[v.len() - 2] & 0x80 == 0) {
            return Err(InterpreterError::new(
                InterpreterErrorCode::ScriptNumError,
                format!("numeric value encoded as {:02x?} is not minimally encoded", v),
            ));
        }
    }
    Ok(())
}
