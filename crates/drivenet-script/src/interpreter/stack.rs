//! Script execution stack.
//!
//! Indices are signed: negative values count from the top (`-1` is the top
//! item) and non-negative values count from the bottom (`0` is the first
//! item pushed). Any index outside the current depth is an `Underflow`.

use super::error::{InterpreterError, InterpreterErrorCode};
use super::scriptnum::ScriptNum;

/// Convert byte array to boolean (consensus rules).
pub fn as_bool(t: &[u8]) -> bool {
    for i in 0..t.len() {
        if t[i] != 0 {
            // Negative zero is also false.
            if i == t.len() - 1 && t[i] == 0x80 {
                return false;
            }
            return true;
        }
    }
    false
}

/// Convert boolean to byte array.
pub fn from_bool(v: bool) -> Vec<u8> {
    if v {
        vec![1]
    } else {
        vec![]
    }
}

fn underflow(what: String) -> InterpreterError {
    InterpreterError::new(InterpreterErrorCode::Underflow, what)
}

/// The main data stack (and alt stack) used by the interpreter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stack {
    stk: Vec<Vec<u8>>,
}

impl Stack {
    pub fn new() -> Self {
        Stack { stk: Vec::new() }
    }

    /// Build a stack from items ordered bottom to top.
    pub fn from_items(items: Vec<Vec<u8>>) -> Self {
        Stack { stk: items }
    }

    pub fn len(&self) -> usize {
        self.stk.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stk.is_empty()
    }

    /// Items ordered bottom to top.
    pub fn items(&self) -> &[Vec<u8>] {
        &self.stk
    }

    pub fn into_items(self) -> Vec<Vec<u8>> {
        self.stk
    }

    fn resolve(&self, idx: isize) -> Result<usize, InterpreterError> {
        let len = self.stk.len() as isize;
        let pos = if idx < 0 { len + idx } else { idx };
        if pos < 0 || pos >= len {
            return Err(underflow(format!("index {} is invalid for stack size {}", idx, len)));
        }
        Ok(pos as usize)
    }

    pub fn push(&mut self, data: Vec<u8>) {
        self.stk.push(data);
    }

    pub fn push_num(&mut self, n: &ScriptNum) {
        self.push(n.to_bytes());
    }

    pub fn push_bool(&mut self, val: bool) {
        self.push(from_bool(val));
    }

    pub fn pop(&mut self) -> Result<Vec<u8>, InterpreterError> {
        self.stk
            .pop()
            .ok_or_else(|| underflow("attempt to pop from an empty stack".to_string()))
    }

    pub fn pop_bool(&mut self) -> Result<bool, InterpreterError> {
        Ok(as_bool(&self.pop()?))
    }

    pub fn pop_num(&mut self, require_minimal: bool, max_len: usize) -> Result<ScriptNum, InterpreterError> {
        let data = self.pop()?;
        ScriptNum::from_bytes(&data, max_len, require_minimal)
    }

    /// Borrow the item at a signed index.
    pub fn peek(&self, idx: isize) -> Result<&[u8], InterpreterError> {
        let pos = self.resolve(idx)?;
        Ok(&self.stk[pos])
    }

    pub fn get_bool(&self, idx: isize) -> Result<bool, InterpreterError> {
        Ok(as_bool(self.peek(idx)?))
    }

    pub fn get_num(&self, idx: isize, require_minimal: bool, max_len: usize) -> Result<ScriptNum, InterpreterError> {
        ScriptNum::from_bytes(self.peek(idx)?, max_len, require_minimal)
    }

    /// Replace the item at a signed index.
    pub fn set(&mut self, idx: isize, data: Vec<u8>) -> Result<(), InterpreterError> {
        let pos = self.resolve(idx)?;
        self.stk[pos] = data;
        Ok(())
    }

    /// Remove and return the item at a signed index.
    pub fn remove(&mut self, idx: isize) -> Result<Vec<u8>, InterpreterError> {
        let pos = self.resolve(idx)?;
        Ok(self.stk.remove(pos))
    }

    /// Insert so that the new item ends up at the given signed index.
    ///
    /// `-1` appends, `0` inserts at the bottom.
    pub fn insert(&mut self, idx: isize, data: Vec<u8>) -> Result<(), InterpreterError> {
        let len = self.stk.len() as isize;
        let pos = if idx < 0 { len + idx + 1 } else { idx };
        if pos < 0 || pos > len {
            return Err(underflow(format!("insert index {} is invalid for stack size {}", idx, len)));
        }
        self.stk.insert(pos as usize, data);
        Ok(())
    }

    /// Exchange two items by signed index.
    pub fn swap(&mut self, i: isize, j: isize) -> Result<(), InterpreterError> {
        let a = self.resolve(i)?;
        let b = self.resolve(j)?;
        self.stk.swap(a, b);
        Ok(())
    }

    /// Remove the item just below the top (OP_NIP).
    pub fn nip(&mut self) -> Result<(), InterpreterError> {
        self.remove(-2).map(|_| ())
    }

    /// Discard the top item (OP_DROP).
    pub fn drop(&mut self) -> Result<(), InterpreterError> {
        self.pop().map(|_| ())
    }

    /// Copy the top item below the second one (OP_TUCK).
    pub fn tuck(&mut self) -> Result<(), InterpreterError> {
        let top = self.peek(-1)?.to_vec();
        self.insert(-3, top)
    }

    /// Copy the item `n` positions below the top onto the top (OP_PICK).
    pub fn pick(&mut self, n: usize) -> Result<(), InterpreterError> {
        let item = self.peek(-(n as isize) - 1)?.to_vec();
        self.push(item);
        Ok(())
    }

    /// Move the item `n` positions below the top onto the top (OP_ROLL).
    pub fn roll(&mut self, n: usize) -> Result<(), InterpreterError> {
        let item = self.remove(-(n as isize) - 1)?;
        self.push(item);
        Ok(())
    }

    /// Duplicate the top `n` items, preserving order.
    pub fn dup_n(&mut self, n: usize) -> Result<(), InterpreterError> {
        if self.stk.len() < n {
            return Err(underflow(format!("attempt to dup {} stack items", n)));
        }
        let start = self.stk.len() - n;
        self.stk.extend_from_within(start..);
        Ok(())
    }

    /// Duplicate the top item (OP_DUP).
    pub fn dup(&mut self) -> Result<(), InterpreterError> {
        self.dup_n(1)
    }

    /// Rotate the third group of `n` items to the top.
    pub fn rot_n(&mut self, n: usize) -> Result<(), InterpreterError> {
        if self.stk.len() < 3 * n {
            return Err(underflow(format!("attempt to rotate {} stack items", 3 * n)));
        }
        let entry = -(3 * n as isize);
        for _ in 0..n {
            let so = self.remove(entry)?;
            self.push(so);
        }
        Ok(())
    }

    /// Rotate the third item to the top (OP_ROT).
    pub fn rot(&mut self) -> Result<(), InterpreterError> {
        self.rot_n(1)
    }

    /// Swap the top two groups of `n` items.
    pub fn swap_n(&mut self, n: usize) -> Result<(), InterpreterError> {
        if self.stk.len() < 2 * n {
            return Err(underflow(format!("attempt to swap {} stack items", 2 * n)));
        }
        let entry = -(2 * n as isize);
        for _ in 0..n {
            let so = self.remove(entry)?;
            self.push(so);
        }
        Ok(())
    }

    /// Copy the second group of `n` items to the top.
    pub fn over_n(&mut self, n: usize) -> Result<(), InterpreterError> {
        if self.stk.len() < 2 * n {
            return Err(underflow(format!("attempt to perform over on {} stack items", 2 * n)));
        }
        let start = self.stk.len() - 2 * n;
        self.stk.extend_from_within(start..start + n);
        Ok(())
    }

    /// Copy the second item to the top (OP_OVER).
    pub fn over(&mut self) -> Result<(), InterpreterError> {
        self.over_n(1)
    }

    /// Keep only the bottom `len` items.
    pub fn truncate(&mut self, len: usize) {
        self.stk.truncate(len);
    }

    pub fn clear(&mut self) {
        self.stk.clear();
    }
}

/// Branch state for nested IF/NOTIF blocks.
#[derive(Debug, Clone, Default)]
pub struct ConditionStack {
    stk: Vec<bool>,
}

impl ConditionStack {
    pub fn new() -> Self {
        ConditionStack { stk: Vec::new() }
    }

    pub fn push(&mut self, b: bool) {
        self.stk.push(b);
    }

    pub fn pop(&mut self) -> Result<bool, InterpreterError> {
        self.stk.pop().ok_or_else(|| {
            InterpreterError::new(
                InterpreterErrorCode::UnbalancedConditional,
                "encountered ENDIF with no matching IF".to_string(),
            )
        })
    }

    /// Flip the innermost branch (OP_ELSE).
    pub fn toggle_top(&mut self) -> Result<(), InterpreterError> {
        match self.stk.last_mut() {
            Some(top) => {
                *top = !*top;
                Ok(())
            }
            None => Err(InterpreterError::new(
                InterpreterErrorCode::UnbalancedConditional,
                "encountered ELSE with no matching IF".to_string(),
            )),
        }
    }

    /// True when every enclosing branch is taken.
    pub fn all_true(&self) -> bool {
        self.stk.iter().all(|&b| b)
    }

    pub fn is_empty(&self) -> bool {
        self.stk.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.stk.len()
    }
}
