//! Numeric opcodes. Operands are read with the default 4-byte width;
//! results are pushed at whatever width they need.

use super::error::{InterpreterError, InterpreterErrorCode};
use super::scriptnum::ScriptNum;
use super::thread::Thread;

impl<'a> Thread<'a> {
    pub(crate) fn op_unary_int(&mut self, f: impl FnOnce(&mut ScriptNum)) -> Result<(), InterpreterError> {
        let mut m = self.pop_num()?;
        f(&mut m);
        self.dstack.push_num(&m);
        Ok(())
    }

    pub(crate) fn op_unary_bool(&mut self, f: impl FnOnce(&ScriptNum) -> bool) -> Result<(), InterpreterError> {
        let m = self.pop_num()?;
        self.dstack.push_bool(f(&m));
        Ok(())
    }

    /// `f(a, b)` where `b` was on top.
    pub(crate) fn op_binary_int(
        &mut self,
        f: impl FnOnce(&mut ScriptNum, &ScriptNum),
    ) -> Result<(), InterpreterError> {
        let b = self.pop_num()?;
        let mut a = self.pop_num()?;
        f(&mut a, &b);
        self.dstack.push_num(&a);
        Ok(())
    }

    pub(crate) fn op_bool_binop(
        &mut self,
        f: impl FnOnce(&ScriptNum, &ScriptNum) -> bool,
    ) -> Result<(), InterpreterError> {
        let b = self.pop_num()?;
        let a = self.pop_num()?;
        self.dstack.push_bool(f(&a, &b));
        Ok(())
    }

    pub(crate) fn op_numequalverify(&mut self) -> Result<(), InterpreterError> {
        self.op_bool_binop(|a, b| a.equal(b))?;
        if !self.dstack.pop_bool()? {
            return Err(InterpreterError::new(
                InterpreterErrorCode::NumEqualVerify,
                "OP_NUMEQUALVERIFY failed".to_string(),
            ));
        }
        Ok(())
    }

    /// x min max WITHIN: true when min <= x < max.
    pub(crate) fn op_within(&mut self) -> Result<(), InterpreterError> {
        let max = self.pop_num()?;
        let min = self.pop_num()?;
        let x = self.pop_num()?;
        self.dstack
            .push_bool(min.less_than_or_equal(&x) && x.less_than(&max));
        Ok(())
    }
}
