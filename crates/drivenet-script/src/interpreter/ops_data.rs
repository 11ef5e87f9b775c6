use super::error::{InterpreterError, InterpreterErrorCode};
use super::scriptnum::ScriptNum;
use super::thread::Thread;

impl<'a> Thread<'a> {
    pub(crate) fn op_size(&mut self) -> Result<(), InterpreterError> {
        let size = self.dstack.peek(-1)?.len();
        self.dstack.push_num(&ScriptNum::new(size as i64));
        Ok(())
    }

    pub(crate) fn op_equal(&mut self) -> Result<(), InterpreterError> {
        let a = self.dstack.pop()?;
        let b = self.dstack.pop()?;
        self.dstack.push_bool(a == b);
        Ok(())
    }

    pub(crate) fn op_equalverify(&mut self) -> Result<(), InterpreterError> {
        self.op_equal()?;
        if !self.dstack.pop_bool()? {
            return Err(InterpreterError::new(
                InterpreterErrorCode::EqualVerify,
                "OP_EQUALVERIFY failed".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::interpreter::{execute, InterpreterErrorCode, ScriptFlags, SigVersion, Stack};
    use crate::Script;

    fn run(text: &str) -> Result<Vec<Vec<u8>>, InterpreterErrorCode> {
        let script = Script::from_string(text).unwrap();
        let mut stack = Stack::new();
        execute(&script, &mut stack, ScriptFlags::NONE, None, SigVersion::Base).map_err(|e| e.code)?;
        Ok(stack.into_items())
    }

    #[test]
    fn test_size() {
        assert_eq!(run("0 SIZE").unwrap(), vec![Vec::<u8>::new(), vec![]]);
        assert_eq!(run("'abc' SIZE").unwrap(), vec![b"abc".to_vec(), vec![3]]);
        assert_eq!(run("SIZE").unwrap_err(), InterpreterErrorCode::Underflow);
    }

    #[test]
    fn test_equal() {
        assert_eq!(run("'a' 'a' EQUAL").unwrap(), vec![vec![1]]);
        assert_eq!(run("1 0x01 0x01 EQUAL").unwrap(), vec![vec![1]]);
        // Numeric equality is not byte equality.
        assert_eq!(run("0 0x01 0x80 EQUAL").unwrap(), vec![Vec::<u8>::new()]);
        assert!(run("'a' 'a' EQUALVERIFY").unwrap().is_empty());
        assert_eq!(run("'a' 'b' EQUALVERIFY").unwrap_err(), InterpreterErrorCode::EqualVerify);
    }
}
