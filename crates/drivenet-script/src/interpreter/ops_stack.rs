use super::error::{InterpreterError, InterpreterErrorCode};
use super::stack::as_bool;
use super::thread::Thread;

impl<'a> Thread<'a> {
    pub(crate) fn op_to_alt_stack(&mut self) -> Result<(), InterpreterError> {
        let v = self.dstack.pop()?;
        self.astack.push(v);
        Ok(())
    }

    pub(crate) fn op_from_alt_stack(&mut self) -> Result<(), InterpreterError> {
        let v = self.astack.pop().map_err(|_| {
            InterpreterError::new(
                InterpreterErrorCode::AltUnderflow,
                "attempt to pop from an empty alt stack".to_string(),
            )
        })?;
        self.dstack.push(v);
        Ok(())
    }

    pub(crate) fn op_2drop(&mut self) -> Result<(), InterpreterError> {
        if self.dstack.len() < 2 {
            return Err(InterpreterError::new(
                InterpreterErrorCode::Underflow,
                "OP_2DROP requires two stack items".to_string(),
            ));
        }
        self.dstack.drop()?;
        self.dstack.drop()
    }

    pub(crate) fn op_ifdup(&mut self) -> Result<(), InterpreterError> {
        let top = self.dstack.peek(-1)?;
        if as_bool(top) {
            let v = top.to_vec();
            self.dstack.push(v);
        }
        Ok(())
    }

    /// Pop the depth operand of OP_PICK/OP_ROLL and bounds-check it.
    fn pop_depth(&mut self) -> Result<usize, InterpreterError> {
        let n = self.pop_num()?.to_i32();
        if n < 0 || n as usize >= self.dstack.len() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::Underflow,
                format!("stack depth {} out of range for {} items", n, self.dstack.len()),
            ));
        }
        Ok(n as usize)
    }

    pub(crate) fn op_pick(&mut self) -> Result<(), InterpreterError> {
        let n = self.pop_depth()?;
        self.dstack.pick(n)
    }

    pub(crate) fn op_roll(&mut self) -> Result<(), InterpreterError> {
        let n = self.pop_depth()?;
        self.dstack.roll(n)
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
    fn test_alt_stack() {
        assert_eq!(run("1 2 TOALTSTACK 3 FROMALTSTACK").unwrap(), vec![vec![1], vec![3], vec![2]]);
        assert_eq!(run("FROMALTSTACK").unwrap_err(), InterpreterErrorCode::AltUnderflow);
        assert_eq!(run("TOALTSTACK").unwrap_err(), InterpreterErrorCode::Underflow);
    }

    #[test]
    fn test_pick_roll() {
        assert_eq!(run("1 2 3 2 PICK").unwrap(), vec![vec![1], vec![2], vec![3], vec![1]]);
        assert_eq!(run("1 2 3 2 ROLL").unwrap(), vec![vec![2], vec![3], vec![1]]);
        assert_eq!(run("1 0 ROLL").unwrap(), vec![vec![1]]);
        assert_eq!(run("1 1 PICK").unwrap_err(), InterpreterErrorCode::Underflow);
        assert_eq!(run("1 -1 ROLL").unwrap_err(), InterpreterErrorCode::Underflow);
    }

    #[test]
    fn test_2drop_ifdup() {
        assert_eq!(run("1 2 3 2DROP").unwrap(), vec![vec![1]]);
        assert_eq!(run("1 2DROP").unwrap_err(), InterpreterErrorCode::Underflow);
        assert_eq!(run("0 IFDUP").unwrap(), vec![Vec::<u8>::new()]);
        assert_eq!(run("5 IFDUP").unwrap(), vec![vec![5], vec![5]]);
    }

    #[test]
    fn test_combined_stack_limit_counts_alt_stack() {
        let mut text = String::new();
        for _ in 0..100 {
            text.push_str("1 TOALTSTACK ");
        }
        for _ in 0..900 {
            text.push_str("1 ");
        }
        assert!(run(&text).is_ok());
        text.push_str("1");
        assert_eq!(run(&text).unwrap_err(), InterpreterErrorCode::StackSize);
    }
}
