//! Value stack

use crate::error::{VmError, VmResult};
use quill_primitives::{Address, Amount, U256};
use quill_types::Value;

/// Operand stack of one method frame
#[derive(Clone, Debug)]
pub struct Stack {
    data: Vec<Value>,
    limit: usize,
}

impl Stack {
    /// Empty stack holding at most `limit` values
    pub fn new(limit: usize) -> Self {
        Self {
            data: Vec::new(),
            limit,
        }
    }

    /// Push a value onto the stack
    pub fn push(&mut self, value: Value) -> VmResult<()> {
        if self.data.len() >= self.limit {
            return Err(VmError::StackOverflow(self.limit));
        }
        self.data.push(value);
        Ok(())
    }

    /// Pop a value from the stack
    pub fn pop(&mut self) -> VmResult<Value> {
        self.data.pop().ok_or(VmError::StackUnderflow)
    }

    /// Peek at the top of the stack
    pub fn peek(&self) -> VmResult<&Value> {
        self.data.last().ok_or(VmError::StackUnderflow)
    }

    /// Swap the two topmost values
    pub fn swap(&mut self) -> VmResult<()> {
        let len = self.data.len();
        if len < 2 {
            return Err(VmError::StackUnderflow);
        }
        self.data.swap(len - 1, len - 2);
        Ok(())
    }

    /// Pop an integer
    pub fn pop_int(&mut self) -> VmResult<U256> {
        match self.pop()? {
            Value::Int(v) => Ok(v),
            other => Err(mismatch("int", &other)),
        }
    }

    /// Pop an address
    pub fn pop_address(&mut self) -> VmResult<Address> {
        match self.pop()? {
            Value::Address(a) => Ok(a),
            other => Err(mismatch("address", &other)),
        }
    }

    /// Pop an integer that must fit a coin amount
    pub fn pop_amount(&mut self) -> VmResult<Amount> {
        let v = self.pop_int()?;
        if v > U256::from(Amount::MAX) {
            return Err(VmError::ArithmeticOverflow);
        }
        Ok(v.as_u128())
    }

    /// Pop `count` values, returned in push order
    pub fn pop_many(&mut self, count: usize) -> VmResult<Vec<Value>> {
        if count > self.data.len() {
            return Err(VmError::StackUnderflow);
        }
        Ok(self.data.split_off(self.data.len() - count))
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the stack is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn mismatch(expected: &'static str, found: &Value) -> VmError {
    VmError::TypeMismatch {
        expected,
        found: found.type_name(),
    }
}
