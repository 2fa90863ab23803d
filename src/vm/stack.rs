//! Fixed-capacity operand stack.
//!
//! Storage is allocated once; `push`/`pop` are bounds-checked and report
//! overflow/underflow as values instead of touching memory out of range.

use std::fmt;

pub const DEFAULT_STACK_CAPACITY: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackError {
    Overflow,
    Underflow,
}

impl fmt::Display for StackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackError::Overflow => write!(f, "operand stack overflow"),
            StackError::Underflow => write!(f, "operand stack underflow"),
        }
    }
}

impl std::error::Error for StackError {}

pub struct OperandStack {
    cells: Box<[f32]>,
    len: usize,
}

impl OperandStack {
    pub fn new(capacity: usize) -> Self {
        Self {
            cells: vec![0.0; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    #[inline]
    pub fn push(&mut self, value: f32) -> Result<(), StackError> {
        let cell = self.cells.get_mut(self.len).ok_or(StackError::Overflow)?;
        *cell = value;
        self.len += 1;
        Ok(())
    }

    #[inline]
    pub fn pop(&mut self) -> Result<f32, StackError> {
        if self.len == 0 {
            return Err(StackError::Underflow);
        }
        self.len -= 1;
        Ok(self.cells[self.len])
    }

    /// Mutable access to the top cell, for in-place unary ops.
    #[inline]
    pub fn top_mut(&mut self) -> Result<&mut f32, StackError> {
        match self.len {
            0 => Err(StackError::Underflow),
            n => Ok(&mut self.cells[n - 1]),
        }
    }

    /// Pop two operands, returning them in push order.
    #[inline]
    pub fn pop_pair(&mut self) -> Result<(f32, f32), StackError> {
        let second = self.pop()?;
        let first = self.pop()?;
        Ok((first, second))
    }

    /// Remove the top `n` cells and return them in push order.
    #[inline]
    pub fn pop_n(&mut self, n: usize) -> Result<&[f32], StackError> {
        if n > self.len {
            return Err(StackError::Underflow);
        }
        self.len -= n;
        Ok(&self.cells[self.len..self.len + n])
    }
}
