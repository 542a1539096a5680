//! Root stack for the VM
//!
//! The stack holds every cell currently in scope. It never owns cells; its
//! entries are the root set the collector traces from.

use crate::value::CellRef;
use thiserror::Error;

/// Root stack error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StackError {
    #[error("stack overflow (capacity {capacity})")]
    Overflow { capacity: usize },
    #[error("stack underflow")]
    Underflow,
}

/// Bounded stack of cell handles
pub struct RootStack {
    /// Stack storage
    values: Vec<CellRef>,
    /// Maximum depth
    capacity: usize,
}

impl RootStack {
    /// Create a new stack with the given capacity
    pub fn new(capacity: usize) -> Self {
        RootStack {
            values: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a handle onto the stack
    #[inline]
    pub fn push(&mut self, value: CellRef) -> Result<(), StackError> {
        self.ensure_room(1)?;
        self.values.push(value);
        Ok(())
    }

    /// Pop a handle from the stack
    #[inline]
    pub fn pop(&mut self) -> Result<CellRef, StackError> {
        self.values.pop().ok_or(StackError::Underflow)
    }

    /// Peek at a handle at offset from top (0 = top)
    #[inline]
    pub fn peek_at(&self, offset: usize) -> Option<CellRef> {
        let len = self.values.len();
        if offset < len {
            Some(self.values[len - 1 - offset])
        } else {
            None
        }
    }

    /// Peek at the top handle without removing it
    #[inline]
    pub fn peek(&self) -> Option<CellRef> {
        self.peek_at(0)
    }

    /// Fail with `Overflow` unless `n` more handles fit
    #[inline]
    pub fn ensure_room(&self, n: usize) -> Result<(), StackError> {
        if self.values.len() + n > self.capacity {
            return Err(StackError::Overflow {
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Fail with `Underflow` unless at least `n` handles are present
    #[inline]
    pub fn ensure_depth(&self, n: usize) -> Result<(), StackError> {
        if self.values.len() < n {
            return Err(StackError::Underflow);
        }
        Ok(())
    }

    /// Drop n handles from the stack
    pub fn drop_n(&mut self, n: usize) {
        let new_len = self.values.len().saturating_sub(n);
        self.values.truncate(new_len);
    }

    /// Remove every handle
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Get the current stack depth
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the stack is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The stack contents, bottom first
    #[inline]
    pub fn as_slice(&self) -> &[CellRef] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(i: u32) -> CellRef {
        CellRef::new(i, 0)
    }

    #[test]
    fn test_push_pop() {
        let mut stack = RootStack::new(16);

        stack.push(r(1)).unwrap();
        stack.push(r(2)).unwrap();
        stack.push(r(3)).unwrap();

        assert_eq!(stack.len(), 3);
        assert_eq!(stack.pop(), Ok(r(3)));
        assert_eq!(stack.pop(), Ok(r(2)));
        assert_eq!(stack.pop(), Ok(r(1)));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_underflow() {
        let mut stack = RootStack::new(4);
        assert_eq!(stack.pop(), Err(StackError::Underflow));
        assert_eq!(stack.ensure_depth(1), Err(StackError::Underflow));
    }

    #[test]
    fn test_overflow() {
        let mut stack = RootStack::new(2);

        stack.push(r(1)).unwrap();
        stack.push(r(2)).unwrap();
        assert_eq!(
            stack.push(r(3)),
            Err(StackError::Overflow { capacity: 2 })
        );
        // The failed push leaves the stack untouched.
        assert_eq!(stack.as_slice(), &[r(1), r(2)]);
    }

    #[test]
    fn test_peek() {
        let mut stack = RootStack::new(16);

        stack.push(r(1)).unwrap();
        stack.push(r(2)).unwrap();

        assert_eq!(stack.peek(), Some(r(2)));
        assert_eq!(stack.peek_at(0), Some(r(2)));
        assert_eq!(stack.peek_at(1), Some(r(1)));
        assert!(stack.peek_at(2).is_none());
    }

    #[test]
    fn test_drop_and_clear() {
        let mut stack = RootStack::new(16);
        for i in 0..5 {
            stack.push(r(i)).unwrap();
        }

        stack.drop_n(2);
        assert_eq!(stack.len(), 3);
        assert_eq!(stack.peek(), Some(r(2)));

        stack.drop_n(10);
        assert!(stack.is_empty());

        stack.push(r(9)).unwrap();
        stack.clear();
        assert!(stack.is_empty());
        assert_eq!(stack.capacity(), 16);
    }
}
