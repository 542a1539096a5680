//! The collector context
//!
//! A [`Vm`] owns the registry, the root stack and the collector. The embedding
//! program only ever touches cells through it.

use crate::config::{ConfigError, VmConfig};
use crate::gc::{AllocError, CollectionReport, Collector, GcStats, Heap, LOG_TARGET};
use crate::value::{Cell, CellRef};
use crate::vm::stack::{RootStack, StackError};
use log::warn;
use thiserror::Error;

/// VM error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VmError {
    /// Push beyond the root stack capacity
    #[error("stack overflow (capacity {capacity})")]
    StackOverflow { capacity: usize },
    /// Pop from an empty root stack
    #[error("stack underflow")]
    StackUnderflow,
    /// The registry could not take another cell
    #[error("allocation failure: {0}")]
    AllocationFailure(#[from] AllocError),
    /// The handle does not name a registered cell
    #[error("invalid cell handle {0}")]
    InvalidHandle(CellRef),
    /// The handle names a scalar where a pair is required
    #[error("cell {0} is not a pair")]
    NotAPair(CellRef),
}

impl From<StackError> for VmError {
    fn from(e: StackError) -> Self {
        match e {
            StackError::Overflow { capacity } => VmError::StackOverflow { capacity },
            StackError::Underflow => VmError::StackUnderflow,
        }
    }
}

/// Result type for VM operations
pub type VmResult<T> = Result<T, VmError>;

/// Which field of a pair to rewire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairField {
    First,
    Second,
}

/// A heap of cells rooted by a bounded stack
pub struct Vm {
    /// Every allocated cell
    heap: Heap,
    /// The root set
    stack: RootStack,
    /// Threshold controller and statistics
    collector: Collector,
}

impl Vm {
    /// Create a VM with the given stack capacity and initial threshold
    pub fn new(stack_capacity: usize, initial_threshold: usize) -> Self {
        Vm {
            heap: Heap::new(),
            stack: RootStack::new(stack_capacity),
            collector: Collector::new(initial_threshold),
        }
    }

    /// Create a VM from a validated configuration
    pub fn with_config(config: VmConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Vm {
            heap: Heap::with_limit(config.heap_limit),
            stack: RootStack::new(config.stack_capacity),
            collector: Collector::new(config.initial_threshold),
        })
    }

    // -----------------------------------------------------------------------
    // Allocation
    // -----------------------------------------------------------------------

    /// Register a new cell, collecting first if the threshold is reached
    ///
    /// The caller must make sure everything `cell` references is still rooted,
    /// since the cycle may run before the cell is linked.
    fn allocate(&mut self, cell: Cell) -> VmResult<CellRef> {
        if self.collector.should_collect(self.heap.live_count()) || self.heap.is_full() {
            self.collect();
        }

        let r = self.heap.alloc(cell).inspect_err(|e| {
            warn!(target: LOG_TARGET, "allocation refused: {}", e);
        })?;
        self.collector.record_alloc(self.heap.live_count());
        Ok(r)
    }

    /// Allocate a scalar and push it onto the stack
    pub fn push_scalar(&mut self, value: i32) -> VmResult<CellRef> {
        self.stack.ensure_room(1)?;
        let r = self.allocate(Cell::Scalar(value))?;
        self.stack.push(r)?;
        Ok(r)
    }

    /// Replace the top two stack entries with a pair of them
    ///
    /// The top of the stack becomes `second` and the entry below it becomes
    /// `first`. Both operands stay on the stack until the pair is registered,
    /// so a collection triggered by this allocation cannot reclaim them.
    pub fn push_pair(&mut self) -> VmResult<CellRef> {
        self.stack.ensure_depth(2)?;
        let (Some(second), Some(first)) = (self.stack.peek_at(0), self.stack.peek_at(1)) else {
            return Err(VmError::StackUnderflow);
        };

        let r = self.allocate(Cell::pair(first, second))?;
        self.stack.drop_n(2);
        self.stack.push(r)?;
        Ok(r)
    }

    /// Push an existing cell onto the stack
    pub fn push(&mut self, r: CellRef) -> VmResult<()> {
        if !self.heap.contains(r) {
            return Err(VmError::InvalidHandle(r));
        }
        self.stack.push(r)?;
        Ok(())
    }

    /// Pop the top of the stack
    pub fn pop(&mut self) -> VmResult<CellRef> {
        Ok(self.stack.pop()?)
    }

    /// Point one field of `pair` at `target`
    pub fn set_field(&mut self, pair: CellRef, field: PairField, target: CellRef) -> VmResult<()> {
        if !self.heap.contains(target) {
            return Err(VmError::InvalidHandle(target));
        }
        match self.heap.get_mut(pair) {
            Some(Cell::Pair { first, second }) => {
                match field {
                    PairField::First => *first = target,
                    PairField::Second => *second = target,
                }
                Ok(())
            }
            Some(Cell::Scalar(_)) => Err(VmError::NotAPair(pair)),
            None => Err(VmError::InvalidHandle(pair)),
        }
    }

    #[inline]
    pub fn set_first(&mut self, pair: CellRef, target: CellRef) -> VmResult<()> {
        self.set_field(pair, PairField::First, target)
    }

    #[inline]
    pub fn set_second(&mut self, pair: CellRef, target: CellRef) -> VmResult<()> {
        self.set_field(pair, PairField::Second, target)
    }

    // -----------------------------------------------------------------------
    // Collection
    // -----------------------------------------------------------------------

    /// Run a collection cycle now
    pub fn collect(&mut self) -> CollectionReport {
        self.collector.run(&mut self.heap, self.stack.as_slice())
    }

    /// Pop every root and collect, leaving an empty registry
    pub fn reset(&mut self) -> CollectionReport {
        self.stack.clear();
        self.collect()
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    /// Number of registered cells
    #[inline]
    pub fn live_count(&self) -> usize {
        self.heap.live_count()
    }

    /// Live count at which the next allocation collects
    #[inline]
    pub fn threshold(&self) -> usize {
        self.collector.threshold()
    }

    #[inline]
    pub fn stats(&self) -> &GcStats {
        self.collector.stats()
    }

    /// Look up a registered cell
    #[inline]
    pub fn get(&self, r: CellRef) -> Option<&Cell> {
        self.heap.get(r)
    }

    #[inline]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// The root stack, bottom first
    #[inline]
    pub fn stack(&self) -> &[CellRef] {
        self.stack.as_slice()
    }

    /// Stack entry at `offset` from the top (0 = top)
    #[inline]
    pub fn peek(&self, offset: usize) -> Option<CellRef> {
        self.stack.peek_at(offset)
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    #[inline]
    pub fn stack_capacity(&self) -> usize {
        self.stack.capacity()
    }

    /// Render the registry and root stack
    #[cfg(feature = "dump")]
    pub fn dump(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        let _ = writeln!(
            out,
            "heap: {} live, threshold {}, {} slots",
            self.heap.live_count(),
            self.collector.threshold(),
            self.heap.capacity()
        );
        for (r, cell) in self.heap.iter() {
            let _ = writeln!(out, "  {} = {}", r, cell);
        }
        let _ = writeln!(out, "stack: {}/{}", self.stack.len(), self.stack.capacity());
        for (depth, r) in self.stack.as_slice().iter().rev().enumerate() {
            let _ = writeln!(out, "  [{}] {}", depth, r);
        }
        out
    }
}

impl Default for Vm {
    fn default() -> Self {
        Vm::new(
            crate::config::DEFAULT_STACK_CAPACITY,
            crate::config::DEFAULT_THRESHOLD,
        )
    }
}
