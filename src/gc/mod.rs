//! Garbage collector module
//!
//! Babygc uses a non-moving mark-and-sweep collector over an arena registry.
//!
//! - The registry ([`Heap`]) owns every cell; handles stay valid until the
//!   cell is reclaimed and are never reused for a different cell
//! - Collection is stop-the-world and runs on the allocating thread
//! - Cycles are handled by the mark bit, so no reference counting is needed

mod allocator;
mod collector;

pub use allocator::{AllocError, CellIterator, Heap};
pub use collector::{
    mark_all, next_threshold, sweep, CollectionReport, Collector, GcPhase, GcStats, LOG_TARGET,
};
