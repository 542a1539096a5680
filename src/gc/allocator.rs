//! Cell registry
//!
//! The registry owns every cell. Storage is an arena of slots addressed by
//! [`CellRef`] handles; two intrusive lists are threaded through the slots:
//!
//! ```text
//! live:  head -> [slot 4] -> [slot 1] -> [slot 0] -> None
//! free:  free -> [slot 3] -> [slot 2] -> None
//! ```
//!
//! New cells are linked at the head of the live list, exactly like the
//! classic `next`-pointer object list, and reclaimed slots are pushed onto the
//! free list for reuse. A cell exists if and only if its slot is on the live
//! list.

use crate::value::{Cell, CellRef};
use thiserror::Error;

/// Allocation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// The configured heap limit is reached and a collection freed nothing
    #[error("heap exhausted: {limit} cells live")]
    Exhausted { limit: usize },
    /// Every representable slot index is in use
    #[error("cell handle space exhausted")]
    HandleSpaceExhausted,
    /// The arena could not grow
    #[error("out of memory")]
    OutOfMemory,
}

/// One arena slot
#[derive(Debug)]
struct Slot {
    /// Bumped every time the slot is reclaimed
    generation: u32,
    /// GC mark bit, only meaningful during a collection
    marked: bool,
    /// Next slot on whichever list this slot is on
    next: Option<u32>,
    /// `None` while the slot sits on the free list
    cell: Option<Cell>,
}

/// The cell registry
pub struct Heap {
    slots: Vec<Slot>,
    /// Head of the live list
    head: Option<u32>,
    /// Head of the free list
    free: Option<u32>,
    /// Number of cells on the live list
    live: usize,
    /// Maximum number of live cells, if bounded
    limit: Option<usize>,
}

impl Heap {
    /// Create an empty, unbounded registry
    pub fn new() -> Self {
        Heap {
            slots: Vec::new(),
            head: None,
            free: None,
            live: 0,
            limit: None,
        }
    }

    /// Create an empty registry holding at most `limit` live cells
    pub fn with_limit(limit: Option<usize>) -> Self {
        Heap {
            limit,
            ..Heap::new()
        }
    }

    /// Number of registered cells
    #[inline]
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Number of slots in the arena (live and free)
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Whether the heap limit would refuse one more cell
    #[inline]
    pub fn is_full(&self) -> bool {
        self.limit.is_some_and(|limit| self.live >= limit)
    }

    /// Register a new cell and return its handle
    ///
    /// Either the cell is fully linked into the live list or nothing changes.
    pub fn alloc(&mut self, cell: Cell) -> Result<CellRef, AllocError> {
        if let Some(limit) = self.limit {
            if self.live >= limit {
                return Err(AllocError::Exhausted { limit });
            }
        }

        let index = match self.free {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                self.free = slot.next;
                slot.cell = Some(cell);
                slot.marked = false;
                index
            }
            None => {
                let index = u32::try_from(self.slots.len())
                    .map_err(|_| AllocError::HandleSpaceExhausted)?;
                self.slots
                    .try_reserve(1)
                    .map_err(|_| AllocError::OutOfMemory)?;
                self.slots.push(Slot {
                    generation: 0,
                    marked: false,
                    next: None,
                    cell: Some(cell),
                });
                index
            }
        };

        let slot = &mut self.slots[index as usize];
        slot.next = self.head;
        self.head = Some(index);
        self.live += 1;

        Ok(CellRef::new(index, slot.generation))
    }

    #[inline]
    fn slot(&self, r: CellRef) -> Option<&Slot> {
        self.slots
            .get(r.index() as usize)
            .filter(|slot| slot.generation == r.generation() && slot.cell.is_some())
    }

    #[inline]
    fn slot_mut(&mut self, r: CellRef) -> Option<&mut Slot> {
        self.slots
            .get_mut(r.index() as usize)
            .filter(|slot| slot.generation == r.generation() && slot.cell.is_some())
    }

    /// Look up a registered cell
    ///
    /// Returns `None` for handles whose cell has been reclaimed.
    #[inline]
    pub fn get(&self, r: CellRef) -> Option<&Cell> {
        self.slot(r).and_then(|slot| slot.cell.as_ref())
    }

    /// Mutable access to a registered cell
    #[inline]
    pub fn get_mut(&mut self, r: CellRef) -> Option<&mut Cell> {
        self.slot_mut(r).and_then(|slot| slot.cell.as_mut())
    }

    #[inline]
    pub fn contains(&self, r: CellRef) -> bool {
        self.slot(r).is_some()
    }

    /// Check the mark bit of a registered cell
    #[inline]
    pub fn is_marked(&self, r: CellRef) -> bool {
        self.slot(r).is_some_and(|slot| slot.marked)
    }

    /// Set the mark bit of `r`
    ///
    /// Returns the cell if it was unmarked before, `None` if it was already
    /// marked or is not registered.
    pub(super) fn mark(&mut self, r: CellRef) -> Option<Cell> {
        let slot = self.slot_mut(r)?;
        if slot.marked {
            return None;
        }
        slot.marked = true;
        slot.cell
    }

    /// First slot on the live list
    #[inline]
    pub(super) fn head(&self) -> Option<u32> {
        self.head
    }

    /// Successor of a live slot
    #[inline]
    pub(super) fn next_of(&self, index: u32) -> Option<u32> {
        self.slots[index as usize].next
    }

    /// Clear the mark bit of a live slot, returning whether it was set
    #[inline]
    pub(super) fn take_mark(&mut self, index: u32) -> bool {
        std::mem::replace(&mut self.slots[index as usize].marked, false)
    }

    /// Unlink the live slot `index`, whose predecessor is `prev`, and put it
    /// on the free list
    ///
    /// The successor link of `prev` is rewritten so slots after `index` stay
    /// reachable from the live list head.
    pub(super) fn release(&mut self, prev: Option<u32>, index: u32) -> Option<Cell> {
        let next = self.slots[index as usize].next;
        match prev {
            Some(p) => self.slots[p as usize].next = next,
            None => self.head = next,
        }

        let slot = &mut self.slots[index as usize];
        let cell = slot.cell.take();
        slot.marked = false;
        slot.generation = slot.generation.wrapping_add(1);
        slot.next = self.free;
        self.free = Some(index);
        self.live -= 1;
        cell
    }

    /// Iterate over live cells, most recently allocated first
    pub fn iter(&self) -> CellIterator<'_> {
        CellIterator {
            heap: self,
            cursor: self.head,
        }
    }
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new()
    }
}

/// Iterator over the live list
pub struct CellIterator<'a> {
    heap: &'a Heap,
    cursor: Option<u32>,
}

impl<'a> Iterator for CellIterator<'a> {
    type Item = (CellRef, &'a Cell);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        let slot = &self.heap.slots[index as usize];
        self.cursor = slot.next;
        let cell = slot.cell.as_ref()?;
        Some((CellRef::new(index, slot.generation), cell))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_creation() {
        let heap = Heap::new();
        assert_eq!(heap.live_count(), 0);
        assert_eq!(heap.capacity(), 0);
        assert!(heap.iter().next().is_none());
    }

    #[test]
    fn test_alloc() {
        let mut heap = Heap::new();

        let r = heap.alloc(Cell::Scalar(7)).unwrap();
        assert_eq!(heap.live_count(), 1);
        assert_eq!(heap.get(r), Some(&Cell::Scalar(7)));
        assert!(!heap.is_marked(r));
    }

    #[test]
    fn test_live_list_order() {
        let mut heap = Heap::new();

        let a = heap.alloc(Cell::Scalar(1)).unwrap();
        let b = heap.alloc(Cell::Scalar(2)).unwrap();
        let c = heap.alloc(Cell::pair(a, b)).unwrap();

        let order: Vec<_> = heap.iter().map(|(r, _)| r).collect();
        assert_eq!(order, vec![c, b, a]);
    }

    #[test]
    fn test_release_middle_keeps_list_intact() {
        let mut heap = Heap::new();

        let a = heap.alloc(Cell::Scalar(1)).unwrap();
        let b = heap.alloc(Cell::Scalar(2)).unwrap();
        let c = heap.alloc(Cell::Scalar(3)).unwrap();

        // Live list is c -> b -> a; drop b with c as predecessor.
        let freed = heap.release(Some(c.index()), b.index());
        assert_eq!(freed, Some(Cell::Scalar(2)));
        assert_eq!(heap.live_count(), 2);

        let order: Vec<_> = heap.iter().map(|(r, _)| r).collect();
        assert_eq!(order, vec![c, a]);
        assert!(heap.get(b).is_none());
    }

    #[test]
    fn test_free_slot_reuse_bumps_generation() {
        let mut heap = Heap::new();

        let a = heap.alloc(Cell::Scalar(1)).unwrap();
        heap.release(None, a.index());
        assert_eq!(heap.live_count(), 0);

        let b = heap.alloc(Cell::Scalar(2)).unwrap();
        assert_eq!(b.index(), a.index());
        assert_ne!(b.generation(), a.generation());
        assert_eq!(heap.capacity(), 1);

        // The stale handle must not see the new occupant.
        assert!(heap.get(a).is_none());
        assert_eq!(heap.get(b), Some(&Cell::Scalar(2)));
    }

    #[test]
    fn test_limit() {
        let mut heap = Heap::with_limit(Some(2));

        heap.alloc(Cell::Scalar(1)).unwrap();
        heap.alloc(Cell::Scalar(2)).unwrap();
        assert!(heap.is_full());

        let err = heap.alloc(Cell::Scalar(3)).unwrap_err();
        assert_eq!(err, AllocError::Exhausted { limit: 2 });
        assert_eq!(heap.live_count(), 2);
    }

    #[test]
    fn test_mark_bit() {
        let mut heap = Heap::new();
        let r = heap.alloc(Cell::Scalar(1)).unwrap();

        assert_eq!(heap.mark(r), Some(Cell::Scalar(1)));
        assert!(heap.is_marked(r));
        // Second mark reports nothing new.
        assert_eq!(heap.mark(r), None);

        assert!(heap.take_mark(r.index()));
        assert!(!heap.is_marked(r));
    }
}
