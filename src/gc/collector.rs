//! Mark-sweep garbage collector
//!
//! A cycle runs three steps on the allocating thread, start to finish:
//! 1. Mark: walk every cell reachable from the root set, set its mark bit
//! 2. Sweep: unlink every unmarked cell from the registry, clear surviving marks
//! 3. Threshold update: the next cycle triggers at twice the survivor count
//!
//! Marking uses an explicit work list instead of recursion, so deep pair
//! chains cannot exhaust the native stack.

use super::allocator::Heap;
use crate::value::CellRef;
use log::{debug, trace};

/// Log target for collector events
pub const LOG_TARGET: &str = "babygc::gc";

/// Collector state
///
/// `Idle` is the only state observable from outside a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GcPhase {
    #[default]
    Idle,
    Marking,
    Sweeping,
    ThresholdUpdate,
}

/// Result of one collection cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CollectionReport {
    /// Cells registered when the cycle started
    pub live_before: usize,
    /// Cells reclaimed by the sweep
    pub freed: usize,
    /// Cells surviving the sweep
    pub live_after: usize,
    /// Threshold for the next automatic cycle
    pub next_threshold: usize,
}

/// Cumulative collector statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GcStats {
    /// Completed collection cycles
    pub collections: u64,
    /// Cells ever allocated
    pub total_allocated: u64,
    /// Cells ever reclaimed
    pub total_freed: u64,
    /// Cells reclaimed by the most recent cycle
    pub last_freed: usize,
    /// Highest live count observed
    pub peak_live: usize,
}

impl GcStats {
    /// Record a successful allocation
    pub(crate) fn record_alloc(&mut self, live: usize) {
        self.total_allocated += 1;
        self.peak_live = self.peak_live.max(live);
    }

    /// Record a completed cycle
    pub(crate) fn record_cycle(&mut self, report: &CollectionReport) {
        self.collections += 1;
        self.total_freed += report.freed as u64;
        self.last_freed = report.freed;
    }
}

/// Collection driver and threshold controller
///
/// Owns the trigger threshold and the cumulative statistics. The threshold is
/// only ever written at the end of a cycle.
#[derive(Debug, Clone)]
pub struct Collector {
    phase: GcPhase,
    threshold: usize,
    stats: GcStats,
}

impl Collector {
    pub fn new(initial_threshold: usize) -> Self {
        Collector {
            phase: GcPhase::Idle,
            threshold: initial_threshold,
            stats: GcStats::default(),
        }
    }

    /// Live count at which the next allocation triggers a cycle
    #[inline]
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    #[inline]
    pub fn phase(&self) -> GcPhase {
        self.phase
    }

    #[inline]
    pub fn stats(&self) -> &GcStats {
        &self.stats
    }

    /// Whether an allocation made with `live` cells registered must first
    /// run a cycle
    #[inline]
    pub fn should_collect(&self, live: usize) -> bool {
        cfg!(feature = "debug-gc") || live >= self.threshold
    }

    pub(crate) fn record_alloc(&mut self, live: usize) {
        self.stats.record_alloc(live);
    }

    /// Run a full collection cycle against `roots`
    pub fn run(&mut self, heap: &mut Heap, roots: &[CellRef]) -> CollectionReport {
        debug_assert_eq!(self.phase, GcPhase::Idle, "collection is not reentrant");

        let live_before = heap.live_count();
        debug!(
            target: LOG_TARGET,
            "cycle {} start: {} roots, {} live, threshold {}",
            self.stats.collections + 1,
            roots.len(),
            live_before,
            self.threshold
        );

        self.phase = GcPhase::Marking;
        let marked = mark_all(heap, roots);

        self.phase = GcPhase::Sweeping;
        let freed = sweep(heap);
        let live_after = heap.live_count();

        self.phase = GcPhase::ThresholdUpdate;
        self.threshold = next_threshold(live_after);

        let report = CollectionReport {
            live_before,
            freed,
            live_after,
            next_threshold: self.threshold,
        };
        self.stats.record_cycle(&report);
        self.phase = GcPhase::Idle;

        debug!(
            target: LOG_TARGET,
            "cycle end: {} marked, {} freed, {} live, next threshold {}",
            marked, freed, live_after, self.threshold
        );

        report
    }
}

impl Default for Collector {
    fn default() -> Self {
        Collector::new(crate::config::DEFAULT_THRESHOLD)
    }
}

/// Mark every cell reachable from `roots`
///
/// Returns the number of cells newly marked. A cell already marked is never
/// pushed again, which bounds the walk and makes cycles safe.
pub fn mark_all(heap: &mut Heap, roots: &[CellRef]) -> usize {
    let mut worklist: Vec<CellRef> = Vec::with_capacity(roots.len());
    let mut marked = 0;

    // Roots are walked in stack order so the first root is traced first.
    for &root in roots {
        worklist.push(root);

        while let Some(r) = worklist.pop() {
            let Some(cell) = heap.mark(r) else {
                continue;
            };
            marked += 1;

            // Push `second` first so `first` is visited first.
            if let Some((first, second)) = cell.as_pair() {
                if !heap.is_marked(second) {
                    worklist.push(second);
                }
                if !heap.is_marked(first) {
                    worklist.push(first);
                }
            }
        }
    }

    marked
}

/// Reclaim every unmarked cell and clear the mark on survivors
///
/// Returns the number of cells reclaimed.
pub fn sweep(heap: &mut Heap) -> usize {
    let mut freed = 0;
    let mut prev: Option<u32> = None;
    let mut cursor = heap.head();

    while let Some(index) = cursor {
        // Read the successor before `release` relinks the slot.
        let next = heap.next_of(index);

        if heap.take_mark(index) {
            prev = Some(index);
        } else {
            let cell = heap.release(prev, index);
            trace!(target: LOG_TARGET, "reclaimed slot {}: {:?}", index, cell);
            freed += 1;
        }

        cursor = next;
    }

    freed
}

/// Threshold for the next automatic cycle given the survivor count
#[inline]
pub const fn next_threshold(survivors: usize) -> usize {
    survivors.saturating_mul(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Cell;

    fn collect(heap: &mut Heap, roots: &[CellRef]) -> CollectionReport {
        Collector::new(0).run(heap, roots)
    }

    #[test]
    fn test_collect_empty_heap() {
        let mut heap = Heap::new();
        let report = collect(&mut heap, &[]);

        assert_eq!(report, CollectionReport::default());
    }

    #[test]
    fn test_collect_without_roots_frees_everything() {
        let mut heap = Heap::new();
        let a = heap.alloc(Cell::Scalar(1)).unwrap();
        let b = heap.alloc(Cell::Scalar(2)).unwrap();
        heap.alloc(Cell::pair(a, b)).unwrap();

        let report = collect(&mut heap, &[]);
        assert_eq!(report.live_before, 3);
        assert_eq!(report.freed, 3);
        assert_eq!(report.live_after, 0);
        assert_eq!(report.next_threshold, 0);
        assert!(heap.iter().next().is_none());
    }

    #[test]
    fn test_mark_follows_pairs() {
        let mut heap = Heap::new();
        let a = heap.alloc(Cell::Scalar(1)).unwrap();
        let b = heap.alloc(Cell::Scalar(2)).unwrap();
        let p = heap.alloc(Cell::pair(a, b)).unwrap();
        let garbage = heap.alloc(Cell::Scalar(3)).unwrap();

        assert_eq!(mark_all(&mut heap, &[p]), 3);
        assert!(heap.is_marked(a));
        assert!(heap.is_marked(b));
        assert!(heap.is_marked(p));
        assert!(!heap.is_marked(garbage));
    }

    #[test]
    fn test_mark_shared_child_once() {
        let mut heap = Heap::new();
        let a = heap.alloc(Cell::Scalar(1)).unwrap();
        let p = heap.alloc(Cell::pair(a, a)).unwrap();

        // Duplicate roots and a doubly referenced child are each counted once.
        assert_eq!(mark_all(&mut heap, &[p, p, a]), 2);
    }

    #[test]
    fn test_mark_cycle_terminates() {
        let mut heap = Heap::new();
        let a = heap.alloc(Cell::Scalar(1)).unwrap();
        let p = heap.alloc(Cell::pair(a, a)).unwrap();
        let q = heap.alloc(Cell::pair(p, a)).unwrap();
        *heap.get_mut(p).unwrap() = Cell::pair(q, q);

        assert_eq!(mark_all(&mut heap, &[q]), 3);
    }

    #[test]
    fn test_sweep_clears_marks_on_survivors() {
        let mut heap = Heap::new();
        let keep = heap.alloc(Cell::Scalar(1)).unwrap();
        let garbage = heap.alloc(Cell::Scalar(2)).unwrap();

        mark_all(&mut heap, &[keep]);
        assert_eq!(sweep(&mut heap), 1);

        assert!(heap.contains(keep));
        assert!(!heap.contains(garbage));
        assert!(!heap.is_marked(keep));
    }

    #[test]
    fn test_sweep_interleaved_survivors() {
        let mut heap = Heap::new();
        let cells: Vec<_> = (0..10)
            .map(|i| heap.alloc(Cell::Scalar(i)).unwrap())
            .collect();
        let roots: Vec<_> = cells.iter().copied().step_by(2).collect();

        let report = collect(&mut heap, &roots);
        assert_eq!(report.freed, 5);
        assert_eq!(report.live_after, 5);
        assert_eq!(report.next_threshold, 10);

        for (i, r) in cells.iter().enumerate() {
            assert_eq!(heap.contains(*r), i % 2 == 0);
        }
        assert_eq!(heap.iter().count(), 5);
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        let mut heap = Heap::new();
        let mut tail = heap.alloc(Cell::Scalar(0)).unwrap();
        for _ in 0..100_000 {
            let leaf = heap.alloc(Cell::Scalar(1)).unwrap();
            tail = heap.alloc(Cell::pair(leaf, tail)).unwrap();
        }

        let report = collect(&mut heap, &[tail]);
        assert_eq!(report.freed, 0);
        assert_eq!(report.live_after, 200_001);
    }

    #[test]
    fn test_next_threshold() {
        assert_eq!(next_threshold(0), 0);
        assert_eq!(next_threshold(1), 2);
        assert_eq!(next_threshold(128), 256);
        assert_eq!(next_threshold(usize::MAX), usize::MAX);
    }

    #[test]
    fn test_collector_updates_threshold_and_stats() {
        let mut heap = Heap::new();
        let keep = heap.alloc(Cell::Scalar(1)).unwrap();
        heap.alloc(Cell::Scalar(2)).unwrap();
        heap.alloc(Cell::Scalar(3)).unwrap();

        let mut collector = Collector::new(3);
        assert!(collector.should_collect(heap.live_count()));

        let report = collector.run(&mut heap, &[keep]);
        assert_eq!(report.freed, 2);
        assert_eq!(collector.threshold(), 2);
        assert_eq!(collector.phase(), GcPhase::Idle);
        assert_eq!(collector.stats().collections, 1);
        assert_eq!(collector.stats().total_freed, 2);
        assert_eq!(collector.stats().last_freed, 2);
    }

    #[test]
    fn test_zero_threshold_always_triggers() {
        let collector = Collector::new(0);
        assert!(collector.should_collect(0));
        assert!(collector.should_collect(1));
    }

    #[test]
    fn test_stats_record() {
        let mut stats = GcStats::default();
        stats.record_alloc(1);
        stats.record_alloc(2);
        stats.record_cycle(&CollectionReport {
            live_before: 2,
            freed: 1,
            live_after: 1,
            next_threshold: 2,
        });

        assert_eq!(stats.collections, 1);
        assert_eq!(stats.total_allocated, 2);
        assert_eq!(stats.total_freed, 1);
        assert_eq!(stats.last_freed, 1);
        assert_eq!(stats.peak_live, 2);
    }
}
