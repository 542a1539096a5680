//! Heap cell representation
//!
//! Every heap object is a [`Cell`]: either a scalar integer or a pair of
//! references to other cells. Cells never hold raw pointers; references are
//! [`CellRef`] handles into the registry arena.

use std::fmt;

/// Handle to a registered cell
///
/// A handle is a slot index plus the generation the slot had when the cell
/// was allocated. Once the cell is reclaimed its slot generation is bumped,
/// so an old handle can never resolve to a recycled slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRef {
    index: u32,
    generation: u32,
}

impl CellRef {
    #[inline]
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        CellRef { index, generation }
    }

    /// Slot index in the registry arena
    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Slot generation this handle was issued for
    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)?;
        if self.generation > 0 {
            write!(f, "/{}", self.generation)?;
        }
        Ok(())
    }
}

/// Kind of a cell, without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Scalar,
    Pair,
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellKind::Scalar => f.write_str("scalar"),
            CellKind::Pair => f.write_str("pair"),
        }
    }
}

/// A heap object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    /// Integer payload, no outgoing references
    Scalar(i32),
    /// Two outgoing references
    Pair { first: CellRef, second: CellRef },
}

impl Cell {
    /// Create a pair cell
    #[inline]
    pub const fn pair(first: CellRef, second: CellRef) -> Self {
        Cell::Pair { first, second }
    }

    #[inline]
    pub const fn kind(&self) -> CellKind {
        match self {
            Cell::Scalar(_) => CellKind::Scalar,
            Cell::Pair { .. } => CellKind::Pair,
        }
    }

    /// Get the integer payload of a scalar
    #[inline]
    pub const fn as_scalar(&self) -> Option<i32> {
        match *self {
            Cell::Scalar(v) => Some(v),
            Cell::Pair { .. } => None,
        }
    }

    /// Get the `(first, second)` references of a pair
    #[inline]
    pub const fn as_pair(&self) -> Option<(CellRef, CellRef)> {
        match *self {
            Cell::Pair { first, second } => Some((first, second)),
            Cell::Scalar(_) => None,
        }
    }

    /// Outgoing references, in field order
    pub fn children(&self) -> impl Iterator<Item = CellRef> {
        self.as_pair()
            .into_iter()
            .flat_map(|(first, second)| [first, second])
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Scalar(v) => write!(f, "{}", v),
            Cell::Pair { first, second } => write!(f, "({} . {})", first, second),
        }
    }
}
