use std::fmt;

/// Handle to a heap cell.
///
/// A `CellRef` is a lightweight, copyable index into the arena-backed cell heap.
/// Index `0` is never handed out by the allocator: it is the distinguished null
/// reference (the empty list), so `CellRef::NULL` never names a heap cell.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct CellRef(pub(crate) u32);

impl CellRef {
    /// The null value / empty list.
    pub const NULL: CellRef = CellRef(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Position of the cell across all arenas (arena-major), if it is a heap cell.
    pub(crate) fn slot(self) -> Option<usize> {
        (self.0 as usize).checked_sub(1)
    }

    pub(crate) fn from_slot(slot: usize) -> Self {
        CellRef(slot as u32 + 1)
    }

    /// Returns the raw handle value backing this reference.
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "CellRef(null)")
        } else {
            write!(f, "CellRef({})", self.0)
        }
    }
}
