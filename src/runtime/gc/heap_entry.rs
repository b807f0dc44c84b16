use crate::runtime::value::{CellKind, Scalar};

/// One slot of an arena: the cell contents plus its mark flag.
///
/// The mark flag is kept beside the contents rather than packed into them, so
/// marking and unmarking never disturb the cell's kind or payload.
#[derive(Debug, Clone)]
pub struct HeapEntry {
    pub(crate) kind: CellKind,
    pub(crate) marked: bool,
}

impl HeapEntry {
    pub(crate) fn new(kind: CellKind) -> Self {
        Self {
            kind,
            marked: false,
        }
    }

    pub fn kind(&self) -> &CellKind {
        &self.kind
    }

    pub fn is_free(&self) -> bool {
        matches!(self.kind, CellKind::Free { .. })
    }

    pub fn is_marked(&self) -> bool {
        self.marked
    }

    /// Rewrites the cell as a scalar. A freshly written tag is always unmarked.
    pub(crate) fn set_scalar(&mut self, scalar: Scalar) {
        self.kind = CellKind::Scalar(scalar);
        self.marked = false;
    }
}
