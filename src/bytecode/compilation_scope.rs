use crate::{bytecode::op_code::Instructions, runtime::gc::CellRef};

/// Compile-time state for one function body.
///
/// Slots are positions in the flat list `arguments ++ variables`. Locals are
/// appended as `let` forms are entered and blanked (never removed) when the
/// `let` ends, so a slot number is never handed out twice within a function.
#[derive(Debug, Clone, Default)]
pub struct CompilationScope {
    pub arguments: Vec<CellRef>,
    pub has_rest: bool,
    pub variables: Vec<Option<CellRef>>,
    pub constants: Vec<CellRef>,
    pub instructions: Instructions,
}

impl CompilationScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Innermost binding of `name`: live locals newest first, then parameters.
    pub fn resolve(&self, name: CellRef) -> Option<usize> {
        self.variables
            .iter()
            .rposition(|slot| *slot == Some(name))
            .map(|position| self.arguments.len() + position)
            .or_else(|| self.arguments.iter().position(|arg| *arg == name))
    }

    pub fn bind_local(&mut self, name: CellRef) -> usize {
        self.variables.push(Some(name));
        self.arguments.len() + self.variables.len() - 1
    }

    /// Ends the extent of every local bound since `mark`.
    pub fn release(&mut self, mark: usize) {
        for slot in self.variables.iter_mut().skip(mark) {
            *slot = None;
        }
    }

    pub fn local_mark(&self) -> usize {
        self.variables.len()
    }

    /// Fixed parameters, not counting the rest slot.
    pub fn param_count(&self) -> usize {
        self.arguments.len() - usize::from(self.has_rest)
    }

    pub fn slot_count(&self) -> usize {
        self.arguments.len() + self.variables.len()
    }

    /// Index of `cell` in the constant pool, appending it if absent.
    pub fn add_constant(&mut self, cell: CellRef) -> usize {
        match self.constants.iter().position(|c| *c == cell) {
            Some(index) => index,
            None => {
                self.constants.push(cell);
                self.constants.len() - 1
            }
        }
    }
}
