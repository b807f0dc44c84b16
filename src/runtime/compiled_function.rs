use crate::{bytecode::op_code::Instructions, runtime::gc::CellRef};

/// Compiled code shared by function and macro cells.
///
/// `slot_count` covers parameters, the rest slot and every `let` local, so a
/// frame's variable array can be sized once at call time.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionInfo {
    /// Name symbol, or null for anonymous top-level code.
    pub name: CellRef,
    pub param_count: usize,
    pub has_rest: bool,
    pub slot_count: usize,
    pub constants: Vec<CellRef>,
    pub instructions: Instructions,
    /// The owning module's cell.
    pub module: CellRef,
}

impl FunctionInfo {
    pub fn accepts(&self, argc: usize) -> bool {
        if self.has_rest {
            argc >= self.param_count
        } else {
            argc == self.param_count
        }
    }

    pub fn arity_label(&self) -> String {
        if self.has_rest {
            format!("at least {}", self.param_count)
        } else {
            self.param_count.to_string()
        }
    }
}
