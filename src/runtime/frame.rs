use std::rc::Rc;

use crate::runtime::{compiled_function::FunctionInfo, gc::CellRef, module::ModuleId};

/// One activation on the VM call stack.
///
/// Frames without `code` are either the bottom driver frame or the frame
/// pushed around a native call; the run loop never dispatches in them.
#[derive(Debug, Clone)]
pub struct Frame {
    pub stack: Vec<CellRef>,
    pub variables: Vec<CellRef>,
    pub code: Option<Rc<FunctionInfo>>,
    pub pc: usize,
    pub module: ModuleId,
    /// Name of the native running in this frame, if any.
    pub native: Option<&'static str>,
}

impl Frame {
    /// A code-less frame whose work-stack starts as `stack`.
    pub fn bare(module: ModuleId, stack: Vec<CellRef>) -> Self {
        Self {
            stack,
            variables: Vec::new(),
            code: None,
            pc: 0,
            module,
            native: None,
        }
    }

    pub fn for_native(name: &'static str, module: ModuleId, args: Vec<CellRef>) -> Self {
        Self {
            native: Some(name),
            ..Self::bare(module, args)
        }
    }

    pub fn for_function(info: Rc<FunctionInfo>, module: ModuleId, variables: Vec<CellRef>) -> Self {
        Self {
            stack: Vec::with_capacity(8),
            variables,
            code: Some(info),
            pc: 0,
            module,
            native: None,
        }
    }

    /// Every cell this frame keeps alive.
    pub fn roots(&self) -> impl Iterator<Item = CellRef> + '_ {
        let code = self.code.iter().flat_map(|info| {
            [info.name, info.module]
                .into_iter()
                .chain(info.constants.iter().copied())
        });
        self.stack
            .iter()
            .copied()
            .chain(self.variables.iter().copied())
            .chain(code)
    }
}
