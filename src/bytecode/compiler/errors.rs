use crate::runtime::{errors::RuntimeError, gc::CellRef, gc::HeapError};

use super::Compiler;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("{context} must be a symbol, got {form}")]
    NonSymbolName { context: &'static str, form: String },
    #[error("improper {context}: {form}")]
    ImproperList { context: &'static str, form: String },
    #[error("malformed {special}: {form}")]
    MalformedSpecialForm { special: &'static str, form: String },
    #[error("malformed definition: {0}")]
    MalformedDefinition(String),
    #[error("{what} operand {index} does not fit in a 16-bit word")]
    OperandOverflow { what: &'static str, index: usize },
    #[error("expanding macro {name} failed: {source}")]
    MacroExpansion {
        name: String,
        #[source]
        source: RuntimeError,
    },
    #[error("macro expansion nested deeper than {0} levels")]
    MacroRecursion(usize),
    #[error(transparent)]
    Heap(#[from] HeapError),
}

impl Compiler<'_> {
    pub(super) fn non_symbol_error(&self, context: &'static str, form: CellRef) -> CompileError {
        CompileError::NonSymbolName {
            context,
            form: self.vm.display(form),
        }
    }

    pub(super) fn improper_list_error(&self, context: &'static str, form: CellRef) -> CompileError {
        CompileError::ImproperList {
            context,
            form: self.vm.display(form),
        }
    }

    pub(super) fn malformed_error(&self, special: &'static str, form: CellRef) -> CompileError {
        CompileError::MalformedSpecialForm {
            special,
            form: self.vm.display(form),
        }
    }
}
