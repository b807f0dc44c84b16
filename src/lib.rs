pub mod bytecode;
pub mod runtime;
pub mod syntax;

pub use runtime::{
    config::VmConfig,
    errors::{EvalError, RuntimeError},
    gc::{CellRef, GcHeap, GcStats},
    vm::VM,
};
