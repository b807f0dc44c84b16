use crate::{
    bytecode::compiler::errors::CompileError,
    runtime::gc::HeapError,
    syntax::reader::ReadError,
};

/// Failure while executing bytecode or a native function.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    #[error("unbound value: {0}")]
    UnboundValue(String),
    #[error("unbound function: {0}")]
    UnboundFunction(String),
    #[error("wrong number of arguments to {name}: want={expected}, got={got}")]
    WrongArity {
        name: String,
        expected: String,
        got: usize,
    },
    #[error("not a function: {0}")]
    NotCallable(String),
    #[error("macro {0} cannot be called at run time")]
    MacroCall(String),
    #[error("stack overflow: frame limit of {0} reached")]
    StackOverflow(usize),
    #[error("stack underflow")]
    StackUnderflow,
    #[error("return with no caller frame")]
    ReturnFromTopLevel,
    #[error("{0} returned without a value")]
    EmptyReturn(String),
    #[error("{function}: expected {expected}, got {found}")]
    TypeError {
        function: &'static str,
        expected: &'static str,
        found: String,
    },
    #[error("unknown opcode {opcode} at {pc:04}")]
    UnknownOpcode { opcode: u16, pc: usize },
    #[error("truncated instruction at {pc:04}")]
    TruncatedInstruction { pc: usize },
    #[error("{op} operand {operand} out of range at {pc:04}")]
    InvalidOperand {
        op: &'static str,
        operand: usize,
        pc: usize,
    },
    #[error("integer overflow in {0}")]
    IntegerOverflow(&'static str),
    #[error(transparent)]
    Heap(#[from] HeapError),
}

/// Everything that can end the evaluation of one top-level form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("read error: {0}")]
    Read(#[from] ReadError),
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

impl From<HeapError> for EvalError {
    fn from(err: HeapError) -> Self {
        EvalError::Runtime(RuntimeError::Heap(err))
    }
}
