use std::fmt;

use crate::runtime::{errors::RuntimeError, vm::VM};

/// A native entry point.
///
/// Arguments sit on the work-stack of the frame pushed for the call (see
/// `VM::args`); the function pushes exactly one result with `VM::push`.
pub type NativeFn = fn(&mut VM) -> Result<(), RuntimeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Min(usize),
}

impl Arity {
    pub fn is_satisfied(&self, len: usize) -> bool {
        match self {
            Self::Exact(e) => *e == len,
            Self::Min(m) => *m <= len,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(n) => write!(f, "{n}"),
            Self::Min(n) => write!(f, "at least {n}"),
        }
    }
}

#[derive(Clone, Copy)]
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: Arity,
    pub func: NativeFn,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

impl PartialEq for NativeFunction {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
