use std::{fmt, rc::Rc};

use lasso::Spur;

use crate::runtime::{
    builtin_function::NativeFunction, compiled_function::FunctionInfo, gc::CellRef,
    module::ModuleId,
};

/// Type tag of a scalar cell.
///
/// Pairs carry no tag at all; the null reference reports `Tag::Null` and a
/// reclaimed cell sitting on the free list reports `Tag::Free`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    Null = 0,
    Integer = 1,
    Symbol = 2,
    NativeFunction = 3,
    Function = 4,
    Macro = 5,
    Module = 6,
    Free = 7,
}

impl Tag {
    /// User-visible type label, used in diagnostics and by natives.
    pub fn type_name(self) -> &'static str {
        match self {
            Tag::Null => "null",
            Tag::Integer => "integer",
            Tag::Symbol => "symbol",
            Tag::NativeFunction => "native-function",
            Tag::Function => "function",
            Tag::Macro => "macro",
            Tag::Module => "module",
            Tag::Free => "free",
        }
    }

    pub const ALL: [Tag; 8] = [
        Tag::Null,
        Tag::Integer,
        Tag::Symbol,
        Tag::NativeFunction,
        Tag::Function,
        Tag::Macro,
        Tag::Module,
        Tag::Free,
    ];
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Payload of a tagged (non-pair) cell.
///
/// The variant is the tag; the data it carries is either inline (integers,
/// interned names, module ids) or an out-of-band record shared by `Rc`.
#[derive(Debug, Clone)]
pub enum Scalar {
    Integer(i64),
    Symbol(Spur),
    NativeFunction(NativeFunction),
    Function(Rc<FunctionInfo>),
    Macro(Rc<FunctionInfo>),
    Module(ModuleId),
}

impl Scalar {
    pub fn tag(&self) -> Tag {
        match self {
            Scalar::Integer(_) => Tag::Integer,
            Scalar::Symbol(_) => Tag::Symbol,
            Scalar::NativeFunction(_) => Tag::NativeFunction,
            Scalar::Function(_) => Tag::Function,
            Scalar::Macro(_) => Tag::Macro,
            Scalar::Module(_) => Tag::Module,
        }
    }

    /// Compiled code record for functions and macros.
    pub fn function_info(&self) -> Option<&Rc<FunctionInfo>> {
        match self {
            Scalar::Function(info) | Scalar::Macro(info) => Some(info),
            _ => None,
        }
    }
}

/// Contents of one heap cell.
#[derive(Debug, Clone)]
pub enum CellKind {
    /// A cons cell; both halves are genuine references (or null).
    Pair { car: CellRef, cdr: CellRef },
    Scalar(Scalar),
    /// Reclaimed cell, threaded onto the allocator's free list.
    Free { next: CellRef },
}

impl CellKind {
    pub fn is_pair(&self) -> bool {
        matches!(self, CellKind::Pair { .. })
    }

    /// Tag of a scalar or free cell. Pairs have no tag.
    pub fn tag(&self) -> Option<Tag> {
        match self {
            CellKind::Pair { .. } => None,
            CellKind::Scalar(scalar) => Some(scalar.tag()),
            CellKind::Free { .. } => Some(Tag::Free),
        }
    }
}
