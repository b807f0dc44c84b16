use std::fmt::Write;

use crate::runtime::{
    gc::{CellRef, GcHeap},
    module::ModuleRegistry,
    symbol_table::SymbolTable,
    value::{CellKind, Scalar},
};

/// Renders cells back into reader syntax. Callables and modules print as
/// opaque `#<...>` objects.
pub struct Printer<'a> {
    heap: &'a GcHeap,
    symbols: &'a SymbolTable,
    modules: &'a ModuleRegistry,
}

impl<'a> Printer<'a> {
    pub fn new(heap: &'a GcHeap, symbols: &'a SymbolTable, modules: &'a ModuleRegistry) -> Self {
        Self {
            heap,
            symbols,
            modules,
        }
    }

    pub fn display(&self, cell: CellRef) -> String {
        let mut out = String::new();
        self.write_cell(&mut out, cell);
        out
    }

    fn write_cell(&self, out: &mut String, cell: CellRef) {
        if cell.is_null() {
            out.push_str("()");
            return;
        }
        match self.heap.kind(cell) {
            None => out.push_str("#<invalid>"),
            Some(CellKind::Free { .. }) => out.push_str("#<free>"),
            Some(CellKind::Pair { .. }) => self.write_list(out, cell),
            Some(CellKind::Scalar(scalar)) => self.write_scalar(out, scalar),
        }
    }

    fn write_list(&self, out: &mut String, mut cell: CellRef) {
        out.push('(');
        let mut first = true;
        while let Some(CellKind::Pair { car, cdr }) = self.heap.kind(cell) {
            if !first {
                out.push(' ');
            }
            first = false;
            self.write_cell(out, *car);
            cell = *cdr;
        }
        if !cell.is_null() {
            out.push_str(" . ");
            self.write_cell(out, cell);
        }
        out.push(')');
    }

    fn write_scalar(&self, out: &mut String, scalar: &Scalar) {
        match scalar {
            Scalar::Integer(value) => {
                let _ = write!(out, "{value}");
            }
            Scalar::Symbol(spur) => out.push_str(self.symbols.resolve(*spur)),
            Scalar::NativeFunction(native) => {
                let _ = write!(out, "#<native {}>", native.name);
            }
            Scalar::Function(info) => {
                let _ = write!(out, "#<function {}>", self.name_or_anonymous(info.name));
            }
            Scalar::Macro(info) => {
                let _ = write!(out, "#<macro {}>", self.name_or_anonymous(info.name));
            }
            Scalar::Module(id) => {
                let name = self.modules.get(*id).name;
                let _ = write!(out, "#<module {}>", self.name_or_anonymous(name));
            }
        }
    }

    fn name_or_anonymous(&self, name: CellRef) -> &str {
        self.symbols
            .name_of(self.heap, name)
            .unwrap_or("anonymous")
    }
}
