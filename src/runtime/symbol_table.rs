use std::collections::HashMap;

use lasso::{Rodeo, Spur};

use crate::runtime::{
    gc::{CellRef, GcHeap, HeapError},
    value::Scalar,
};

/// Names the compiler and top-level loop recognise by identity.
#[derive(Debug, Clone, Copy)]
pub struct Keywords {
    pub quote: Spur,
    pub if_: Spur,
    pub let_: Spur,
    pub rest: Spur,
    pub defun: Spur,
    pub defmacro: Spur,
    pub defvar: Spur,
    pub module: Spur,
    pub t: Spur,
    pub user: Spur,
}

/// Process-wide symbol table.
///
/// Names are interned into a `lasso` arena; each distinct name owns exactly one
/// symbol cell, so symbol equality is cell identity. Every cell recorded here is
/// a GC root for the lifetime of the table.
pub struct SymbolTable {
    names: Rodeo,
    cells: HashMap<Spur, CellRef>,
    keywords: Keywords,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut names = Rodeo::default();
        let keywords = Keywords {
            quote: names.get_or_intern_static("quote"),
            if_: names.get_or_intern_static("if"),
            let_: names.get_or_intern_static("let"),
            rest: names.get_or_intern_static("&rest"),
            defun: names.get_or_intern_static("defun"),
            defmacro: names.get_or_intern_static("defmacro"),
            defvar: names.get_or_intern_static("defvar"),
            module: names.get_or_intern_static("module"),
            t: names.get_or_intern_static("t"),
            user: names.get_or_intern_static("user"),
        };
        Self {
            names,
            cells: HashMap::new(),
            keywords,
        }
    }

    pub fn keywords(&self) -> &Keywords {
        &self.keywords
    }

    /// Returns the unique symbol cell for `name`, allocating it on first use.
    pub fn intern(&mut self, heap: &mut GcHeap, name: &str) -> Result<CellRef, HeapError> {
        let spur = self.names.get_or_intern(name);
        self.intern_spur(heap, spur)
    }

    pub fn intern_spur(&mut self, heap: &mut GcHeap, spur: Spur) -> Result<CellRef, HeapError> {
        if let Some(cell) = self.cells.get(&spur) {
            return Ok(*cell);
        }
        let cell = heap.alloc_scalar(Scalar::Symbol(spur))?;
        self.cells.insert(spur, cell);
        Ok(cell)
    }

    /// Looks a name up without interning it.
    pub fn lookup(&self, name: &str) -> Option<CellRef> {
        let spur = self.names.get(name)?;
        self.cells.get(&spur).copied()
    }

    pub fn resolve(&self, spur: Spur) -> &str {
        self.names.resolve(&spur)
    }

    /// Name of a symbol cell, or `None` when `cell` is not a symbol.
    pub fn name_of<'a>(&'a self, heap: &GcHeap, cell: CellRef) -> Option<&'a str> {
        heap.as_symbol(cell).map(|spur| self.names.resolve(&spur))
    }

    /// Returns `true` when `cell` is the symbol whose name was interned as `spur`.
    pub fn is(&self, heap: &GcHeap, cell: CellRef, spur: Spur) -> bool {
        heap.as_symbol(cell) == Some(spur)
    }

    /// Symbol cells, for root enumeration.
    pub fn cells(&self) -> impl Iterator<Item = CellRef> + '_ {
        self.cells.values().copied()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::SymbolTable;
    use crate::runtime::gc::GcHeap;

    #[test]
    fn equal_names_are_identical_cells() {
        let mut heap = GcHeap::new();
        let mut symbols = SymbolTable::new();
        let a = symbols.intern(&mut heap, "foo").unwrap();
        let b = symbols.intern(&mut heap, "foo").unwrap();
        let c = symbols.intern(&mut heap, "bar").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(symbols.name_of(&heap, a), Some("foo"));
        assert_eq!(symbols.lookup("bar"), Some(c));
        assert_eq!(symbols.lookup("baz"), None);
        assert_eq!(heap.live_count(), 2);
    }

    #[test]
    fn keywords_match_interned_cells() {
        let mut heap = GcHeap::new();
        let mut symbols = SymbolTable::new();
        let quote = symbols.intern(&mut heap, "quote").unwrap();
        let quote_spur = symbols.keywords().quote;
        assert!(symbols.is(&heap, quote, quote_spur));
        let if_spur = symbols.keywords().if_;
        assert!(!symbols.is(&heap, quote, if_spur));
    }

    #[test]
    fn symbols_survive_collection_when_rooted() {
        let mut heap = GcHeap::new();
        let mut symbols = SymbolTable::new();
        let sym = symbols.intern(&mut heap, "kept").unwrap();
        heap.integer(1).unwrap();

        let roots: Vec<_> = symbols.cells().collect();
        heap.collect(roots);
        assert_eq!(heap.live_count(), 1);
        assert_eq!(symbols.name_of(&heap, sym), Some("kept"));
    }
}
