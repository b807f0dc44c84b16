use std::collections::HashMap;

use crate::runtime::{
    gc::{CellRef, GcHeap, HeapError},
    value::Scalar,
};

/// Index of a module in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub usize);

/// A named pair of symbol-keyed namespaces.
///
/// Values and functions live in separate maps, so `x` may name a variable
/// and a function at the same time.
#[derive(Debug, Clone)]
pub struct Module {
    pub id: ModuleId,
    pub name: CellRef,
    /// The module's own heap cell (tag `module`).
    pub cell: CellRef,
    pub values: HashMap<CellRef, CellRef>,
    pub functions: HashMap<CellRef, CellRef>,
}

impl Module {
    pub fn value(&self, symbol: CellRef) -> Option<CellRef> {
        self.values.get(&symbol).copied()
    }

    pub fn function(&self, symbol: CellRef) -> Option<CellRef> {
        self.functions.get(&symbol).copied()
    }

    pub fn define_value(&mut self, symbol: CellRef, value: CellRef) -> Option<CellRef> {
        self.values.insert(symbol, value)
    }

    pub fn define_function(&mut self, symbol: CellRef, function: CellRef) -> Option<CellRef> {
        self.functions.insert(symbol, function)
    }

    fn roots(&self) -> impl Iterator<Item = CellRef> + '_ {
        [self.name, self.cell]
            .into_iter()
            .chain(self.values.iter().flat_map(|(k, v)| [*k, *v]))
            .chain(self.functions.iter().flat_map(|(k, v)| [*k, *v]))
    }
}

/// Every module ever created. Modules are never removed.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: Vec<Module>,
    by_name: HashMap<CellRef, ModuleId>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, name: CellRef) -> Option<ModuleId> {
        self.by_name.get(&name).copied()
    }

    /// Creates an empty module named by the symbol `name`.
    ///
    /// Callers check `find` first; creating a module twice shadows the first
    /// in the name index.
    pub fn create(&mut self, heap: &mut GcHeap, name: CellRef) -> Result<ModuleId, HeapError> {
        let id = ModuleId(self.modules.len());
        let cell = heap.alloc_scalar(Scalar::Module(id))?;
        self.modules.push(Module {
            id,
            name,
            cell,
            values: HashMap::new(),
            functions: HashMap::new(),
        });
        self.by_name.insert(name, id);
        Ok(id)
    }

    pub fn get(&self, id: ModuleId) -> &Module {
        &self.modules[id.0]
    }

    pub fn get_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Names, module cells, and both sides of every binding.
    pub fn roots(&self) -> impl Iterator<Item = CellRef> + '_ {
        self.modules.iter().flat_map(Module::roots)
    }
}

#[cfg(test)]
mod tests {
    use super::ModuleRegistry;
    use crate::runtime::{gc::GcHeap, symbol_table::SymbolTable, value::Tag};

    #[test]
    fn value_and_function_namespaces_are_separate() {
        let mut heap = GcHeap::new();
        let mut symbols = SymbolTable::new();
        let mut modules = ModuleRegistry::new();

        let name = symbols.intern(&mut heap, "m").unwrap();
        let x = symbols.intern(&mut heap, "x").unwrap();
        let id = modules.create(&mut heap, name).unwrap();
        let one = heap.integer(1).unwrap();

        modules.get_mut(id).define_value(x, one);
        assert_eq!(modules.get(id).value(x), Some(one));
        assert_eq!(modules.get(id).function(x), None);
        assert_eq!(modules.find(name), Some(id));
        assert_eq!(heap.tag(modules.get(id).cell), Some(Tag::Module));
    }

    #[test]
    fn bindings_are_roots() {
        let mut heap = GcHeap::new();
        let mut symbols = SymbolTable::new();
        let mut modules = ModuleRegistry::new();

        let name = symbols.intern(&mut heap, "m").unwrap();
        let x = symbols.intern(&mut heap, "x").unwrap();
        let id = modules.create(&mut heap, name).unwrap();
        let value = heap.integer(10).unwrap();
        let list = heap.list(&[value]).unwrap();
        modules.get_mut(id).define_value(x, list);
        heap.integer(99).unwrap();

        let roots: Vec<_> = modules.roots().collect();
        heap.collect(roots);

        // name, x, module cell, the list pair and its element
        assert_eq!(heap.live_count(), 5);
        assert_eq!(heap.as_integer(value), Some(10));
    }
}
