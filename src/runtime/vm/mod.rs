use std::rc::Rc;

use crate::{
    bytecode::op_code::disassemble,
    runtime::{
        builtins,
        compiled_function::FunctionInfo,
        config::VmConfig,
        errors::RuntimeError,
        frame::Frame,
        gc::{CellRef, CycleMetrics, GcHeap, HeapError},
        module::{ModuleId, ModuleRegistry},
        symbol_table::SymbolTable,
        value::Scalar,
    },
    syntax::printer::Printer,
};

mod dispatch;
mod function_call;
mod toplevel;
mod trace;

/// The virtual machine together with everything it owns: the cell heap, the
/// symbol table, the module registry and the frame stack.
///
/// `frames[0]` is the bottom frame. It never runs code; top-level evaluation
/// parks forms on its work-stack so they are rooted while a collection runs.
pub struct VM {
    pub heap: GcHeap,
    pub symbols: SymbolTable,
    pub modules: ModuleRegistry,
    frames: Vec<Frame>,
    config: VmConfig,
    user: ModuleId,
    t: CellRef,
    defined: Vec<(ModuleId, CellRef)>,
}

impl VM {
    pub fn new() -> Result<Self, HeapError> {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Result<Self, HeapError> {
        let mut heap = GcHeap::from_config(&config);
        let mut symbols = SymbolTable::new();
        let keywords = *symbols.keywords();
        let t = symbols.intern_spur(&mut heap, keywords.t)?;
        let user_name = symbols.intern_spur(&mut heap, keywords.user)?;

        let mut vm = Self {
            heap,
            symbols,
            modules: ModuleRegistry::new(),
            frames: Vec::with_capacity(64),
            config,
            user: ModuleId(0),
            t,
            defined: Vec::new(),
        };
        vm.user = vm.module(user_name)?;
        vm.frames.push(Frame::bare(vm.user, Vec::new()));
        Ok(vm)
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn set_trace(&mut self, enabled: bool) {
        self.config.trace = enabled;
    }

    pub fn set_gc_enabled(&mut self, enabled: bool) {
        self.config.gc_enabled = enabled;
        self.heap.set_enabled(enabled);
    }

    pub fn set_gc_threshold(&mut self, threshold: usize) {
        self.config.gc_threshold = threshold;
        self.heap.set_threshold(threshold);
    }

    pub fn user_module(&self) -> ModuleId {
        self.user
    }

    /// The canonical true value, the symbol `t`.
    pub fn t(&self) -> CellRef {
        self.t
    }

    pub fn boolean(&self, value: bool) -> CellRef {
        if value { self.t } else { CellRef::NULL }
    }

    /// Finds or creates the module named by the symbol `name`.
    ///
    /// New modules start with the native library in their function namespace
    /// and `t` bound to itself in their value namespace.
    pub fn module(&mut self, name: CellRef) -> Result<ModuleId, HeapError> {
        if let Some(id) = self.modules.find(name) {
            return Ok(id);
        }
        let id = self.modules.create(&mut self.heap, name)?;
        builtins::install(self, id)?;
        let t = self.t;
        self.modules.get_mut(id).define_value(t, t);
        log::debug!("created module {}", self.display(name));
        Ok(id)
    }

    pub fn intern(&mut self, name: &str) -> Result<CellRef, HeapError> {
        self.symbols.intern(&mut self.heap, name)
    }

    /// Module-level function binding, by name.
    pub fn function(&self, module: ModuleId, name: &str) -> Option<CellRef> {
        let symbol = self.symbols.lookup(name)?;
        self.modules.get(module).function(symbol)
    }

    /// Module-level value binding, by name.
    pub fn value(&self, module: ModuleId, name: &str) -> Option<CellRef> {
        let symbol = self.symbols.lookup(name)?;
        self.modules.get(module).value(symbol)
    }

    pub fn display(&self, cell: CellRef) -> String {
        Printer::new(&self.heap, &self.symbols, &self.modules).display(cell)
    }

    /// Bytecode listing of a function or macro cell.
    pub fn disassemble(&self, cell: CellRef) -> Option<String> {
        let info = self.heap.scalar(cell)?.function_info()?;
        let constants = info
            .constants
            .iter()
            .map(|c| self.display(*c))
            .collect::<Vec<_>>()
            .join(" ");
        Some(format!(
            "{} params={}{} slots={}\nconstants: [{}]\n{}",
            self.display(cell),
            info.param_count,
            if info.has_rest { "+rest" } else { "" },
            info.slot_count,
            constants,
            disassemble(&info.instructions)
        ))
    }

    /// Current function or macro cells of every name defined since the
    /// last call, in first-definition order.
    pub fn take_definitions(&mut self) -> Vec<CellRef> {
        std::mem::take(&mut self.defined)
            .into_iter()
            .filter_map(|(module, name)| self.modules.get(module).function(name))
            .collect()
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    /// Runs a full collection over the VM's root set: every frame's
    /// work-stack, variables and code constants, the symbol table, and every
    /// module's name, cell and bindings.
    pub fn collect_garbage(&mut self) -> CycleMetrics {
        let roots = self
            .frames
            .iter()
            .flat_map(Frame::roots)
            .chain(self.symbols.cells())
            .chain(self.modules.roots());
        self.heap.collect(roots)
    }

    // -----------------------------------------------------------------------
    // Native function interface
    // -----------------------------------------------------------------------

    /// Arguments of the native call in progress.
    pub fn args(&self) -> &[CellRef] {
        &self.current_frame().stack
    }

    pub fn push(&mut self, cell: CellRef) {
        self.current_frame_mut().stack.push(cell);
    }

    pub fn pop(&mut self) -> Result<CellRef, RuntimeError> {
        self.current_frame_mut()
            .stack
            .pop()
            .ok_or(RuntimeError::StackUnderflow)
    }

    pub fn integer_arg(&self, function: &'static str, cell: CellRef) -> Result<i64, RuntimeError> {
        self.heap
            .as_integer(cell)
            .ok_or_else(|| self.type_error(function, "integer", cell))
    }

    pub fn type_error(
        &self,
        function: &'static str,
        expected: &'static str,
        found: CellRef,
    ) -> RuntimeError {
        RuntimeError::TypeError {
            function,
            expected,
            found: self.display(found),
        }
    }

    // -----------------------------------------------------------------------
    // Frames
    // -----------------------------------------------------------------------

    fn current_frame(&self) -> &Frame {
        // The bottom frame is never popped.
        &self.frames[self.frames.len() - 1]
    }

    fn current_frame_mut(&mut self) -> &mut Frame {
        let top = self.frames.len() - 1;
        &mut self.frames[top]
    }

    fn push_frame(&mut self, frame: Frame) -> Result<(), RuntimeError> {
        if self.frames.len() >= self.config.max_frames {
            return Err(RuntimeError::StackOverflow(self.config.max_frames));
        }
        self.frames.push(frame);
        Ok(())
    }

    /// Drops every frame above the bottom one and trims the bottom work-stack.
    fn unwind_to(&mut self, bottom_stack_len: usize) {
        self.frames.truncate(1);
        self.frames[0].stack.truncate(bottom_stack_len);
    }

    fn module_of(&self, info: &FunctionInfo) -> ModuleId {
        match self.heap.scalar(info.module) {
            Some(Scalar::Module(id)) => *id,
            _ => self.user,
        }
    }

    fn function_name(&self, info: &FunctionInfo) -> String {
        self.symbols
            .name_of(&self.heap, info.name)
            .unwrap_or("anonymous")
            .to_string()
    }

    /// Invokes a callable from Rust and returns its result.
    ///
    /// Re-entrant: a driver frame is pushed above the current top and the run
    /// loop only executes frames above it. On error every frame the call
    /// pushed is discarded.
    pub fn apply(&mut self, callee: CellRef, args: &[CellRef]) -> Result<CellRef, RuntimeError> {
        let args = args.to_vec();
        self.with_driver_frame(|vm| vm.invoke(callee, args))
    }

    /// Runs a macro body on unevaluated argument forms.
    pub(crate) fn expand_macro(
        &mut self,
        info: Rc<FunctionInfo>,
        args: Vec<CellRef>,
    ) -> Result<CellRef, RuntimeError> {
        self.with_driver_frame(|vm| vm.call_function(info, args))
    }

    fn with_driver_frame<F>(&mut self, start: F) -> Result<CellRef, RuntimeError>
    where
        F: FnOnce(&mut Self) -> Result<(), RuntimeError>,
    {
        let base = self.frames.len();
        let module = self.current_frame().module;
        self.push_frame(Frame::bare(module, Vec::new()))?;

        let outcome = start(self).and_then(|()| self.run(base + 1));
        let driver = self.frames.drain(base..).next();
        outcome?;

        driver
            .and_then(|frame| frame.stack.last().copied())
            .ok_or_else(|| RuntimeError::EmptyReturn("apply".to_string()))
    }
}

#[cfg(test)]
mod function_call_test;
