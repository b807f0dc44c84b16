use crate::{
    bytecode::{compilation_scope::CompilationScope, op_code::OpCode},
    runtime::{
        compiled_function::FunctionInfo, gc::CellRef, module::ModuleId, vm::VM,
    },
};

mod builder;
pub mod errors;
mod expression;

pub use errors::CompileError;

pub type CompileResult<T> = Result<T, CompileError>;

/// Macro expansions may nest at most this deep inside one form.
pub const MAX_MACRO_DEPTH: usize = 64;

/// Forward-branch operand written at emission time and patched once the
/// destination is known.
pub(super) const PLACEHOLDER: usize = 9999;

/// Single-pass compiler for one function body.
///
/// The compiler borrows the VM for the duration of the compile: it interns
/// through the VM's symbol table, resolves macros against the module being
/// compiled into, and runs macro bodies on the VM. No collection happens
/// while a compiler is alive, so the cells it touches stay valid.
pub struct Compiler<'vm> {
    pub(super) vm: &'vm mut VM,
    pub(super) module: ModuleId,
    pub(super) scope: CompilationScope,
    pub(super) expansion_depth: usize,
}


impl<'vm> Compiler<'vm> {
    pub fn new(vm: &'vm mut VM, module: ModuleId) -> Self {
        Self {
            vm,
            module,
            scope: CompilationScope::new(),
            expansion_depth: 0,
        }
    }

    /// Compiles a definition's parameter list and body.
    pub fn compile_function(
        mut self,
        name: CellRef,
        params: CellRef,
        body: &[CellRef],
    ) -> CompileResult<FunctionInfo> {
        self.bind_parameters(params)?;
        self.compile_body(body)?;
        self.emit(OpCode::Return, &[])?;
        Ok(self.finish(name))
    }

    /// Compiles a single expression as an anonymous zero-argument function.
    pub fn compile_toplevel(mut self, form: CellRef) -> CompileResult<FunctionInfo> {
        self.compile_expression(form)?;
        self.emit(OpCode::Return, &[])?;
        Ok(self.finish(CellRef::NULL))
    }

    fn bind_parameters(&mut self, params: CellRef) -> CompileResult<()> {
        let names = self
            .vm
            .heap
            .list_to_vec(params)
            .ok_or_else(|| self.improper_list_error("parameter list", params))?;

        let rest = self.vm.symbols.keywords().rest;
        let mut iter = names.iter().copied();
        while let Some(name) = iter.next() {
            if self.vm.symbols.is(&self.vm.heap, name, rest) {
                let rest_name = iter.next().ok_or_else(|| {
                    CompileError::MalformedDefinition(format!(
                        "&rest needs a name in {}",
                        self.vm.display(params)
                    ))
                })?;
                if iter.next().is_some() {
                    return Err(CompileError::MalformedDefinition(format!(
                        "&rest name must be the last parameter in {}",
                        self.vm.display(params)
                    )));
                }
                self.expect_symbol(rest_name, "parameter")?;
                self.scope.arguments.push(rest_name);
                self.scope.has_rest = true;
                break;
            }
            self.expect_symbol(name, "parameter")?;
            self.scope.arguments.push(name);
        }
        Ok(())
    }

    pub(super) fn expect_symbol(&self, cell: CellRef, context: &'static str) -> CompileResult<CellRef> {
        match self.vm.heap.as_symbol(cell) {
            Some(_) => Ok(cell),
            None => Err(self.non_symbol_error(context, cell)),
        }
    }

    fn finish(self, name: CellRef) -> FunctionInfo {
        let module = self.vm.modules.get(self.module).cell;
        FunctionInfo {
            name,
            param_count: self.scope.param_count(),
            has_rest: self.scope.has_rest,
            slot_count: self.scope.slot_count(),
            constants: self.scope.constants,
            instructions: self.scope.instructions,
            module,
        }
    }
}
