use std::rc::Rc;

use crate::{
    bytecode::op_code::OpCode,
    runtime::{compiled_function::FunctionInfo, gc::CellRef, value::Scalar},
};

use super::{CompileResult, Compiler, MAX_MACRO_DEPTH, PLACEHOLDER, errors::CompileError};

impl Compiler<'_> {
    /// Compiles a statement sequence leaving the last value on the stack.
    pub(super) fn compile_body(&mut self, body: &[CellRef]) -> CompileResult<()> {
        if body.is_empty() {
            self.emit(OpCode::PushNull, &[])?;
            return Ok(());
        }
        for (i, form) in body.iter().enumerate() {
            if i > 0 {
                self.emit(OpCode::Pop, &[])?;
            }
            self.compile_expression(*form)?;
        }
        Ok(())
    }

    pub(super) fn compile_expression(&mut self, form: CellRef) -> CompileResult<()> {
        if form.is_null() {
            self.emit(OpCode::PushNull, &[])?;
            return Ok(());
        }
        let heap = &self.vm.heap;
        if let (Some(head), Some(rest)) = (heap.car(form), heap.cdr(form)) {
            return self.compile_pair(form, head, rest);
        }
        if heap.as_symbol(form).is_some() {
            return self.compile_variable(form);
        }
        // Integers and any other non-pair object evaluate to themselves.
        self.emit_constant(form)?;
        Ok(())
    }

    fn compile_pair(&mut self, form: CellRef, head: CellRef, rest: CellRef) -> CompileResult<()> {
        if let Some(spur) = self.vm.heap.as_symbol(head) {
            let keywords = *self.vm.symbols.keywords();
            if spur == keywords.quote {
                return self.compile_quote(form, rest);
            }
            if spur == keywords.if_ {
                return self.compile_if(form, rest);
            }
            if spur == keywords.let_ {
                return self.compile_let(form, rest);
            }
            if let Some(info) = self.macro_binding(head) {
                return self.expand_macro(form, head, info, rest);
            }
        }
        self.compile_call(form, head, rest)
    }

    fn compile_variable(&mut self, symbol: CellRef) -> CompileResult<()> {
        match self.scope.resolve(symbol) {
            Some(slot) => {
                self.emit(OpCode::LoadLocal, &[slot])?;
            }
            None => {
                self.emit_constant(symbol)?;
                self.emit(OpCode::LoadModuleValue, &[])?;
            }
        }
        Ok(())
    }

    fn compile_quote(&mut self, form: CellRef, rest: CellRef) -> CompileResult<()> {
        let args = self.list_of(rest, form, "quote")?;
        let [quoted] = args.as_slice() else {
            return Err(self.malformed_error("quote", form));
        };
        self.emit_constant(*quoted)?;
        Ok(())
    }

    fn compile_if(&mut self, form: CellRef, rest: CellRef) -> CompileResult<()> {
        let args = self.list_of(rest, form, "if")?;
        let (condition, consequence, alternative) = match args.as_slice() {
            [c, t] => (*c, *t, None),
            [c, t, e] => (*c, *t, Some(*e)),
            _ => return Err(self.malformed_error("if", form)),
        };

        self.compile_expression(condition)?;
        let branch_if_null_pos = self.emit(OpCode::BranchIfNull, &[PLACEHOLDER])?;

        self.compile_expression(consequence)?;
        let branch_pos = self.emit(OpCode::Branch, &[PLACEHOLDER])?;

        let after_consequence = self.current_position();
        self.change_operand(branch_if_null_pos, after_consequence)?;

        match alternative {
            Some(alternative) => self.compile_expression(alternative)?,
            None => {
                self.emit(OpCode::PushNull, &[])?;
            }
        }

        let after_alternative = self.current_position();
        self.change_operand(branch_pos, after_alternative)?;
        Ok(())
    }

    /// `(let (binding...) body...)` with parallel binding semantics.
    fn compile_let(&mut self, form: CellRef, rest: CellRef) -> CompileResult<()> {
        let args = self.list_of(rest, form, "let")?;
        let Some((bindings, body)) = args.split_first() else {
            return Err(self.malformed_error("let", form));
        };
        let bindings = self.list_of(*bindings, form, "let binding list")?;

        let mut parsed = Vec::with_capacity(bindings.len());
        for binding in bindings {
            parsed.push(self.parse_binding(form, binding)?);
        }

        // Initialisers see the enclosing environment only.
        for (_, init) in &parsed {
            if let Some(init) = init {
                self.compile_expression(*init)?;
            }
        }

        let mark = self.scope.local_mark();
        let slots: Vec<(usize, bool)> = parsed
            .iter()
            .map(|(name, init)| (self.scope.bind_local(*name), init.is_some()))
            .collect();
        for (slot, _) in slots.iter().rev().filter(|(_, has_init)| *has_init) {
            self.emit(OpCode::StoreLocal, &[*slot])?;
        }

        self.compile_body(body)?;
        self.scope.release(mark);
        Ok(())
    }

    fn parse_binding(
        &self,
        form: CellRef,
        binding: CellRef,
    ) -> CompileResult<(CellRef, Option<CellRef>)> {
        if self.vm.heap.as_symbol(binding).is_some() {
            return Ok((binding, None));
        }
        let parts = self.list_of(binding, form, "let binding")?;
        match parts.as_slice() {
            [name] => Ok((self.expect_symbol(*name, "let binding name")?, None)),
            [name, init] => Ok((self.expect_symbol(*name, "let binding name")?, Some(*init))),
            _ => Err(self.malformed_error("let binding", binding)),
        }
    }

    fn compile_call(&mut self, form: CellRef, head: CellRef, rest: CellRef) -> CompileResult<()> {
        let args = self.list_of(rest, form, "call")?;

        if self.vm.heap.as_symbol(head).is_some() {
            self.emit_constant(head)?;
            self.emit(OpCode::LoadModuleFunction, &[])?;
        } else {
            self.compile_expression(head)?;
        }

        for arg in &args {
            self.compile_expression(*arg)?;
        }
        self.emit(OpCode::Call, &[args.len()])?;
        Ok(())
    }

    /// The macro bound to `head` in the module being compiled into, if any.
    fn macro_binding(&self, head: CellRef) -> Option<Rc<FunctionInfo>> {
        let binding = self.vm.modules.get(self.module).function(head)?;
        match self.vm.heap.scalar(binding)? {
            Scalar::Macro(info) => Some(Rc::clone(info)),
            _ => None,
        }
    }

    fn expand_macro(
        &mut self,
        form: CellRef,
        head: CellRef,
        info: Rc<FunctionInfo>,
        rest: CellRef,
    ) -> CompileResult<()> {
        if self.expansion_depth >= MAX_MACRO_DEPTH {
            return Err(CompileError::MacroRecursion(MAX_MACRO_DEPTH));
        }
        let args = self.list_of(rest, form, "macro call")?;
        let expansion = self
            .vm
            .expand_macro(info, args)
            .map_err(|source| CompileError::MacroExpansion {
                name: self.vm.display(head),
                source,
            })?;
        log::trace!(
            "expanded {} into {}",
            self.vm.display(form),
            self.vm.display(expansion)
        );

        self.expansion_depth += 1;
        let result = self.compile_expression(expansion);
        self.expansion_depth -= 1;
        result
    }

    fn list_of(
        &self,
        list: CellRef,
        form: CellRef,
        context: &'static str,
    ) -> CompileResult<Vec<CellRef>> {
        self.vm
            .heap
            .list_to_vec(list)
            .ok_or_else(|| self.improper_list_error(context, form))
    }
}
