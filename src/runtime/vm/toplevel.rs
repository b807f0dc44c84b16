use std::rc::Rc;

use crate::{
    bytecode::compiler::{CompileError, Compiler},
    runtime::{
        errors::EvalError,
        gc::CellRef,
        module::ModuleId,
        value::Scalar,
    },
    syntax::reader::Reader,
};

use super::VM;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DefinitionKind {
    Function,
    Macro,
}

impl VM {
    /// Evaluates one top-level form in the `user` module.
    ///
    /// A collection may run first (with `form` rooted on the bottom frame).
    /// On error the frame stack is unwound to the bottom frame, so the next
    /// form starts from a clean state.
    pub fn eval_form(&mut self, form: CellRef) -> Result<CellRef, EvalError> {
        let bottom = self.frames[0].stack.len();
        self.frames[0].stack.push(form);

        if self.config.gc_enabled && self.heap.should_collect() {
            self.collect_garbage();
        }

        let user = self.user;
        let result = self.eval_in(user, form);
        if let Err(err) = &result {
            log::debug!("evaluation failed: {err}");
            for line in self.backtrace() {
                log::debug!("  {line}");
            }
        }
        self.unwind_to(bottom);
        result
    }

    /// Reads and evaluates every form in `source`.
    ///
    /// Results are returned per form; a read error ends the list since the
    /// reader cannot resynchronise. Earlier results stay rooted until every
    /// form has run.
    pub fn eval_str(&mut self, source: &str) -> Vec<Result<CellRef, EvalError>> {
        let pinned = self.frames[0].stack.len();
        let mut reader = Reader::new(source);
        let mut results = Vec::new();

        loop {
            match reader.read(&mut self.heap, &mut self.symbols) {
                Ok(Some(form)) => {
                    let result = self.eval_form(form);
                    if let Ok(value) = result {
                        self.frames[0].stack.push(value);
                    }
                    results.push(result);
                }
                Ok(None) => break,
                Err(err) => {
                    results.push(Err(err.into()));
                    break;
                }
            }
        }

        self.frames[0].stack.truncate(pinned);
        results
    }

    fn eval_in(&mut self, module: ModuleId, form: CellRef) -> Result<CellRef, EvalError> {
        let keywords = *self.symbols.keywords();
        let head = self.heap.car(form).and_then(|head| self.heap.as_symbol(head));

        match head {
            Some(spur) if spur == keywords.defun => self.define(module, form, DefinitionKind::Function),
            Some(spur) if spur == keywords.defmacro => self.define(module, form, DefinitionKind::Macro),
            Some(spur) if spur == keywords.defvar => self.define_variable(module, form),
            Some(spur) if spur == keywords.module => self.eval_module(form),
            _ => self.eval_expression(module, form),
        }
    }

    /// `(module name forms...)`: evaluates `forms` inside module `name`.
    fn eval_module(&mut self, form: CellRef) -> Result<CellRef, EvalError> {
        let parts = self.definition_parts(form)?;
        let Some((name, body)) = parts.get(1).map(|name| (*name, &parts[2..])) else {
            return Err(self.malformed_definition(form));
        };
        if self.heap.as_symbol(name).is_none() {
            return Err(self.malformed_definition(form));
        }

        let id = self.module(name)?;
        for sub in body {
            self.eval_in(id, *sub)?;
        }
        Ok(self.modules.get(id).cell)
    }

    /// `(defun name (params) body...)` and `(defmacro name (params) body...)`.
    fn define(
        &mut self,
        module: ModuleId,
        form: CellRef,
        kind: DefinitionKind,
    ) -> Result<CellRef, EvalError> {
        let parts = self.definition_parts(form)?;
        if parts.len() < 3 {
            return Err(self.malformed_definition(form));
        }
        let (name, params, body) = (parts[1], parts[2], &parts[3..]);
        if self.heap.as_symbol(name).is_none() {
            return Err(CompileError::NonSymbolName {
                context: "function name",
                form: self.display(name),
            }
            .into());
        }

        let info = Rc::new(Compiler::new(self, module).compile_function(name, params, body)?);
        let scalar = match kind {
            DefinitionKind::Function => Scalar::Function(info),
            DefinitionKind::Macro => Scalar::Macro(info),
        };
        let cell = self.heap.alloc_scalar(scalar)?;

        if self.modules.get_mut(module).define_function(name, cell).is_some() {
            log::warn!("redefining {}", self.display(name));
        }
        log::debug!("defined {}", self.display(cell));
        if !self.defined.contains(&(module, name)) {
            self.defined.push((module, name));
        }
        Ok(name)
    }

    /// `(defvar name [expr])` binds the value of `expr` (or null).
    fn define_variable(&mut self, module: ModuleId, form: CellRef) -> Result<CellRef, EvalError> {
        let parts = self.definition_parts(form)?;
        let (name, init) = match parts.as_slice() {
            [_, name] => (*name, None),
            [_, name, init] => (*name, Some(*init)),
            _ => return Err(self.malformed_definition(form)),
        };
        if self.heap.as_symbol(name).is_none() {
            return Err(CompileError::NonSymbolName {
                context: "variable name",
                form: self.display(name),
            }
            .into());
        }

        let value = match init {
            Some(init) => self.eval_expression(module, init)?,
            None => CellRef::NULL,
        };
        self.modules.get_mut(module).define_value(name, value);
        log::debug!("defvar {} = {}", self.display(name), self.display(value));
        Ok(name)
    }

    /// Compiles `form` as an anonymous zero-argument function and calls it.
    fn eval_expression(&mut self, module: ModuleId, form: CellRef) -> Result<CellRef, EvalError> {
        let info = Compiler::new(self, module).compile_toplevel(form)?;
        let function = self.heap.alloc_scalar(Scalar::Function(Rc::new(info)))?;
        Ok(self.apply(function, &[])?)
    }

    fn definition_parts(&self, form: CellRef) -> Result<Vec<CellRef>, EvalError> {
        self.heap
            .list_to_vec(form)
            .ok_or_else(|| self.malformed_definition(form))
    }

    fn malformed_definition(&self, form: CellRef) -> EvalError {
        CompileError::MalformedDefinition(self.display(form)).into()
    }
}
