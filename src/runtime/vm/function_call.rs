use std::rc::Rc;

use crate::runtime::{
    builtin_function::NativeFunction,
    compiled_function::FunctionInfo,
    errors::RuntimeError,
    frame::Frame,
    gc::CellRef,
    value::Scalar,
};

use super::VM;

impl VM {
    /// `call(argc)`: the callee sits `argc` slots below the top of the
    /// work-stack, followed by its arguments in order.
    pub(super) fn execute_call(&mut self, argc: usize) -> Result<(), RuntimeError> {
        let stack = &mut self.current_frame_mut().stack;
        if stack.len() < argc + 1 {
            return Err(RuntimeError::StackUnderflow);
        }
        let args = stack.split_off(stack.len() - argc);
        let callee = stack.pop().ok_or(RuntimeError::StackUnderflow)?;
        self.invoke(callee, args)
    }

    pub(super) fn invoke(&mut self, callee: CellRef, args: Vec<CellRef>) -> Result<(), RuntimeError> {
        match self.heap.scalar(callee) {
            Some(Scalar::NativeFunction(native)) => {
                let native = *native;
                self.call_native(native, args)
            }
            Some(Scalar::Function(info)) => {
                let info = Rc::clone(info);
                self.call_function(info, args)
            }
            Some(Scalar::Macro(info)) => Err(RuntimeError::MacroCall(self.function_name(info))),
            _ => Err(RuntimeError::NotCallable(self.display(callee))),
        }
    }

    /// Pushes a frame whose work-stack is the argument list, runs the native
    /// against it, then returns its top-of-stack like any other frame.
    fn call_native(&mut self, native: NativeFunction, args: Vec<CellRef>) -> Result<(), RuntimeError> {
        if !native.arity.is_satisfied(args.len()) {
            return Err(RuntimeError::WrongArity {
                name: native.name.to_string(),
                expected: native.arity.to_string(),
                got: args.len(),
            });
        }
        let module = self.current_frame().module;
        self.push_frame(Frame::for_native(native.name, module, args))?;
        (native.func)(self)?;
        self.execute_return()
    }

    pub(super) fn call_function(
        &mut self,
        info: Rc<FunctionInfo>,
        mut args: Vec<CellRef>,
    ) -> Result<(), RuntimeError> {
        if !info.accepts(args.len()) {
            return Err(RuntimeError::WrongArity {
                name: self.function_name(&info),
                expected: info.arity_label(),
                got: args.len(),
            });
        }

        if info.has_rest {
            let surplus = args.split_off(info.param_count);
            let rest = self.heap.list(&surplus)?;
            args.push(rest);
        }
        let mut variables = args;
        variables.resize(info.slot_count.max(variables.len()), CellRef::NULL);

        let module = self.module_of(&info);
        self.push_frame(Frame::for_function(info, module, variables))
    }

    /// Pops the current frame and pushes its top-of-stack onto the caller.
    pub(super) fn execute_return(&mut self) -> Result<(), RuntimeError> {
        if self.frames.len() <= 1 {
            return Err(RuntimeError::ReturnFromTopLevel);
        }
        let frame = self.frames.pop().ok_or(RuntimeError::ReturnFromTopLevel)?;
        let Some(value) = frame.stack.last().copied() else {
            let name = match (&frame.code, frame.native) {
                (Some(info), _) => self.function_name(info),
                (None, Some(native)) => native.to_string(),
                (None, None) => "<driver>".to_string(),
            };
            return Err(RuntimeError::EmptyReturn(name));
        };
        self.push(value);
        Ok(())
    }
}
