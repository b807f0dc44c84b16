use crate::{
    bytecode::op_code::{OpCode, operand_width},
    runtime::{errors::RuntimeError, gc::CellRef},
};

use super::VM;

impl VM {
    /// Executes instructions until the frame stack shrinks back to `depth`.
    pub(super) fn run(&mut self, depth: usize) -> Result<(), RuntimeError> {
        while self.frames.len() > depth {
            self.step()?;
        }
        Ok(())
    }

    fn step(&mut self) -> Result<(), RuntimeError> {
        let frame = self.current_frame();
        let pc = frame.pc;
        let Some(code) = frame.code.clone() else {
            // Code-less frames are never left on top of a running loop.
            return Err(RuntimeError::ReturnFromTopLevel);
        };

        let word = *code
            .instructions
            .get(pc)
            .ok_or(RuntimeError::TruncatedInstruction { pc })?;
        let op = OpCode::try_from(word).map_err(|opcode| RuntimeError::UnknownOpcode { opcode, pc })?;
        let width = operand_width(op);
        let operand = if width == 1 {
            *code
                .instructions
                .get(pc + 1)
                .ok_or(RuntimeError::TruncatedInstruction { pc })? as usize
        } else {
            0
        };

        if self.config.trace {
            self.trace_instruction(pc, op, operand);
        }
        self.current_frame_mut().pc = pc + 1 + width;

        match op {
            OpCode::PushNull => self.push(CellRef::NULL),
            OpCode::PushConstant => {
                let constant = *code
                    .constants
                    .get(operand)
                    .ok_or(RuntimeError::InvalidOperand { op: op.mnemonic(), operand, pc })?;
                self.push(constant);
            }
            OpCode::LoadLocal => {
                let value = *self
                    .current_frame()
                    .variables
                    .get(operand)
                    .ok_or(RuntimeError::InvalidOperand { op: op.mnemonic(), operand, pc })?;
                self.push(value);
            }
            OpCode::StoreLocal => {
                let value = self.pop()?;
                let slot = self
                    .current_frame_mut()
                    .variables
                    .get_mut(operand)
                    .ok_or(RuntimeError::InvalidOperand { op: op.mnemonic(), operand, pc })?;
                *slot = value;
            }
            OpCode::LoadModuleValue => {
                let symbol = self.pop_symbol(op)?;
                let module = self.modules.get(self.current_frame().module);
                match module.value(symbol) {
                    Some(value) => self.push(value),
                    None => return Err(RuntimeError::UnboundValue(self.display(symbol))),
                }
            }
            OpCode::LoadModuleFunction => {
                let symbol = self.pop_symbol(op)?;
                let module = self.modules.get(self.current_frame().module);
                match module.function(symbol) {
                    Some(function) => self.push(function),
                    None => return Err(RuntimeError::UnboundFunction(self.display(symbol))),
                }
            }
            OpCode::Branch => self.current_frame_mut().pc = operand,
            OpCode::BranchIfNull => {
                if self.pop()?.is_null() {
                    self.current_frame_mut().pc = operand;
                }
            }
            OpCode::Call => self.execute_call(operand)?,
            OpCode::Return => self.execute_return()?,
            OpCode::Pop => {
                self.pop()?;
            }
        }
        Ok(())
    }

    fn pop_symbol(&mut self, op: OpCode) -> Result<CellRef, RuntimeError> {
        let symbol = self.pop()?;
        if self.heap.as_symbol(symbol).is_none() {
            return Err(self.type_error(op.mnemonic(), "symbol", symbol));
        }
        Ok(symbol)
    }
}
