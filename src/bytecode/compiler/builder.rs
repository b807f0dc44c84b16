use crate::{
    bytecode::op_code::{MAX_OPERAND, OpCode, make},
    runtime::gc::CellRef,
};

use super::{CompileResult, Compiler, errors::CompileError};

impl Compiler<'_> {
    pub(super) fn emit(&mut self, op_code: OpCode, operands: &[usize]) -> CompileResult<usize> {
        if let Some(index) = operands.iter().copied().find(|o| *o > MAX_OPERAND) {
            return Err(CompileError::OperandOverflow {
                what: op_code.mnemonic(),
                index,
            });
        }
        let instruction = make(op_code, operands);
        let pos = self.scope.instructions.len();
        self.scope.instructions.extend_from_slice(&instruction);
        Ok(pos)
    }

    pub(super) fn emit_constant(&mut self, cell: CellRef) -> CompileResult<usize> {
        let index = self.scope.add_constant(cell);
        self.emit(OpCode::PushConstant, &[index])
    }

    pub(super) fn current_position(&self) -> usize {
        self.scope.instructions.len()
    }

    /// Overwrites the operand of the instruction at `op_pos`.
    pub(super) fn change_operand(&mut self, op_pos: usize, operand: usize) -> CompileResult<()> {
        if operand > MAX_OPERAND {
            return Err(CompileError::OperandOverflow {
                what: "branch target",
                index: operand,
            });
        }
        self.scope.instructions[op_pos + 1] = operand as u16;
        Ok(())
    }
}
