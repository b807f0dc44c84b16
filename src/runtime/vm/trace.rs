use crate::bytecode::op_code::{OpCode, operand_width};

use super::VM;

impl VM {
    pub(super) fn trace_instruction(&self, pc: usize, op: OpCode, operand: usize) {
        let frame = self.current_frame();
        let name = frame
            .code
            .as_ref()
            .map(|info| self.function_name(info))
            .unwrap_or_default();
        let stack = frame
            .stack
            .iter()
            .map(|cell| self.display(*cell))
            .collect::<Vec<_>>()
            .join(" ");

        if operand_width(op) == 1 {
            log::trace!(
                "[{}] {} {:04} {} {} | [{}]",
                self.frames.len() - 1,
                name,
                pc,
                op,
                operand,
                stack
            );
        } else {
            log::trace!(
                "[{}] {} {:04} {} | [{}]",
                self.frames.len() - 1,
                name,
                pc,
                op,
                stack
            );
        }
    }

    /// One line per active frame, innermost first.
    pub fn backtrace(&self) -> Vec<String> {
        self.frames
            .iter()
            .enumerate()
            .skip(1)
            .rev()
            .map(|(depth, frame)| match (&frame.code, frame.native) {
                (Some(info), _) => format!(
                    "#{depth} {} at {:04}",
                    self.function_name(info),
                    frame.pc
                ),
                (None, Some(native)) => format!("#{depth} {native} (native)"),
                (None, None) => format!("#{depth} <driver>"),
            })
            .collect()
    }
}
