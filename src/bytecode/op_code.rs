use std::fmt;

/// Bytecode is a flat vector of 16-bit words: an opcode word optionally
/// followed by one operand word.
pub type Instructions = Vec<u16>;

/// Largest value an operand word can carry.
pub const MAX_OPERAND: usize = u16::MAX as usize;

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    PushNull = 0,
    PushConstant = 1,
    LoadLocal = 2,
    StoreLocal = 3,
    LoadModuleValue = 4,
    LoadModuleFunction = 5,
    Branch = 6,
    BranchIfNull = 7,
    Call = 8,
    Return = 9,
    Pop = 10,
}

impl OpCode {
    pub const ALL: [OpCode; 11] = [
        OpCode::PushNull,
        OpCode::PushConstant,
        OpCode::LoadLocal,
        OpCode::StoreLocal,
        OpCode::LoadModuleValue,
        OpCode::LoadModuleFunction,
        OpCode::Branch,
        OpCode::BranchIfNull,
        OpCode::Call,
        OpCode::Return,
        OpCode::Pop,
    ];

    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::PushNull => "push-null",
            OpCode::PushConstant => "push-constant",
            OpCode::LoadLocal => "load-local",
            OpCode::StoreLocal => "store-local",
            OpCode::LoadModuleValue => "load-module-value",
            OpCode::LoadModuleFunction => "load-module-function",
            OpCode::Branch => "branch",
            OpCode::BranchIfNull => "branch-if-null",
            OpCode::Call => "call",
            OpCode::Return => "return",
            OpCode::Pop => "pop",
        }
    }
}

impl TryFrom<u16> for OpCode {
    type Error = u16;

    fn try_from(word: u16) -> Result<Self, Self::Error> {
        OpCode::ALL.get(word as usize).copied().ok_or(word)
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Number of operand words following the opcode.
pub fn operand_width(op: OpCode) -> usize {
    match op {
        OpCode::PushConstant
        | OpCode::LoadLocal
        | OpCode::StoreLocal
        | OpCode::Branch
        | OpCode::BranchIfNull
        | OpCode::Call => 1,
        OpCode::PushNull
        | OpCode::LoadModuleValue
        | OpCode::LoadModuleFunction
        | OpCode::Return
        | OpCode::Pop => 0,
    }
}

/// Encodes one instruction. Operands beyond the opcode's width are ignored;
/// callers range-check against `MAX_OPERAND`.
pub fn make(op: OpCode, operands: &[usize]) -> Instructions {
    let mut instruction = vec![op as u16];
    for operand in operands.iter().take(operand_width(op)) {
        instruction.push(*operand as u16);
    }
    instruction
}

/// Renders a line-per-instruction listing: offset, mnemonic, operand.
pub fn disassemble(instructions: &[u16]) -> String {
    let mut result = String::new();
    let mut i = 0;

    while i < instructions.len() {
        let word = instructions[i];
        let Ok(op) = OpCode::try_from(word) else {
            result.push_str(&format!("{:04} ??? {}\n", i, word));
            i += 1;
            continue;
        };

        let width = operand_width(op);
        match instructions.get(i + 1).filter(|_| width == 1) {
            Some(operand) => result.push_str(&format!("{:04} {} {}\n", i, op, operand)),
            None if width == 1 => result.push_str(&format!("{:04} {} <missing>\n", i, op)),
            None => result.push_str(&format!("{:04} {}\n", i, op)),
        }
        i += 1 + width;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::{OpCode, disassemble, make, operand_width};

    #[test]
    fn make_encodes_operand_words() {
        assert_eq!(make(OpCode::PushConstant, &[65534]), vec![1, 65534]);
        assert_eq!(make(OpCode::Return, &[]), vec![9]);
        assert_eq!(make(OpCode::Pop, &[7]), vec![10]);
    }

    #[test]
    fn opcodes_round_trip_through_words() {
        for op in OpCode::ALL {
            assert_eq!(OpCode::try_from(op as u16), Ok(op));
            assert_eq!(make(op, &[0]).len(), 1 + operand_width(op));
        }
        assert_eq!(OpCode::try_from(42), Err(42));
    }

    #[test]
    fn disassemble_lists_offsets_and_operands() {
        let mut code = make(OpCode::LoadLocal, &[0]);
        code.extend(make(OpCode::BranchIfNull, &[7]));
        code.extend(make(OpCode::PushNull, &[]));
        code.extend(make(OpCode::Return, &[]));

        assert_eq!(
            disassemble(&code),
            "0000 load-local 0\n0002 branch-if-null 7\n0004 push-null\n0005 return\n"
        );
    }

    #[test]
    fn disassemble_marks_unknown_words() {
        assert_eq!(disassemble(&[99, 9]), "0000 ??? 99\n0001 return\n");
    }
}
