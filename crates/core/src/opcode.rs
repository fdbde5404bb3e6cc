//! Bytecode instruction set.
//!
//! Opcodes are single bytes; a few carry inline operands directly in the
//! code stream (`CONST` and `CALL` take one index byte, the jumps take a
//! 2-byte big-endian absolute target). The VM dispatches with a plain
//! `match` over the decoded opcode.

use std::fmt;

/// A single-byte opcode.
///
/// The discriminant values are the wire encoding; changing the order of
/// variants changes the bytecode format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    // Stack / constants
    /// Push `consts[k]` where `k` is the following byte.
    Const = 0,
    /// Reserved for future local slot support.
    Load,
    /// Reserved for future local slot support.
    Store,
    /// Drop the top of the stack.
    Pop,

    // Integer math
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // Integer comparisons
    Lt,
    Gt,
    Le,
    Ge,

    // Float math
    FAdd,
    FSub,
    FMul,
    FDiv,

    // Float comparisons
    FLt,
    FGt,
    FLe,
    FGe,

    /// String concatenation (reserved).
    LtGt,

    // Equality and logic
    Eq,
    Neq,
    /// Reserved.
    Or,
    OrOr,
    /// Reserved.
    And,
    AndAnd,
    /// Reserved.
    Not,

    // Control flow
    /// Unconditional jump; the next two bytes are a big-endian absolute
    /// target.
    Jump,
    /// Pop; if falsy, jump to the big-endian absolute target.
    JumpIfFalse,
    /// Call the function at the following function-table index byte.
    Call,
    Return,

    /// Reserved.
    Print,
    /// Stop execution.
    Halt,
}

/// Decode table, indexed by wire byte. Must stay in variant order.
const OPCODES: [Opcode; 35] = [
    Opcode::Const,
    Opcode::Load,
    Opcode::Store,
    Opcode::Pop,
    Opcode::Add,
    Opcode::Sub,
    Opcode::Mul,
    Opcode::Div,
    Opcode::Mod,
    Opcode::Lt,
    Opcode::Gt,
    Opcode::Le,
    Opcode::Ge,
    Opcode::FAdd,
    Opcode::FSub,
    Opcode::FMul,
    Opcode::FDiv,
    Opcode::FLt,
    Opcode::FGt,
    Opcode::FLe,
    Opcode::FGe,
    Opcode::LtGt,
    Opcode::Eq,
    Opcode::Neq,
    Opcode::Or,
    Opcode::OrOr,
    Opcode::And,
    Opcode::AndAnd,
    Opcode::Not,
    Opcode::Jump,
    Opcode::JumpIfFalse,
    Opcode::Call,
    Opcode::Return,
    Opcode::Print,
    Opcode::Halt,
];

impl Opcode {
    /// Decode a raw code byte. `None` for bytes outside the instruction set.
    pub fn from_byte(byte: u8) -> Option<Opcode> {
        OPCODES.get(byte as usize).copied()
    }

    /// Number of inline operand bytes following this opcode.
    pub fn operand_width(self) -> usize {
        match self {
            Opcode::Const | Opcode::Call => 1,
            Opcode::Jump | Opcode::JumpIfFalse => 2,
            _ => 0,
        }
    }

    /// Mnemonic used by the tracer and the disassembler.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Const => "CONST",
            Opcode::Load => "LOAD",
            Opcode::Store => "STORE",
            Opcode::Pop => "POP",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Mod => "MOD",
            Opcode::Lt => "LT",
            Opcode::Gt => "GT",
            Opcode::Le => "LE",
            Opcode::Ge => "GE",
            Opcode::FAdd => "FADD",
            Opcode::FSub => "FSUB",
            Opcode::FMul => "FMUL",
            Opcode::FDiv => "FDIV",
            Opcode::FLt => "FLT",
            Opcode::FGt => "FGT",
            Opcode::FLe => "FLE",
            Opcode::FGe => "FGE",
            Opcode::LtGt => "LTGT",
            Opcode::Eq => "EQ",
            Opcode::Neq => "NEQ",
            Opcode::Or => "OR",
            Opcode::OrOr => "OR_OR",
            Opcode::And => "AND",
            Opcode::AndAnd => "AND_AND",
            Opcode::Not => "NOT",
            Opcode::Jump => "JUMP",
            Opcode::JumpIfFalse => "JUMP_IF_FALSE",
            Opcode::Call => "CALL",
            Opcode::Return => "RETURN",
            Opcode::Print => "PRINT",
            Opcode::Halt => "HALT",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_every_opcode() {
        for byte in 0..=Opcode::Halt as u8 {
            let op = Opcode::from_byte(byte).expect("in-range byte must decode");
            assert_eq!(op as u8, byte);
        }
    }

    #[test]
    fn test_out_of_range_byte() {
        assert_eq!(Opcode::from_byte(Opcode::Halt as u8 + 1), None);
        assert_eq!(Opcode::from_byte(0xff), None);
    }

    #[test]
    fn test_operand_widths() {
        assert_eq!(Opcode::Const.operand_width(), 1);
        assert_eq!(Opcode::Call.operand_width(), 1);
        assert_eq!(Opcode::Jump.operand_width(), 2);
        assert_eq!(Opcode::JumpIfFalse.operand_width(), 2);
        assert_eq!(Opcode::Add.operand_width(), 0);
        assert_eq!(Opcode::Halt.operand_width(), 0);
    }

    #[test]
    fn test_mnemonics() {
        assert_eq!(Opcode::Const.to_string(), "CONST");
        assert_eq!(Opcode::JumpIfFalse.to_string(), "JUMP_IF_FALSE");
        assert_eq!(Opcode::AndAnd.to_string(), "AND_AND");
    }
}
