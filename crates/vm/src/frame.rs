//! Call frames.

use ember_core::Chunk;

/// A suspended execution context, pushed by `CALL` and popped by `RETURN`.
#[derive(Debug)]
pub struct CallFrame<'c> {
    /// Instruction pointer to resume at in the caller.
    pub ip: usize,
    /// The caller's chunk.
    pub chunk: &'c Chunk,
    /// Index of the callee in the program's function table, for call-stack
    /// formatting.
    pub func_index: usize,
    /// Operand-stack depth at call time; `RETURN` rewinds to it.
    pub stack_start: usize,
}
