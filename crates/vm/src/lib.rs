//! Stack virtual machine for Ember bytecode.
//!
//! The machine borrows a validated top-level [`ember_core::Chunk`] and runs
//! its fetch–decode–execute loop until `HALT`. Execution is single-threaded
//! and synchronous; runtime errors (stack underflow, operand-type mismatch,
//! division by zero, unknown or reserved opcode) abort the run and are
//! never caught.
//!
//! ```rust,ignore
//! let chunk = emberc::compile_source(source, "demo.em")?;
//! let stack = ember_vm::interpret(&chunk)?;
//! ```

pub mod frame;
pub mod machine;
pub mod stack;

pub use machine::{Vm, interpret};
pub use stack::Stack;
