//! Core model shared by the Ember compiler and virtual machine.
//!
//! This crate holds the pieces both sides of the toolchain agree on:
//!
//! - [`Value`]: the tagged runtime value variants that live on the operand
//!   stack and in chunk constant pools.
//! - [`Opcode`] and [`Chunk`]: the bytecode instruction set and the compiled
//!   form of a function (code, constant pool, child function table).
//! - [`RuntimeError`]: the error type every fatal execution failure maps to.
//!
//! The compiler emits chunks; the VM borrows them immutably and executes
//! them. Nothing in this crate performs I/O or allocation beyond the owned
//! vectors inside a chunk.

pub mod chunk;
pub mod error;
pub mod opcode;
pub mod value;

pub use chunk::{Chunk, Function};
pub use error::{RuntimeError, RuntimeErrorKind};
pub use opcode::Opcode;
pub use value::Value;
