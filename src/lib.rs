//! A register-based bytecode virtual machine with tagged values, closure
//! calls, and structural pattern-match dispatch.
//!
//! Programs are flat `&[u32]` buffers of packed instructions; compound data
//! and pattern tables live in a constant pool supplied alongside the code.
//! The quickest way in is [`execute`]:
//!
//! ```
//! use tagvm::{execute, Instr, assemble};
//!
//! let program = assemble(&[
//!     Instr::LoadI { dst: 1, imm: 5 },
//!     Instr::LoadI { dst: 2, imm: 32 },
//!     Instr::Add { dst: 0, lhs: 1, rhs: 2 },
//!     Instr::Halt,
//! ])?;
//! let result = execute(&program, &[])?;
//! assert_eq!(result, tagvm::Value::Number(37));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Hosts that load a program once and run it repeatedly, or that need a
//! custom call-depth limit, use [`Vm`] directly.

pub mod diagnostic;
pub mod fault;
pub mod instr;
pub mod pool;
pub mod value;
pub mod vm;

pub use fault::{Fault, FaultKind};
pub use instr::{assemble, decode, Instr, Opcode};
pub use pool::{ConstantPool, PoolEntry};
pub use value::{Closure, DataRecord, Tag, Value};
pub use vm::{execute, Vm, DEFAULT_MAX_DEPTH, FRAME_REGS};
