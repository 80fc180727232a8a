//! # Intermediate Representation for Builtin Precompilation
//!
//! Types shared between the frontend boundary and the rewrite pass.
//!
//! ## Module Structure
//!
//! ```text
//! ir/
//! ├── mod.rs          # This file - module definition and re-exports
//! ├── instruction.rs  # ValueType, TypeTag, Constant, CallTarget, Instr
//! └── unit.rs         # CompiledUnit, FuncIr, BuiltinFunction, Global, ...
//! ```
//!
//! ## Key Types
//!
//! - [`Instr`] - One low-level instruction as emitted by the frontend
//! - [`CompiledUnit`] - Everything the frontend produced for one module
//! - [`FuncIr`] - A function as compiled in isolation (unit-local indices)
//! - [`BuiltinFunction`] - A normalized export, ready for rewriting

mod instruction;
mod unit;

pub use instruction::{CallTarget, Constant, Instr, TypeTag, ValueType};
pub use unit::{
    BuiltinFunction, CompiledUnit, DataSegment, ExceptionDescriptor, FuncIr, Global, Local,
    LocalDecl, Page,
};
