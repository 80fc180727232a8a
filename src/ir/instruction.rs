//! Instruction definitions for the frontend's low-level code

use serde::{Deserialize, Serialize};

/// Machine value type of a constant, local or global
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// 32-bit integer
    I32,
    /// 64-bit integer
    I64,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
}

impl ValueType {
    /// Width of the type in bytes
    pub fn width(&self) -> u8 {
        match self {
            ValueType::I32 | ValueType::F32 => 4,
            ValueType::I64 | ValueType::F64 => 8,
        }
    }
}

/// Language-level type tag attached to locals and return specs
///
/// The numeric values mirror the frontend's type table and are stable
/// across runs; only the three heap categories matter to the rewrite pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TypeTag {
    /// Plain number
    Number = 0,
    /// Boolean
    Boolean = 1,
    /// Heap-allocated two-byte string
    String = 2,
    /// Undefined / unit
    Undefined = 3,
    /// Object reference
    Object = 4,
    /// Function reference
    Function = 5,
    /// Symbol
    Symbol = 6,
    /// Heap-allocated array
    Array = 7,
    /// Heap-allocated single-byte string
    ByteString = 8,
}

impl TypeTag {
    /// Whether values of this type live in a static heap page
    ///
    /// Only locals of these categories are candidates for deferred
    /// allocation (string / array / byte-string).
    pub fn is_heap(&self) -> bool {
        matches!(self, TypeTag::String | TypeTag::Array | TypeTag::ByteString)
    }
}

/// Immediate operand of a constant-push
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    /// Integer immediate (i32 and i64 pushes)
    Int(i64),
    /// Float immediate (f32 and f64 pushes)
    Float(f64),
}

impl Constant {
    /// The integer payload, if this is an integer immediate
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Constant::Int(v) => Some(*v),
            Constant::Float(_) => None,
        }
    }
}

/// Target of a call instruction
///
/// The frontend emits numeric indices that are only valid within one
/// isolated compilation; the rewrite pass resolves them to symbolic names,
/// and final assembly binds names back to absolute indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallTarget {
    /// Unit-local function index
    Index(u32),
    /// Symbolic function name, stable after linking
    Name(String),
}

/// One low-level instruction
///
/// Only the opcodes the precompiler inspects are modelled structurally;
/// everything else passes through as [`Instr::Raw`] untouched. Sequence
/// order is significant and the rewrite pass relies on a one-instruction
/// lookahead over it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instr {
    /// Call a function
    Call {
        /// Callee, by unit-local index or resolved name
        target: CallTarget,
    },
    /// Push a constant
    Const {
        /// Value type of the push
        ty: ValueType,
        /// Immediate operand
        value: Constant,
    },
    /// Read a local onto the stack
    LocalGet(u32),
    /// Pop into a local
    LocalSet(u32),
    /// Store into a local, keeping the value on the stack
    LocalTee(u32),
    /// Throw the exception id on the stack
    Throw {
        /// Exception tag index
        tag: u32,
    },
    /// Any opcode the precompiler never inspects
    Raw {
        /// Opcode byte(s)
        opcode: u16,
        /// Undecoded operands
        operands: Vec<i64>,
    },
}

impl Instr {
    /// The target slot of a plain or keep-on-stack local store
    pub fn store_slot(&self) -> Option<(u32, bool)> {
        match self {
            Instr::LocalSet(slot) => Some((*slot, false)),
            Instr::LocalTee(slot) => Some((*slot, true)),
            _ => None,
        }
    }
}
