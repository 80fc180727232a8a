//! Compiled unit shapes produced by the frontend and consumed by the
//! normalizer

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::instruction::{Constant, Instr, TypeTag, ValueType};

/// Output of compiling one builtin module in isolation
///
/// Lifetime: scoped to processing one module; the export normalizer
/// consumes it immediately.
#[derive(Debug, Clone, Default)]
pub struct CompiledUnit {
    /// Every function in the unit, exported or not
    pub funcs: Vec<FuncIr>,
    /// Module globals by name (name order keeps accumulation deterministic)
    pub globals: BTreeMap<String, Global>,
    /// Data segments referenced by functions via index
    pub data: Vec<DataSegment>,
    /// Exception descriptors referenced by functions via id
    pub exceptions: Vec<ExceptionDescriptor>,
}

/// A function as compiled in isolation
///
/// Indices into `data` and `exceptions` refer to the owning
/// [`CompiledUnit`]'s tables and are meaningless outside it.
#[derive(Debug, Clone)]
pub struct FuncIr {
    /// Function name, unique within the final table
    pub name: String,
    /// Unit-local function index (call operands refer to this)
    pub index: u32,
    /// Whether the module exports this function
    pub export: bool,
    /// Parameter value types, in order
    pub params: Vec<ValueType>,
    /// Result value types, in order
    pub returns: Vec<ValueType>,
    /// Concrete language-level return type, or `None` for per-call-site
    /// inference
    pub return_type: Option<TypeTag>,
    /// Locals keyed by name, as declared (params included)
    pub locals: HashMap<String, LocalDecl>,
    /// Instruction sequence, owned exclusively during rewriting
    pub body: Vec<Instr>,
    /// Indices into the unit's data segments
    pub data: Vec<u32>,
    /// Ids into the unit's exception descriptors
    pub exceptions: Vec<u32>,
    /// Page table: logical allocation names this function may claim,
    /// in frontend order
    pub pages: Vec<Page>,
    /// Belongs in the indirect call table
    pub table: bool,
    /// Usable as a constructor
    pub constructor: bool,
}

/// A local as declared by the frontend (positional, keyed by name)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalDecl {
    /// Storage slot index
    pub index: u32,
    /// Machine value type
    pub ty: ValueType,
    /// Language-level type, when the frontend inferred one
    pub type_tag: Option<TypeTag>,
}

/// A module global merged into the artifact's initialization state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Global {
    /// Global name
    pub name: String,
    /// Machine value type
    pub ty: ValueType,
    /// Literal initial value
    pub init: Constant,
}

/// One data segment
///
/// After normalization, offsets within a function are relative to the
/// function's first referenced segment; segments are meaningless outside
/// their owning function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSegment {
    /// Byte payload
    pub bytes: Vec<u8>,
    /// Placement offset; `None` for passive segments
    pub offset: Option<u32>,
}

/// Descriptor of one exception the unit can raise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionDescriptor {
    /// Numeric id, valid only within the originating unit; attached during
    /// normalization so raise tagging can find the descriptor later
    pub id: Option<u32>,
    /// Constructor tag, e.g. `RangeError`
    pub constructor: String,
    /// Message template; may reference runtime values via placeholders
    pub message: String,
}

/// One page-table entry: a logical allocation name plus its storage class
///
/// Logical names identify static storage slots shared by every invocation
/// of a builtin; the registry guarantees each is claimed at most once per
/// run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Logical allocation name (scoped by the frontend, so matching
    /// against local names is by suffix)
    pub name: String,
    /// Storage class label, passed through to the allocator
    pub kind: String,
}

/// A normalized export, ready for the rewrite pass
#[derive(Debug, Clone)]
pub struct BuiltinFunction {
    /// Function name
    pub name: String,
    /// Unit-local index (kept for diagnostics)
    pub index: u32,
    /// Parameter value types
    pub params: Vec<ValueType>,
    /// Result value types
    pub returns: Vec<ValueType>,
    /// Concrete return type, or `None` for per-call-site inference
    pub return_type: Option<TypeTag>,
    /// Locals in slot order, params included
    pub locals: Vec<Local>,
    /// Instruction sequence
    pub body: Vec<Instr>,
    /// Owned data segments, offsets rebased to the function's first
    pub data: Vec<DataSegment>,
    /// Resolved exception descriptors, ids attached
    pub exceptions: Vec<ExceptionDescriptor>,
    /// Page table in frontend order
    pub pages: Vec<Page>,
    /// Belongs in the indirect call table
    pub table: bool,
    /// Usable as a constructor
    pub constructor: bool,
}

impl BuiltinFunction {
    /// Look up a local by storage slot
    pub fn local_by_slot(&self, slot: u32) -> Option<&Local> {
        self.locals.iter().find(|l| l.index == slot)
    }

    /// Look up a resolved exception descriptor by its original unit id
    pub fn exception_by_id(&self, id: u32) -> Option<&ExceptionDescriptor> {
        self.exceptions.iter().find(|e| e.id == Some(id))
    }
}

/// A local in slot order, carrying the name the positional map lost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Local {
    /// Storage slot index
    pub index: u32,
    /// Local name
    pub name: String,
    /// Machine value type
    pub ty: ValueType,
    /// Language-level type, when known
    pub type_tag: Option<TypeTag>,
}
