//! # Builtins Table
//!
//! The final artifact of a precompilation run: one descriptor per surviving
//! function, plus the collected globals. The main compiler loads the table
//! once and, at final assembly time, renders each entry's body by supplying
//! the services the deferred instructions need.
//!
//! ## Module Structure
//!
//! ```text
//! table/
//! ├── mod.rs          # This file - table types, services, rendering
//! └── serialize.rs    # Versioned artifact envelope (write / load)
//! ```

mod serialize;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ir::{BuiltinFunction, CallTarget, Constant, DataSegment, Global, Instr, TypeTag, ValueType};

/// Bytes per static heap page
pub const PAGE_SIZE: u32 = 65536;

/// One rendered-or-deferred instruction in a table entry's body
///
/// The three deferred shapes stand in for operations whose concrete
/// realization needs services that exist only at final assembly time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TableOp {
    /// An instruction that survived rewriting untouched
    Plain(Instr),
    /// Deferred static-page allocation, stored into a local
    ///
    /// Collapsed from a constant-push plus local-store pair; renders as a
    /// constant push of the allocated page address followed by the
    /// original store.
    Allocate {
        /// Logical allocation name
        page: String,
        /// Storage class label for the allocator
        kind: String,
        /// Value type of the collapsed push (carries the width)
        ty: ValueType,
        /// Target local slot of the collapsed store
        local: u32,
        /// Whether the store kept the value on the stack
        tee: bool,
    },
    /// Deferred call by symbolic name
    CallNamed {
        /// Callee name, bound to an absolute index at assembly
        name: String,
    },
    /// Deferred exception raise
    Raise {
        /// Constructor tag, e.g. `RangeError`
        constructor: String,
        /// Message text
        message: String,
    },
}

/// Return spec of a table entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ReturnSpec {
    /// The return type is this concrete tag
    Concrete(TypeTag),
    /// Infer the return type per call site
    Infer,
}

/// Which services an entry's body references
///
/// Callers may omit any service the set does not require.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSet {
    /// Body contains at least one `Allocate`
    pub allocator: bool,
    /// Body contains at least one `CallNamed`
    pub symbol_binder: bool,
    /// Body contains at least one `Raise`
    pub raiser: bool,
}

impl ServiceSet {
    /// Compute the set for a body
    pub fn of(body: &[TableOp]) -> Self {
        let mut set = ServiceSet::default();
        for op in body {
            match op {
                TableOp::Allocate { .. } => set.allocator = true,
                TableOp::CallNamed { .. } => set.symbol_binder = true,
                TableOp::Raise { .. } => set.raiser = true,
                TableOp::Plain(_) => {}
            }
        }
        set
    }
}

/// Descriptor of one precompiled builtin function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuiltinEntry {
    /// Function name, unique within the table
    pub name: String,
    /// Body with deferred instructions still unresolved
    pub body: Vec<TableOp>,
    /// Parameter value types
    pub params: Vec<ValueType>,
    /// Result value types
    pub returns: Vec<ValueType>,
    /// Concrete return type or per-call-site inference
    pub return_spec: ReturnSpec,
    /// Value types of the non-param locals, in slot order
    pub locals: Vec<ValueType>,
    /// Names of all locals (params included), in slot order
    pub local_names: Vec<String>,
    /// Data segments, offsets relative to the function's first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<DataSegment>,
    /// Belongs in the indirect call table
    pub table: bool,
    /// Usable as a constructor
    pub constructor: bool,
    /// Services the body references
    pub requires: ServiceSet,
}

impl BuiltinEntry {
    /// Build an entry from a normalized function and its rewritten body
    pub fn from_function(func: BuiltinFunction, body: Vec<TableOp>) -> Self {
        let requires = ServiceSet::of(&body);
        let param_count = func.params.len();
        let locals = func
            .locals
            .iter()
            .skip(param_count)
            .map(|l| l.ty)
            .collect();
        let local_names = func.locals.iter().map(|l| l.name.clone()).collect();
        let return_spec = match func.return_type {
            Some(tag) => ReturnSpec::Concrete(tag),
            None => ReturnSpec::Infer,
        };

        BuiltinEntry {
            name: func.name,
            body,
            params: func.params,
            returns: func.returns,
            return_spec,
            locals,
            local_names,
            data: func.data,
            table: func.table,
            constructor: func.constructor,
            requires,
        }
    }

    /// Render the body into concrete instructions using the given services
    ///
    /// Fails with [`Error::MissingService`] if a deferred instruction's
    /// service is absent from `services`.
    pub fn render(&self, services: &mut Services<'_>) -> Result<Vec<Instr>> {
        let mut out = Vec::with_capacity(self.body.len());
        for op in &self.body {
            match op {
                TableOp::Plain(instr) => out.push(instr.clone()),

                TableOp::Allocate {
                    page,
                    kind,
                    ty,
                    local,
                    tee,
                } => {
                    let allocator = services
                        .allocator
                        .as_deref_mut()
                        .ok_or_else(|| self.missing("allocator"))?;
                    let address = allocator.alloc_page(page, kind) * PAGE_SIZE;
                    out.push(Instr::Const {
                        ty: *ty,
                        value: match ty {
                            ValueType::F32 | ValueType::F64 => Constant::Float(address as f64),
                            ValueType::I32 | ValueType::I64 => Constant::Int(address as i64),
                        },
                    });
                    out.push(if *tee {
                        Instr::LocalTee(*local)
                    } else {
                        Instr::LocalSet(*local)
                    });
                }

                TableOp::CallNamed { name } => {
                    let binder = services
                        .symbol_binder
                        .as_deref_mut()
                        .ok_or_else(|| self.missing("symbol binder"))?;
                    out.push(Instr::Call {
                        target: CallTarget::Index(binder.resolve(name)),
                    });
                }

                TableOp::Raise {
                    constructor,
                    message,
                } => {
                    let raiser = services
                        .raiser
                        .as_deref_mut()
                        .ok_or_else(|| self.missing("raiser"))?;
                    out.extend(raiser.raise(constructor, message));
                }
            }
        }
        Ok(out)
    }

    fn missing(&self, service: &'static str) -> Error {
        Error::MissingService {
            entry: self.name.clone(),
            service,
        }
    }
}

/// The complete precompiled builtins table
///
/// Created once per precompilation run and immutable thereafter; the main
/// compiler loads it at every subsequent compilation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuiltinsTable {
    /// Entries in processing order (module order, then function order)
    pub entries: Vec<BuiltinEntry>,
    /// Globals merged from every module, in per-module name order
    pub globals: Vec<Global>,
}

impl BuiltinsTable {
    /// Look up an entry by function name
    pub fn get(&self, name: &str) -> Option<&BuiltinEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Allocates static heap pages at final assembly time
///
/// Returns the page index for a logical name; called at most once per name
/// per program thanks to registry deduplication during precompilation.
pub trait Allocator {
    /// Reserve (or look up) the page for `name` with storage class `kind`
    fn alloc_page(&mut self, name: &str, kind: &str) -> u32;
}

/// Binds symbolic function names to absolute indices at final assembly time
pub trait SymbolBinder {
    /// Absolute function index for `name` in the assembled program
    fn resolve(&mut self, name: &str) -> u32;
}

/// Emits the runtime-specific raise sequence at final assembly time
pub trait Raiser {
    /// Instruction sequence that raises `constructor` with `message`
    fn raise(&mut self, constructor: &str, message: &str) -> Vec<Instr>;
}

/// Optional services supplied by the final assembly stage
///
/// Each member is needed only if the entry being rendered references it;
/// see [`BuiltinEntry::requires`].
#[derive(Default)]
pub struct Services<'a> {
    /// Static page allocator
    pub allocator: Option<&'a mut dyn Allocator>,
    /// Function name binder
    pub symbol_binder: Option<&'a mut dyn SymbolBinder>,
    /// Exception raiser
    pub raiser: Option<&'a mut dyn Raiser>,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedAllocator(u32);
    impl Allocator for FixedAllocator {
        fn alloc_page(&mut self, _name: &str, _kind: &str) -> u32 {
            self.0
        }
    }

    struct FixedBinder(u32);
    impl SymbolBinder for FixedBinder {
        fn resolve(&mut self, _name: &str) -> u32 {
            self.0
        }
    }

    struct UnwindRaiser;
    impl Raiser for UnwindRaiser {
        fn raise(&mut self, _constructor: &str, _message: &str) -> Vec<Instr> {
            vec![
                Instr::Const {
                    ty: ValueType::I32,
                    value: Constant::Int(-1),
                },
                Instr::Raw {
                    opcode: 0x0f,
                    operands: vec![],
                },
            ]
        }
    }

    fn entry(body: Vec<TableOp>) -> BuiltinEntry {
        let requires = ServiceSet::of(&body);
        BuiltinEntry {
            name: "at".to_string(),
            body,
            params: vec![ValueType::F64],
            returns: vec![ValueType::F64],
            return_spec: ReturnSpec::Infer,
            locals: vec![],
            local_names: vec!["x".to_string()],
            data: vec![],
            table: false,
            constructor: false,
            requires,
        }
    }

    #[test]
    fn test_service_set_reflects_body() {
        let set = ServiceSet::of(&[
            TableOp::Plain(Instr::LocalGet(0)),
            TableOp::CallNamed {
                name: "__length".to_string(),
            },
        ]);
        assert!(!set.allocator);
        assert!(set.symbol_binder);
        assert!(!set.raiser);
    }

    #[test]
    fn test_render_allocate_expands_to_push_and_store() {
        let e = entry(vec![TableOp::Allocate {
            page: "array/at/arr_out".to_string(),
            kind: "Array".to_string(),
            ty: ValueType::F64,
            local: 3,
            tee: false,
        }]);

        let mut allocator = FixedAllocator(2);
        let mut services = Services {
            allocator: Some(&mut allocator),
            ..Default::default()
        };
        let rendered = e.render(&mut services).unwrap();

        assert_eq!(
            rendered,
            vec![
                Instr::Const {
                    ty: ValueType::F64,
                    value: Constant::Float((2 * PAGE_SIZE) as f64),
                },
                Instr::LocalSet(3),
            ]
        );
    }

    #[test]
    fn test_render_call_named_binds_index() {
        let e = entry(vec![TableOp::CallNamed {
            name: "__charCodeAt".to_string(),
        }]);

        let mut binder = FixedBinder(41);
        let mut services = Services {
            symbol_binder: Some(&mut binder),
            ..Default::default()
        };
        let rendered = e.render(&mut services).unwrap();
        assert_eq!(
            rendered,
            vec![Instr::Call {
                target: CallTarget::Index(41)
            }]
        );
    }

    #[test]
    fn test_render_raise_splices_sequence() {
        let e = entry(vec![TableOp::Raise {
            constructor: "RangeError".to_string(),
            message: "out of bounds".to_string(),
        }]);

        let mut raiser = UnwindRaiser;
        let mut services = Services {
            raiser: Some(&mut raiser),
            ..Default::default()
        };
        let rendered = e.render(&mut services).unwrap();
        assert_eq!(rendered.len(), 2);
    }

    #[test]
    fn test_render_without_required_service_fails() {
        let e = entry(vec![TableOp::Allocate {
            page: "p".to_string(),
            kind: "String".to_string(),
            ty: ValueType::I32,
            local: 0,
            tee: true,
        }]);

        let err = e.render(&mut Services::default()).unwrap_err();
        assert!(matches!(err, Error::MissingService { service: "allocator", .. }));
    }
}
