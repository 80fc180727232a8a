//! # Precomp - Builtin Library Precompiler
//!
//! Precompiles a directory of standard-library source modules into a single
//! serialized table of low-level function descriptors. The main compiler
//! loads that table once and reuses it for every later compilation instead
//! of recompiling the standard library on each invocation.
//!
//! ## Architecture
//!
//! ```text
//! builtins/*.js → Loader → Frontend → Normalizer → Rewrite ──┐
//!                                          (AllocationRegistry)
//!                                                            ↓
//!                                  BuiltinsTable → artifact on disk
//! ```
//!
//! The heart of the crate is the rewrite pass: each module is compiled in
//! isolation, so its IR carries references that are only valid inside that
//! one compilation. The pass rewrites them into forms that survive linking:
//!
//! - numeric call indices become symbolic names, bound back to absolute
//!   indices by the final assembly's symbol binder;
//! - allocation sites for heap-typed locals become deferred allocates over
//!   a run-wide deduplicated page namespace, realized by the assembly's
//!   allocator at most once per logical name;
//! - exception raises become deferred raise operations, realized by the
//!   assembly's runtime-specific raiser.
//!
//! ## Main Components
//!
//! - [`SourceLoader`] - Resolves modules to source text (static or
//!   generated) and directive flags
//! - [`Frontend`] - Boundary trait for the external language frontend
//! - [`Precompiler`] - Runs the whole pipeline over a module directory
//! - [`AllocationRegistry`] - Run-wide claim-once set of logical page names
//! - [`BuiltinsTable`] - The final artifact, rendered per entry against
//!   [`Services`] at final assembly time
//!
//! ## Quick Start
//!
//! ```ignore
//! use precomp::Precompiler;
//!
//! let precompiler = Precompiler::new(frontend);
//! let table = precompiler
//!     .precompile_to(Path::new("compiler/builtins"), Path::new("generated_builtins.json"))
//!     .await?;
//! ```
//!
//! Later, at final assembly time:
//!
//! ```ignore
//! use precomp::{BuiltinsTable, Services};
//!
//! let table = BuiltinsTable::load(Path::new("generated_builtins.json"))?;
//! let entry = table.get("__Array_prototype_at").unwrap();
//! let code = entry.render(&mut Services {
//!     allocator: Some(&mut pages),
//!     symbol_binder: Some(&mut symbols),
//!     raiser: Some(&mut raiser),
//! })?;
//! ```

/// Version of the precompiler
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod frontend;
pub mod ir;
pub mod loader;
pub mod precompiler;
pub mod table;

// Re-export main types
pub use error::{Error, Result};
pub use frontend::{CompileMode, Frontend};
pub use ir::{CompiledUnit, Instr, TypeTag, ValueType};
pub use loader::{LoadedModule, ModuleSource, SourceLoader, DEFAULT_FLAGS};
pub use precompiler::registry::AllocationRegistry;
pub use precompiler::{PrecompileOptions, Precompiler};
pub use table::{
    Allocator, BuiltinEntry, BuiltinsTable, Raiser, ReturnSpec, ServiceSet, Services,
    SymbolBinder, TableOp, PAGE_SIZE,
};
