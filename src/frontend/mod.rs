//! # Frontend Boundary
//!
//! The language frontend that parses, type-checks and compiles one builtin
//! module lives outside this crate; the precompiler only needs the shape of
//! its output. [`Frontend`] is that boundary: one async call per module,
//! source text and assembled flags in, [`CompiledUnit`] out.

use async_trait::async_trait;

use crate::ir::CompiledUnit;

/// Compilation mode requested from the frontend
///
/// The precompiler always requests both: `Module` for the general
/// compilation shape, `Typed` so locals carry language-level type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileMode {
    /// Compile as a module (exports tracked)
    Module,
    /// Attach type metadata to locals and returns
    Typed,
}

/// External frontend invoked once per builtin module
///
/// This is a pass-through boundary: no logic beyond flag assembly on the
/// caller's side and result shape validation. A frontend failure is fatal
/// to the whole precompilation run.
#[async_trait]
pub trait Frontend: Send + Sync {
    /// Compile one module's source under the given flags and modes
    async fn compile(
        &self,
        source: &str,
        flags: &[String],
        modes: &[CompileMode],
    ) -> anyhow::Result<CompiledUnit>;
}

/// Shape validation applied to every unit the frontend returns
///
/// Checks only what later stages assume: function indices must be unique
/// within the unit, and names must be present. Content (instruction
/// validity, type correctness) is the frontend's responsibility.
pub fn validate_unit(unit: &CompiledUnit) -> std::result::Result<(), String> {
    let mut seen = std::collections::HashSet::new();
    for func in &unit.funcs {
        if func.name.is_empty() {
            return Err(format!("function at index {} has no name", func.index));
        }
        if !seen.insert(func.index) {
            return Err(format!("duplicate function index {}", func.index));
        }
    }
    Ok(())
}
