//! # Precompiler Pipeline
//!
//! Orchestrates one precompilation run over a directory of builtin
//! modules:
//!
//! ```text
//! load → frontend compile → normalize exports → rewrite (registry) → table
//! ```
//!
//! One logical thread of control: modules are processed in sorted file-name
//! order and each module's registry writes are complete before the next
//! module starts, so the allocation claim order observable in the artifact
//! is reproducible. Any load or compile failure aborts the run with no
//! artifact written.
//!
//! ## Module Structure
//!
//! ```text
//! precompiler/
//! ├── mod.rs          # This file - Precompiler, PrecompileOptions
//! ├── normalize.rs    # Export normalizer
//! ├── registry.rs     # AllocationRegistry (run-wide claim set)
//! └── rewrite.rs      # Instruction rewrite pass
//! ```

pub mod normalize;
pub mod registry;
pub mod rewrite;

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::frontend::{validate_unit, CompileMode, Frontend};
use crate::loader::{SourceLoader, DEFAULT_FLAGS};
use crate::table::{BuiltinEntry, BuiltinsTable};

use normalize::normalize_unit;
use registry::AllocationRegistry;

/// Precompilation options
#[derive(Debug, Clone)]
pub struct PrecompileOptions {
    /// Frontend flags applied to every module (directive flags prepend)
    pub default_flags: Vec<String>,
    /// Files with this suffix are descriptor-only and skipped
    pub skip_suffix: String,
    /// Distinguished entry-point name excluded from the table
    pub entry_name: String,
}

impl Default for PrecompileOptions {
    fn default() -> Self {
        Self {
            default_flags: DEFAULT_FLAGS.iter().map(|s| s.to_string()).collect(),
            skip_suffix: ".d.ts".to_string(),
            entry_name: "main".to_string(),
        }
    }
}

/// Builtin library precompiler
///
/// Created once per run around an external [`Frontend`]; the run itself is
/// [`precompile_dir`](Self::precompile_dir) (table in memory) or
/// [`precompile_to`](Self::precompile_to) (table written to disk).
pub struct Precompiler<F> {
    frontend: F,
    loader: SourceLoader,
    options: PrecompileOptions,
}

impl<F: Frontend> Precompiler<F> {
    /// Create a precompiler with default options
    pub fn new(frontend: F) -> Self {
        Self::with_options(frontend, PrecompileOptions::default())
    }

    /// Create a precompiler with explicit options
    pub fn with_options(frontend: F, options: PrecompileOptions) -> Self {
        Self {
            frontend,
            loader: SourceLoader::new(options.default_flags.clone()),
            options,
        }
    }

    /// Access the loader, e.g. to register source generators
    pub fn loader_mut(&mut self) -> &mut SourceLoader {
        &mut self.loader
    }

    /// Precompile every module in `dir` into a builtins table
    pub async fn precompile_dir(&self, dir: &Path) -> Result<BuiltinsTable> {
        let mut registry = AllocationRegistry::new();
        let mut table = BuiltinsTable::default();

        for path in self.module_paths(dir)? {
            self.precompile_module(&path, &mut registry, &mut table)
                .await?;
        }

        info!(
            entries = table.len(),
            pages = registry.len(),
            "precompilation complete"
        );
        Ok(table)
    }

    /// Precompile `dir` and write the artifact to `out`
    ///
    /// Writing is the terminal side-effecting step: a failed run leaves no
    /// partial artifact behind.
    pub async fn precompile_to(&self, dir: &Path, out: &Path) -> Result<BuiltinsTable> {
        let table = self.precompile_dir(dir).await?;
        table.write(out)?;
        Ok(table)
    }

    /// Module files in sorted name order, descriptor-only files skipped
    fn module_paths(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if name.ends_with(&self.options.skip_suffix) {
                debug!(file = %name, "skipping descriptor-only file");
                continue;
            }
            paths.push(path);
        }
        // Claim order is observable in the artifact; sorting makes it
        // independent of filesystem readdir order
        paths.sort();
        Ok(paths)
    }

    async fn precompile_module(
        &self,
        path: &Path,
        registry: &mut AllocationRegistry,
        table: &mut BuiltinsTable,
    ) -> Result<()> {
        let module = self.loader.load(path).await?;
        info!(module = %module.name, "precompiling builtin module");

        let unit = self
            .frontend
            .compile(
                &module.source,
                &module.flags,
                &[CompileMode::Module, CompileMode::Typed],
            )
            .await
            .map_err(|e| Error::compile(path, e.to_string()))?;
        validate_unit(&unit).map_err(|reason| Error::MalformedUnit {
            path: path.to_owned(),
            reason,
        })?;

        let normalized = normalize_unit(unit, &self.options.entry_name);
        for mut func in normalized.funcs {
            let body = std::mem::take(&mut func.body);
            let ops = rewrite::rewrite(&func, body, &normalized.index, registry);
            table.entries.push(BuiltinEntry::from_function(func, ops));
        }
        table.globals.extend(normalized.globals);
        Ok(())
    }
}
