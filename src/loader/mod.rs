//! # Source Loader
//!
//! Resolves each builtin module to concrete source text and the extra
//! frontend flags its directive line requests.
//!
//! A module is either plain text on disk, or a *generator*: a module whose
//! text must be produced by running a registered procedure instead of being
//! read literally. The two kinds are reified as [`ModuleSource`] so later
//! stages never inspect raw first lines themselves.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tracing::debug;

use crate::error::{Error, Result};

/// First-line marker for modules whose source must be generated
pub const GENERATOR_DIRECTIVE: &str = "// @generate";

/// First-line marker introducing extra frontend flags
pub const FLAGS_DIRECTIVE: &str = "// @flags ";

/// Flags passed to the frontend for every builtin module
///
/// Opaque to this pass beyond pass-through: they configure numeric-overflow
/// semantics, type stripping and optimization in the frontend. Directive
/// flags are prepended so they win over these defaults.
pub const DEFAULT_FLAGS: &[&str] = &[
    "--bytestring",
    "--truthy=no_nan_negative",
    "--scoped-page-names",
    "--fast-length",
    "--parse-types",
    "--opt-types",
];

/// An async procedure producing generated source text
pub type Generator =
    Box<dyn Fn() -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send>> + Send + Sync>;

/// How a module's source text is obtained
pub enum ModuleSource {
    /// The file contents are the source
    StaticText(String),
    /// The source must be produced by running the module's generator
    Generated(String),
}

/// A module resolved to source text and assembled frontend flags
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedModule {
    /// Module name (file stem)
    pub name: String,
    /// Path the module was loaded from
    pub path: PathBuf,
    /// Resolved source text
    pub source: String,
    /// Directive flags followed by the default flag set
    pub flags: Vec<String>,
}

/// Resolves builtin module paths to [`LoadedModule`]s
pub struct SourceLoader {
    default_flags: Vec<String>,
    generators: HashMap<String, Generator>,
}

impl SourceLoader {
    /// Create a loader with the given default frontend flags
    pub fn new(default_flags: Vec<String>) -> Self {
        Self {
            default_flags,
            generators: HashMap::new(),
        }
    }

    /// Register the generator procedure for a generated module
    ///
    /// `name` must match the module's file stem. The module file itself
    /// still exists on disk carrying the generator directive as its first
    /// line; its remaining contents are ignored.
    pub fn register_generator<F, Fut>(&mut self, name: impl Into<String>, generator: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        let boxed: Generator = Box::new(move || Box::pin(generator()));
        self.generators.insert(name.into(), boxed);
    }

    /// Resolve a module path to source text and flags
    ///
    /// Fails with [`Error::Load`] when the file cannot be read, when a
    /// generator directive names no registered generator, or when the
    /// generator itself fails.
    pub async fn load(&self, path: &Path) -> Result<LoadedModule> {
        let text =
            std::fs::read_to_string(path).map_err(|e| Error::load(path, e.to_string()))?;
        let name = module_name(path);

        let source = match classify(&name, text) {
            ModuleSource::StaticText(text) => text,
            ModuleSource::Generated(name) => {
                debug!(module = %name, "running source generator");
                let generator = self.generators.get(&name).ok_or_else(|| {
                    Error::load(path, format!("no generator registered for `{name}`"))
                })?;
                generator()
                    .await
                    .map_err(|e| Error::load(path, format!("generator failed: {e}")))?
            }
        };

        let flags = self.assemble_flags(&source);

        Ok(LoadedModule {
            name,
            path: path.to_owned(),
            source,
            flags,
        })
    }

    /// Directive flags from the (possibly regenerated) first line,
    /// prepended to the defaults
    fn assemble_flags(&self, source: &str) -> Vec<String> {
        let first = first_line(source);
        let mut flags = Vec::new();
        if let Some(rest) = first.strip_prefix(FLAGS_DIRECTIVE) {
            flags.extend(rest.split(' ').filter(|t| !t.is_empty()).map(String::from));
        }
        flags.extend(self.default_flags.iter().cloned());
        flags
    }
}

/// Tag a module's raw file contents as static or generated
fn classify(name: &str, text: String) -> ModuleSource {
    if first_line(&text).starts_with(GENERATOR_DIRECTIVE) {
        ModuleSource::Generated(name.to_owned())
    } else {
        ModuleSource::StaticText(text)
    }
}

fn first_line(source: &str) -> &str {
    source.lines().next().unwrap_or("")
}

fn module_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
