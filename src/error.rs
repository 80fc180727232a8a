//! Error types for the builtin precompiler

use std::path::PathBuf;
use thiserror::Error;

/// Precompiler errors
///
/// Builtins are foundational: a module that fails to load or compile would
/// silently degrade every future compilation, so `Load` and `Compile` abort
/// the whole run instead of skipping the module. There are no retries; the
/// pass is deterministic and re-invocation is the recovery path.
#[derive(Error, Debug)]
pub enum Error {
    /// A builtin module could not be resolved to source text
    ///
    /// **Triggered by:** an unreadable file, or a generator module that
    /// fails while producing its source text
    #[error("failed to load builtin module {}: {reason}", path.display())]
    Load {
        /// Path of the offending module
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },

    /// The frontend rejected a builtin module's source
    #[error("failed to compile builtin module {}: {reason}", path.display())]
    Compile {
        /// Path of the offending module
        path: PathBuf,
        /// Frontend error message
        reason: String,
    },

    /// The frontend returned a unit that violates the boundary contract
    #[error("malformed compiled unit for {}: {reason}", path.display())]
    MalformedUnit {
        /// Path of the offending module
        path: PathBuf,
        /// Shape violation description
        reason: String,
    },

    /// A deferred instruction was rendered without its backing service
    ///
    /// **Triggered by:** calling [`render`](crate::table::BuiltinEntry::render)
    /// with a [`Services`](crate::table::Services) value missing a member
    /// that the entry's [`ServiceSet`](crate::table::ServiceSet) requires
    #[error("entry {entry} requires the {service} service")]
    MissingService {
        /// Name of the table entry being rendered
        entry: String,
        /// Missing service (`allocator`, `symbol binder` or `raiser`)
        service: &'static str,
    },

    /// The output artifact could not be encoded or decoded
    #[error("artifact error: {0}")]
    Artifact(String),

    /// Filesystem failure outside a specific module
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a load error with a message
    pub fn load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Load {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a compile error with a message
    pub fn compile(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Compile {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for precompiler operations
pub type Result<T> = std::result::Result<T, Error>;
