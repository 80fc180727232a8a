//! Artifact envelope for the builtins table
//!
//! One generated file per precompilation run; writing it is the terminal,
//! side-effecting step, and re-running overwrites it. The encoding is
//! versioned JSON: entries are kept in processing order, so an unchanged
//! module directory produces a byte-identical artifact.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::BuiltinsTable;
use crate::error::{Error, Result};
use crate::ir::Global;

/// Bumped whenever the descriptor encoding changes shape
const ARTIFACT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Artifact {
    version: u32,
    entries: Vec<super::BuiltinEntry>,
    globals: Vec<Global>,
}

impl BuiltinsTable {
    /// Encode the table into artifact bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let artifact = Artifact {
            version: ARTIFACT_VERSION,
            entries: self.entries.clone(),
            globals: self.globals.clone(),
        };
        serde_json::to_vec_pretty(&artifact).map_err(|e| Error::Artifact(e.to_string()))
    }

    /// Write the artifact, replacing any previous run's output
    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Load a previously written artifact
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let artifact: Artifact =
            serde_json::from_slice(&bytes).map_err(|e| Error::Artifact(e.to_string()))?;
        if artifact.version != ARTIFACT_VERSION {
            return Err(Error::Artifact(format!(
                "unsupported artifact version {} (expected {})",
                artifact.version, ARTIFACT_VERSION
            )));
        }
        Ok(BuiltinsTable {
            entries: artifact.entries,
            globals: artifact.globals,
        })
    }
}
