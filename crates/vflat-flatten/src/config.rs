//! Flattening configuration
//!
//! Read from a flat TOML document such as:
//!
//! ```toml
//! infer_memories = true
//! dot_fallback = true
//! max_fold_depth = 64
//! memory_init_calls = ["$readmemh", "$readmemb"]
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options controlling the flattening engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlattenConfig {
    /// Reclassify one-packed, one-unpacked non-port wires as memories
    pub infer_memories: bool,

    /// Rename unresolvable dotted accesses to a composite symbol name
    /// instead of reporting an unknown field
    pub dot_fallback: bool,

    /// Recursion limit when folding parameters that refer to parameters
    pub max_fold_depth: usize,

    /// Calls whose memory argument must stay a memory
    pub memory_init_calls: Vec<String>,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        Self {
            infer_memories: true,
            dot_fallback: true,
            max_fold_depth: 64,
            memory_init_calls: vec!["$readmemh".to_string(), "$readmemb".to_string()],
        }
    }
}

impl FlattenConfig {
    /// Parse a configuration from a file path
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml_str(&contents)
    }

    /// Parse a configuration from a TOML string; missing keys keep defaults
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn is_memory_init_call(&self, name: &str) -> bool {
        self.memory_init_calls.iter().any(|c| c == name)
    }
}
