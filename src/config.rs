//! Engine configuration

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SqlScopeError;
use crate::scope::DEFAULT_MAX_SCOPE_DEPTH;

/// Tunables for the cache and the context detector.
///
/// Every field has a default, so a config file only needs the keys it changes:
///
/// ```json
/// { "debounce_ms": 250, "fallback_enabled": false }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Quiet period after the last change notification before a reparse fires
    pub debounce_ms: u64,
    /// Lines past the end of a chunk that still count as continuing it
    pub lookahead_lines: usize,
    /// Cap on nested star expansion
    pub max_scope_depth: usize,
    /// Use the text heuristics when the parser path finds nothing
    pub fallback_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 150,
            lookahead_lines: 2,
            max_scope_depth: DEFAULT_MAX_SCOPE_DEPTH,
            fallback_enabled: true,
        }
    }
}

impl EngineConfig {
    /// Load a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self, SqlScopeError> {
        let content = fs::read_to_string(path).map_err(|e| SqlScopeError::ConfigReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| SqlScopeError::ConfigParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
