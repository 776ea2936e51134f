//! Error types for sql-scope

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced at the edges of the engine.
///
/// Parsing and context detection never fail; only file access, configuration
/// and buffer lookups can.
#[derive(Error, Debug)]
pub enum SqlScopeError {
    #[error("Failed to read SQL file: {path}")]
    SqlFileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read config file: {path}")]
    ConfigReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {path}")]
    ConfigParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unknown buffer: {buffer_id}")]
    UnknownBuffer { buffer_id: String },

    #[error("Invalid file pattern: {pattern}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}
