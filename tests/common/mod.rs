//! Common test utilities for sql-scope tests

use std::fs;
use std::path::{Path, PathBuf};

use sql_scope::{context_for_text, Context, EngineConfig, StaticMetadata};
use tempfile::TempDir;

/// Marker for the cursor position inside test SQL.
pub const CURSOR: char = '|';

/// Remove the cursor marker, returning the text and the 1-based `(line, col)`
/// it stood at.
pub fn split_cursor(marked: &str) -> (String, usize, usize) {
    let mut line = 1;
    let mut col = 1;
    let mut found = None;
    let mut text = String::with_capacity(marked.len());
    for ch in marked.chars() {
        if ch == CURSOR && found.is_none() {
            found = Some((line, col));
            continue;
        }
        text.push(ch);
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    let (line, col) = found.expect("test SQL must contain a cursor marker");
    (text, line, col)
}

/// Metadata used across the integration tests.
pub fn sample_metadata() -> StaticMetadata {
    StaticMetadata::new()
        .with_schema("sales")
        .with_table("dbo", "T", &["id", "name", "created_at"])
        .with_table("dbo", "Users", &["id", "name", "email"])
        .with_table("sales", "Orders", &["id", "user_id", "total"])
}

/// Detect the context at the cursor marker with default config.
pub fn context_at_marker(marked: &str) -> Context {
    let (text, line, col) = split_cursor(marked);
    context_for_text(
        &text,
        line,
        col,
        &EngineConfig::default(),
        &sample_metadata(),
    )
}

/// Temporary directory holding SQL files for loader tests.
pub struct TestWorkspace {
    /// Kept so the directory lives as long as the workspace
    _temp_dir: TempDir,
    pub root: PathBuf,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path().to_path_buf();
        Self {
            _temp_dir: temp_dir,
            root,
        }
    }

    /// Write a file relative to the workspace root, creating parent dirs.
    pub fn write(&self, relative: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, contents).expect("Failed to write test file");
        path
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn root_str(&self) -> String {
        path_string(&self.root)
    }
}

pub fn path_string(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
