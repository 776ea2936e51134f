//! SQL file discovery and loading

use std::path::{Path, PathBuf};

use anyhow::Result;
use encoding_rs::WINDOWS_1252;
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::error::SqlScopeError;
use crate::model::StatementChunk;
use crate::parser::{parse_with_depth, ParseOutput};

/// Minimum number of files to benefit from parallel processing.
/// Below this threshold, sequential processing is faster due to rayon overhead.
const PARALLEL_THRESHOLD: usize = 8;

/// A parsed file.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub output: ParseOutput,
}

/// Per-file statement counts for `scan` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    pub path: PathBuf,
    pub batches: usize,
    pub statements: Vec<StatementSummary>,
    pub temp_tables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementSummary {
    pub statement_type: &'static str,
    pub line: usize,
    pub batch: usize,
    pub tables: Vec<String>,
    pub ctes: Vec<String>,
}

impl ScannedFile {
    pub fn summary(&self) -> FileSummary {
        FileSummary {
            path: self.path.clone(),
            batches: self.output.go_boundaries.len() + 1,
            statements: self.output.chunks.iter().map(statement_summary).collect(),
            temp_tables: self
                .output
                .temp_tables
                .iter()
                .map(|t| t.name.clone())
                .collect(),
        }
    }
}

fn statement_summary(chunk: &StatementChunk) -> StatementSummary {
    StatementSummary {
        statement_type: chunk.statement_type(),
        line: chunk.start.line,
        batch: chunk.go_batch_index,
        tables: chunk.tables.iter().map(|t| t.qualified_name()).collect(),
        ctes: chunk.cte_names(),
    }
}

/// Read a SQL file, falling back to Windows-1252 when it is not valid UTF-8.
pub fn read_sql_file(path: &Path) -> Result<String, SqlScopeError> {
    let content =
        read_file_with_encoding_fallback(path).map_err(|e| SqlScopeError::SqlFileReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

    // Strip UTF-8 BOM if present
    Ok(content
        .strip_prefix('\u{FEFF}')
        .map(str::to_string)
        .unwrap_or(content))
}

fn read_file_with_encoding_fallback(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(err) => {
            // Common for SQL files saved on Windows
            let bytes = err.into_bytes();
            let (decoded, _, had_errors) = WINDOWS_1252.decode(&bytes);
            if had_errors {
                Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "File contains invalid characters",
                ))
            } else {
                Ok(decoded.into_owned())
            }
        }
    }
}

fn is_sql_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("sql"))
}

/// Expand files, directories and glob patterns into a sorted list of `.sql` files.
///
/// Paths matching any `exclude` glob are dropped.
pub fn collect_sql_files(inputs: &[String], exclude: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        if input.contains(['*', '?', '[']) {
            let paths = glob::glob(input).map_err(|e| SqlScopeError::InvalidPattern {
                pattern: input.clone(),
                source: e,
            })?;
            files.extend(paths.filter_map(|p| p.ok()).filter(|p| is_sql_file(p)));
            continue;
        }

        let path = Path::new(input);
        if path.is_dir() {
            for entry in walkdir::WalkDir::new(path)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if entry.file_type().is_file() && is_sql_file(entry.path()) {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else {
            files.push(path.to_path_buf());
        }
    }

    let matchers = exclude
        .iter()
        .map(|pattern| {
            glob::Pattern::new(pattern).map_err(|e| SqlScopeError::InvalidPattern {
                pattern: pattern.clone(),
                source: e,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    files.retain(|file| !matchers.iter().any(|m| m.matches_path(file)));

    files.sort();
    files.dedup();
    Ok(files)
}

/// Parse a single SQL file.
pub fn scan_file(path: &Path, max_scope_depth: usize) -> Result<ScannedFile> {
    let content = read_sql_file(path)?;
    let output = parse_with_depth(&content, max_scope_depth);
    debug!(
        path = %path.display(),
        statements = output.chunks.len(),
        "scanned file"
    );
    Ok(ScannedFile {
        path: path.to_path_buf(),
        output,
    })
}

/// Parse multiple SQL files, using parallel processing for larger file sets.
pub fn scan_files(files: &[PathBuf], max_scope_depth: usize) -> Result<Vec<ScannedFile>> {
    let mut scanned = Vec::with_capacity(files.len());

    if files.len() >= PARALLEL_THRESHOLD {
        let results: Vec<Result<ScannedFile>> = files
            .par_iter()
            .map(|file| scan_file(file, max_scope_depth))
            .collect();

        // Keep input order, propagating the first error if any
        for result in results {
            scanned.push(result?);
        }
    } else {
        for file in files {
            scanned.push(scan_file(file, max_scope_depth)?);
        }
    }

    Ok(scanned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_read_utf8_with_bom() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bom.sql");
        fs::write(&path, b"\xEF\xBB\xBFSELECT 1").unwrap();
        assert_eq!(read_sql_file(&path).unwrap(), "SELECT 1");
    }

    #[test]
    fn test_read_windows_1252() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("latin.sql");
        // 0xE9 is 'é' in Windows-1252 and invalid as a lone UTF-8 byte
        fs::write(&path, b"SELECT 'caf\xE9'").unwrap();
        assert_eq!(read_sql_file(&path).unwrap(), "SELECT 'café'");
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_sql_file(Path::new("/nonexistent/x.sql")).unwrap_err();
        assert!(matches!(err, SqlScopeError::SqlFileReadError { .. }));
    }

    #[test]
    fn test_collect_from_directory_and_exclude() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("views")).unwrap();
        fs::write(dir.path().join("a.sql"), "SELECT 1").unwrap();
        fs::write(dir.path().join("views/b.SQL"), "SELECT 2").unwrap();
        fs::write(dir.path().join("notes.txt"), "nope").unwrap();

        let root = dir.path().to_string_lossy().to_string();
        let files = collect_sql_files(&[root.clone()], &[]).unwrap();
        assert_eq!(files.len(), 2);

        let exclude = format!("{root}/views/*");
        let files = collect_sql_files(&[root], &[exclude]).unwrap();
        assert_eq!(files, vec![dir.path().join("a.sql")]);
    }

    #[test]
    fn test_collect_from_glob() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("one.sql"), "SELECT 1").unwrap();
        fs::write(dir.path().join("two.sql"), "SELECT 2").unwrap();
        fs::write(dir.path().join("three.txt"), "SELECT 3").unwrap();

        let pattern = format!("{}/*", dir.path().display());
        let files = collect_sql_files(&[pattern], &[]).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_scan_files_parallel_keeps_order() {
        let dir = TempDir::new().unwrap();
        let files: Vec<PathBuf> = (0..10)
            .map(|i| {
                let path = dir.path().join(format!("f{i:02}.sql"));
                fs::write(&path, format!("SELECT c{i} FROM t{i}")).unwrap();
                path
            })
            .collect();

        let scanned = scan_files(&files, 16).unwrap();
        assert_eq!(scanned.len(), 10);
        assert_eq!(scanned[3].path, files[3]);
        let summary = scanned[3].summary();
        assert_eq!(summary.statements[0].tables, vec!["t3".to_string()]);
        assert_eq!(summary.batches, 1);
    }
}
