//! Engine lifecycle: buffers, debounced rebuilds and configuration

use std::sync::Arc;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;

use sql_scope::{
    BufferSource, CompletionEngine, ContextType, EngineConfig, InMemoryBuffer, SqlScopeError,
};

use crate::common::{sample_metadata, TestWorkspace};

fn engine() -> CompletionEngine {
    CompletionEngine::with_metadata(EngineConfig::default(), Arc::new(sample_metadata()))
}

#[test]
fn test_buffers_are_independent() {
    let mut engine = engine();
    let left = Arc::new(InMemoryBuffer::new("SELECT * FROM "));
    let right = Arc::new(InMemoryBuffer::new("EXEC "));
    engine.open("left.sql", left);
    engine.open("right.sql", right);

    let ctx = engine.context_at("left.sql", 1, 15).unwrap();
    assert_eq!(ctx.context_type, ContextType::Table);
    let ctx = engine.context_at("right.sql", 1, 6).unwrap();
    assert_eq!(ctx.context_type, ContextType::Procedure);

    assert!(engine.close("left.sql"));
    assert!(!engine.close("left.sql"));
    let err = engine.context_at("left.sql", 1, 15).unwrap_err();
    assert!(matches!(err, SqlScopeError::UnknownBuffer { buffer_id } if buffer_id == "left.sql"));
}

#[test]
fn test_debounced_rebuild_fires_after_quiet_period() {
    let mut engine = engine();
    let buffer = Arc::new(InMemoryBuffer::new("SELECT 1"));
    engine.open("a.sql", buffer.clone());
    let first = engine.get_or_build_cache("a.sql").unwrap();

    let start = Instant::now();
    buffer.set_text("SELECT 1;\nSELECT 2");
    engine.notify_change("a.sql", start).unwrap();
    assert!(engine.poll(start + Duration::from_millis(50)).is_empty());

    // A second edit restarts the quiet period.
    engine
        .notify_change("a.sql", start + Duration::from_millis(100))
        .unwrap();
    assert!(engine.poll(start + Duration::from_millis(200)).is_empty());
    assert_eq!(
        engine.poll(start + Duration::from_millis(260)),
        vec!["a.sql".to_string()]
    );

    let rebuilt = engine.get_or_build_cache("a.sql").unwrap();
    assert_eq!(rebuilt.revision, buffer.current_revision());
    assert_eq!(first.chunks.len(), 1);
    assert_eq!(rebuilt.chunks.len(), 2);
}

#[test]
fn test_stale_snapshot_rebuilt_on_query() {
    let mut engine = engine();
    let buffer = Arc::new(InMemoryBuffer::new("SELECT * FROM Users u WHERE "));
    engine.open("q.sql", buffer.clone());
    assert_eq!(
        engine.context_at("q.sql", 1, 29).unwrap().context_type,
        ContextType::Column
    );

    // No notification: the revision change alone forces a reparse.
    buffer.set_line(0, "SELECT * FROM Users u JOIN ");
    assert_eq!(
        engine.context_at("q.sql", 1, 28).unwrap().context_type,
        ContextType::Table
    );
}

#[test]
fn test_invalidate_forces_reparse() {
    let mut engine = engine();
    engine.open("a.sql", Arc::new(InMemoryBuffer::new("SELECT 1")));
    let first = engine.get_or_build_cache("a.sql").unwrap();
    assert!(engine.invalidate("a.sql"));
    assert!(!engine.invalidate("missing.sql"));
    let second = engine.get_or_build_cache("a.sql").unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(first.chunks, second.chunks);
}

#[test]
fn test_column_candidates_through_engine() {
    let mut engine = engine();
    engine.open(
        "a.sql",
        Arc::new(InMemoryBuffer::new("SELECT o. FROM sales.Orders o")),
    );
    assert_eq!(
        engine.column_candidates("a.sql", 1, 10).unwrap(),
        vec!["id".to_string(), "user_id".to_string(), "total".to_string()]
    );
    assert!(engine.column_candidates("a.sql", 1, 16).unwrap().is_empty());
}

#[test]
fn test_config_file_drives_engine() {
    let workspace = TestWorkspace::new();
    let path = workspace.write(
        "engine.json",
        r#"{ "debounce_ms": 10, "fallback_enabled": false }"#,
    );
    let config = EngineConfig::from_file(&path).unwrap();
    assert_eq!(config.debounce(), Duration::from_millis(10));
    assert_eq!(config.lookahead_lines, EngineConfig::default().lookahead_lines);

    let mut engine = CompletionEngine::new(config);
    engine.open("a.sql", Arc::new(InMemoryBuffer::new("SELECT 1;\n")));
    let ctx = engine.context_at("a.sql", 2, 1).unwrap();
    assert_eq!(ctx.context_type, ContextType::Unknown);
}

#[test]
fn test_config_file_errors() {
    let workspace = TestWorkspace::new();
    let missing = workspace.path("missing.json");
    assert!(matches!(
        EngineConfig::from_file(&missing),
        Err(SqlScopeError::ConfigReadError { .. })
    ));

    let broken = workspace.write("broken.json", "{ debounce_ms: ");
    assert!(matches!(
        EngineConfig::from_file(&broken),
        Err(SqlScopeError::ConfigParseError { .. })
    ));
}
