//! Cursor context detection over whole scripts
//!
//! Cursor positions are written inline with `|`.

use pretty_assertions::assert_eq;

use sql_scope::cache::BufferSnapshot;
use sql_scope::{candidate_columns, context_for_text, ContextMode, ContextType, EngineConfig};

use crate::common::{context_at_marker, sample_metadata, split_cursor};

fn candidates_at_marker(marked: &str) -> Vec<String> {
    let (text, line, col) = split_cursor(marked);
    let metadata = sample_metadata();
    let config = EngineConfig::default();
    let ctx = context_for_text(&text, line, col, &config, &metadata);
    let snapshot = BufferSnapshot::build(0, text, config.max_scope_depth);
    candidate_columns(&ctx, &snapshot, &metadata)
}

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

// ============================================================================
// Statement Positions
// ============================================================================

#[test]
fn test_multiline_select_positions() {
    let script = "SELECT u.id,\n       |\nFROM Users u\nWHERE u.id > 1";
    let ctx = context_at_marker(script);
    assert_eq!(ctx.context_type, ContextType::Column);
    assert_eq!(ctx.clause.as_deref(), Some("select"));
    assert!(ctx.aliases.contains_key("u"));
}

#[test]
fn test_update_and_delete_targets() {
    let ctx = context_at_marker("UPDATE Users SET |");
    assert_eq!(ctx.context_type, ContextType::Column);
    assert_eq!(ctx.clause.as_deref(), Some("set"));

    let ctx = context_at_marker("DELETE FROM |");
    assert_eq!(ctx.context_type, ContextType::Table);
}

#[test]
fn test_procedure_positions() {
    let ctx = context_at_marker("EXEC |");
    assert_eq!(ctx.context_type, ContextType::Procedure);

    let ctx = context_at_marker("EXEC dbo.|");
    assert_eq!(ctx.context_type, ContextType::Procedure);
    assert_eq!(ctx.mode, ContextMode::Qualified);
    assert_eq!(ctx.schema.as_deref(), Some("dbo"));
}

#[test]
fn test_schema_qualifier_in_where_uses_metadata() {
    let ctx = context_at_marker("SELECT * FROM Users WHERE id IN (SELECT user_id FROM sales.|");
    assert_eq!(ctx.context_type, ContextType::Table);
    assert_eq!(ctx.schema.as_deref(), Some("sales"));

    let ctx = context_at_marker("SELECT * FROM Users u WHERE u.|");
    assert_eq!(ctx.context_type, ContextType::Column);
    assert_eq!(ctx.table_ref.as_deref(), Some("u"));
}

// ============================================================================
// Suppression And Fallback
// ============================================================================

#[test]
fn test_comments_and_strings_suppress() {
    let ctx = context_at_marker("SELECT id -- FROM |");
    assert!(ctx.is_suppressed());

    let ctx = context_at_marker("SELECT id FROM Users /* u.| */");
    assert!(ctx.is_suppressed());

    let ctx = context_at_marker("SELECT * FROM Users WHERE name = 'ab|c'");
    assert!(ctx.is_suppressed());
}

#[test]
fn test_fallback_after_terminated_statement() {
    let (text, line, col) = split_cursor("SELECT 1;\n|");
    let metadata = sample_metadata();

    let ctx = context_for_text(&text, line, col, &EngineConfig::default(), &metadata);
    assert_eq!(ctx.context_type, ContextType::Keyword);
    assert_eq!(ctx.mode, ContextMode::Fallback);

    let config = EngineConfig {
        fallback_enabled: false,
        ..EngineConfig::default()
    };
    let ctx = context_for_text(&text, line, col, &config, &metadata);
    assert_eq!(ctx.context_type, ContextType::Unknown);
}

// ============================================================================
// Column Candidates
// ============================================================================

#[test]
fn test_candidates_from_provider() {
    assert_eq!(
        candidates_at_marker("SELECT u.| FROM Users u"),
        strings(&["id", "name", "email"])
    );
    assert_eq!(
        candidates_at_marker("SELECT o.t| FROM sales.Orders o"),
        strings(&["total"])
    );
}

#[test]
fn test_candidates_from_cte() {
    assert_eq!(
        candidates_at_marker("WITH c AS (SELECT id, total FROM sales.Orders) SELECT c.| FROM c"),
        strings(&["id", "total"])
    );
}

#[test]
fn test_candidates_from_derived_star() {
    assert_eq!(
        candidates_at_marker("SELECT s.| FROM (SELECT * FROM Users) s"),
        strings(&["id", "name", "email"])
    );
}

#[test]
fn test_candidates_from_temp_table() {
    assert_eq!(
        candidates_at_marker("CREATE TABLE #w (a INT, b INT)\nSELECT w.| FROM #w w"),
        strings(&["a", "b"])
    );
}

#[test]
fn test_candidates_from_table_variable() {
    assert_eq!(
        candidates_at_marker("DECLARE @tv TABLE (k INT, v INT)\nSELECT t.| FROM @tv t"),
        strings(&["k", "v"])
    );
}

#[test]
fn test_candidates_empty_outside_column_positions() {
    assert!(candidates_at_marker("SELECT * FROM |").is_empty());
}
