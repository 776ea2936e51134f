//! Structural properties of parsing and resolution
//!
//! Each test pins one guarantee callers rely on: stable output, alias and
//! parent resolution, clause spans, scope isolation and temp-table lifetime.

use pretty_assertions::assert_eq;

use sql_scope::cache::BufferSnapshot;
use sql_scope::model::{Position, ScopeRef};
use sql_scope::scope::{columns_for_qualifier, resolve_qualifier, Resolved};
use sql_scope::{candidate_columns, parse, ContextMode, ContextType};

use crate::common::{context_at_marker, sample_metadata, split_cursor};

// ============================================================================
// Parse Stability
// ============================================================================

#[test]
fn test_parse_twice_yields_identical_chunks() {
    let sql = "WITH recent AS (SELECT id, user_id FROM sales.Orders WHERE total > 10)\n\
               SELECT u.name, r.id FROM Users u JOIN recent r ON r.user_id = u.id;\n\
               UPDATE Users SET name = 'x' WHERE id IN (SELECT user_id FROM recent)\n\
               GO\n\
               SELECT * INTO #t FROM T";
    let first = parse(sql);
    let second = parse(sql);
    assert_eq!(first, second);
    assert_eq!(first.chunks.len(), 3);
}

#[test]
fn test_truncated_input_still_parses() {
    for sql in [
        "SELECT",
        "SELECT a.",
        "SELECT * FROM (SELECT id FROM",
        "WITH c AS (",
        "INSERT INTO t (a, b) VALUES (1,",
        "SELECT 'unterminated",
        "SELECT [open",
        "/* open comment",
    ] {
        let output = parse(sql);
        assert!(output.chunks.len() <= 1, "unexpected chunks for {sql:?}");
    }
}

// ============================================================================
// Alias And Parent Resolution
// ============================================================================

#[test]
fn test_alias_maps_to_table_and_column_parent() {
    let output = parse("SELECT col FROM T AS a");
    let chunk = &output.chunks[0];
    assert_eq!(chunk.aliases["a"].name, "T");
    assert_eq!(chunk.columns[0].source_table, None);
    assert_eq!(chunk.columns[0].parent_table.as_deref(), Some("T"));
}

#[test]
fn test_alias_keys_are_case_insensitive() {
    let output = parse("SELECT X.id FROM dbo.T AS X");
    let chunk = &output.chunks[0];
    assert!(chunk.aliases.contains_key("x"));
    assert_eq!(chunk.columns[0].parent_table.as_deref(), Some("T"));
    assert_eq!(chunk.columns[0].parent_schema.as_deref(), Some("dbo"));
}

// ============================================================================
// Clause Spans
// ============================================================================

#[test]
fn test_where_span_runs_from_keyword_to_statement_end() {
    let output = parse("SELECT a.x FROM T a WHERE a.y = 1");
    let chunk = &output.chunks[0];
    let where_span = chunk.clause_positions["where"];
    assert_eq!(where_span.start(), Position::new(1, 21));
    assert_eq!(where_span.end(), chunk.end);
}

#[test]
fn test_clause_spans_are_ordered_and_disjoint() {
    let sql = "SELECT a.x, COUNT(*) FROM T a JOIN Users u ON u.id = a.id\n\
               WHERE a.y = 1 GROUP BY a.x HAVING COUNT(*) > 1 ORDER BY a.x";
    let output = parse(sql);
    let chunk = &output.chunks[0];
    let clauses = chunk.ordered_clauses();
    assert!(clauses.len() >= 7);
    for (name, span) in &clauses {
        assert!(span.start() <= span.end(), "{name} ends before it starts");
    }
    for pair in clauses.windows(2) {
        let (first, a) = pair[0];
        let (second, b) = pair[1];
        assert!(a.end() <= b.start(), "{first} overlaps {second}");
    }
}

#[test]
fn test_qualified_column_after_alias_dot() {
    let ctx = context_at_marker("SELECT a.|x FROM T a WHERE a.y = 1");
    assert_eq!(ctx.context_type, ContextType::Column);
    assert_eq!(ctx.mode, ContextMode::Qualified);
    assert_eq!(ctx.table_ref.as_deref(), Some("a"));
}

// ============================================================================
// Scope Isolation
// ============================================================================

#[test]
fn test_derived_table_columns_only() {
    let marked = "SELECT * FROM (SELECT id FROM T) sub WHERE sub.|id = 1";
    let (text, _, _) = split_cursor(marked);
    let snapshot = BufferSnapshot::build(1, text, 16);
    let chunk = &snapshot.chunks[0];

    let Resolved::Scope(id) = resolve_qualifier(chunk, ScopeRef::Statement, "sub") else {
        panic!("sub should resolve to a derived scope");
    };
    assert_eq!(chunk.scope(id).map(|n| n.column_names()), Some(vec!["id".to_string()]));

    let ctx = context_at_marker(marked);
    assert_eq!(ctx.table_ref.as_deref(), Some("sub"));
    let candidates = candidate_columns(&ctx, &snapshot, &sample_metadata());
    assert_eq!(candidates, vec!["id".to_string()]);
}

#[test]
fn test_cte_not_visible_after_batch_separator() {
    let marked = "WITH X AS (SELECT id FROM T) SELECT * FROM X\nGO\nSELECT x.| FROM X x";
    let ctx = context_at_marker(marked);
    assert_eq!(ctx.batch, 1);
    assert!(ctx.ctes.is_empty());

    let (text, _, _) = split_cursor(marked);
    let output = parse(&text);
    let second = &output.chunks[1];
    assert!(!second.tables[0].is_cte);
    assert_eq!(columns_for_qualifier(second, ScopeRef::Statement, "x"), None);

    let first = &output.chunks[0];
    assert_eq!(
        columns_for_qualifier(first, ScopeRef::Statement, "X"),
        Some(vec!["id".to_string()])
    );
}

#[test]
fn test_temp_table_lifecycle() {
    let script = "SELECT id, name INTO #t FROM T\n\
                  SELECT * FROM |\n\
                  DROP TABLE #t\n\
                  SELECT * FROM ";

    let between = context_at_marker(script);
    assert_eq!(
        between.temp_tables.get("#t"),
        Some(&vec!["id".to_string(), "name".to_string()])
    );

    let after = context_at_marker(&format!("{}|", script.replace('|', "")));
    assert!(!after.temp_tables.contains_key("#t"));
}

#[test]
fn test_temp_table_scoped_to_batch() {
    let ctx = context_at_marker("CREATE TABLE #w (a INT, b INT)\nGO\nSELECT * FROM |");
    assert!(ctx.temp_tables.is_empty());

    let ctx = context_at_marker("CREATE TABLE ##g (a INT)\nGO\nSELECT * FROM |");
    assert!(ctx.temp_tables.contains_key("##g"));
}

// ============================================================================
// Malformed Input
// ============================================================================

#[test]
fn test_dangling_qualifier_without_from() {
    let ctx = context_at_marker("SELECT e.|");
    assert_eq!(ctx.context_type, ContextType::Column);
    assert_eq!(ctx.mode, ContextMode::Qualified);
    assert_eq!(ctx.table_ref.as_deref(), Some("e"));
}
