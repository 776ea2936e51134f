//! Cursor context detection
//!
//! Turns a cursor position in a buffer snapshot into a [`Context`]: what kind
//! of name the user is typing, how it is qualified and what is in scope.
//!
//! ## Strategies
//!
//! Detection runs a list of [`ContextStrategy`] implementations in order and
//! takes the first answer:
//!
//! 1. [`ParserStrategy`] reads the parsed chunk, its scope tree and clause
//!    spans.
//! 2. [`TextFallbackStrategy`] scans the text before the cursor with regexes.
//!    It runs only when the parser path declines and the fallback is enabled.
//!
//! A cursor inside a comment or string literal never reaches the strategies;
//! it yields a suppressed `Unknown` context.

mod cursor;
mod local_scan;
mod parser_strategy;
mod text_strategy;

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, trace};

use crate::cache::BufferSnapshot;
use crate::config::EngineConfig;
use crate::model::{Position, ScopeId, StatementKind, TableReference};
use crate::parser::normalize_key;
use crate::provider::MetadataProvider;

pub use cursor::CursorText;
pub use local_scan::{comparison_lhs, in_on_clause, insert_columns_open, values_position};
pub use parser_strategy::ParserStrategy;
pub use text_strategy::TextFallbackStrategy;

/// What kind of name belongs at the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContextType {
    Column,
    Table,
    Schema,
    Procedure,
    Parameter,
    Keyword,
    Database,
    Unknown,
}

/// How candidates should be filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextMode {
    Normal,
    /// Typing after `qualifier.`
    Qualified,
    /// Join predicate
    OnClause,
    /// Inside an INSERT ... VALUES tuple
    ValuesList,
    /// Inside the open column list of an INSERT
    InsertColumns,
    /// Right-hand side of a comparison
    Comparison,
    /// Inside a comment or string literal
    Suppressed,
    /// Produced by the text heuristics
    Fallback,
}

/// A classified completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Context {
    pub context_type: ContextType,
    pub mode: ContextMode,
    pub prefix: String,
    pub trigger: Option<char>,
    pub table_ref: Option<String>,
    pub schema: Option<String>,
    pub database: Option<String>,
    /// Clause key at the cursor (`where`, `join_2`, `from@2`)
    pub clause: Option<String>,
    pub values_position: Option<usize>,
    /// Insert column that the current VALUES slot feeds
    pub values_column: Option<String>,
    pub comparison_lhs: Option<String>,
    pub insert_target: Option<TableReference>,
    pub tables_in_scope: Vec<TableReference>,
    /// Lower-cased alias -> source
    pub aliases: BTreeMap<String, TableReference>,
    /// Lower-cased CTE name -> output columns
    pub ctes: BTreeMap<String, Vec<String>>,
    /// Lower-cased temp table name -> columns
    pub temp_tables: BTreeMap<String, Vec<String>>,
    pub parameters: Vec<String>,
    pub scope: Option<ScopeId>,
    pub chunk_index: Option<usize>,
    /// Batch the cursor is in
    pub batch: usize,
}

impl Context {
    /// An empty context of the given type.
    pub fn new(context_type: ContextType, mode: ContextMode) -> Self {
        Self {
            context_type,
            mode,
            prefix: String::new(),
            trigger: None,
            table_ref: None,
            schema: None,
            database: None,
            clause: None,
            values_position: None,
            values_column: None,
            comparison_lhs: None,
            insert_target: None,
            tables_in_scope: Vec::new(),
            aliases: BTreeMap::new(),
            ctes: BTreeMap::new(),
            temp_tables: BTreeMap::new(),
            parameters: Vec::new(),
            scope: None,
            chunk_index: None,
            batch: 0,
        }
    }

    pub fn unknown() -> Self {
        Self::new(ContextType::Unknown, ContextMode::Normal)
    }

    /// Context carrying the cursor text and the batch-level names every
    /// strategy reports: temp tables and variables.
    pub fn for_request(
        req: &ContextRequest<'_>,
        context_type: ContextType,
        mode: ContextMode,
    ) -> Self {
        let mut ctx = Self::new(context_type, mode);
        ctx.prefix = req.cursor.prefix.clone();
        ctx.trigger = req.cursor.trigger;
        ctx.batch = req.batch();
        ctx.temp_tables = req
            .snapshot
            .visible_temp_tables(req.position.line, ctx.batch)
            .into_iter()
            .map(|t| (normalize_key(&t.name), t.columns.clone()))
            .collect();
        ctx.parameters = batch_parameters(req.snapshot, ctx.batch, req.position);
        ctx
    }

    pub fn is_suppressed(&self) -> bool {
        self.mode == ContextMode::Suppressed
    }
}

/// Everything a strategy may look at.
pub struct ContextRequest<'a> {
    pub snapshot: &'a BufferSnapshot,
    pub position: Position,
    pub cursor: CursorText,
    pub lookahead_lines: usize,
    pub metadata: &'a dyn MetadataProvider,
}

impl<'a> ContextRequest<'a> {
    pub fn new(
        snapshot: &'a BufferSnapshot,
        position: Position,
        config: &EngineConfig,
        metadata: &'a dyn MetadataProvider,
    ) -> Self {
        let cursor = CursorText::analyze(snapshot.line_text(position.line), position.col);
        Self {
            snapshot,
            position,
            cursor,
            lookahead_lines: config.lookahead_lines,
            metadata,
        }
    }

    pub fn batch(&self) -> usize {
        self.snapshot.batch_index_at(self.position.line)
    }
}

/// One way of classifying the cursor. `None` means "no opinion".
pub trait ContextStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn detect(&self, req: &ContextRequest<'_>) -> Option<Context>;
}

/// Runs strategies in order.
pub struct ContextDetector {
    strategies: Vec<Box<dyn ContextStrategy>>,
}

impl ContextDetector {
    pub fn new(config: &EngineConfig) -> Self {
        let mut strategies: Vec<Box<dyn ContextStrategy>> = vec![Box::new(ParserStrategy)];
        if config.fallback_enabled {
            strategies.push(Box::new(TextFallbackStrategy));
        }
        Self { strategies }
    }

    pub fn with_strategies(strategies: Vec<Box<dyn ContextStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn detect(&self, req: &ContextRequest<'_>) -> Context {
        if req.snapshot.in_comment_or_string(req.position) {
            trace!(line = req.position.line, col = req.position.col, "cursor in comment or string");
            let mut ctx = Context::new(ContextType::Unknown, ContextMode::Suppressed);
            ctx.batch = req.batch();
            return ctx;
        }
        for strategy in &self.strategies {
            match strategy.detect(req) {
                Some(ctx) => {
                    trace!(
                        strategy = strategy.name(),
                        context_type = ?ctx.context_type,
                        mode = ?ctx.mode,
                        "context detected"
                    );
                    return ctx;
                }
                None => debug!(strategy = strategy.name(), "strategy declined"),
            }
        }
        Context::unknown()
    }
}

/// Variables visible in a batch before `pos`: DECLAREd names plus every
/// parameter referenced by statements that start before the cursor.
fn batch_parameters(snapshot: &BufferSnapshot, batch: usize, pos: Position) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut push = |name: &str| {
        if !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            names.push(name.to_string());
        }
    };
    for chunk in snapshot
        .chunks
        .iter()
        .filter(|c| c.go_batch_index == batch && c.start <= pos)
    {
        if let StatementKind::Declare { variables } = &chunk.kind {
            for variable in variables {
                push(&variable.name);
            }
        }
        for parameter in &chunk.parameters {
            push(parameter);
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StaticMetadata;

    fn detect(sql: &str, line: usize, col: usize) -> Context {
        let snapshot = BufferSnapshot::build(1, sql.to_string(), 16);
        let config = EngineConfig::default();
        let metadata = StaticMetadata::new().with_schema("dbo");
        let req = ContextRequest::new(&snapshot, Position::new(line, col), &config, &metadata);
        ContextDetector::new(&config).detect(&req)
    }

    #[test]
    fn test_comment_suppresses() {
        let ctx = detect("SELECT a -- FROM ", 1, 17);
        assert_eq!(ctx.context_type, ContextType::Unknown);
        assert!(ctx.is_suppressed());
    }

    #[test]
    fn test_string_suppresses() {
        let ctx = detect("SELECT * FROM t WHERE name = 'abc", 1, 33);
        assert!(ctx.is_suppressed());
    }

    #[test]
    fn test_batch_parameters_collected() {
        let sql = "DECLARE @limit INT = 5;\nSELECT * FROM t WHERE id > @";
        let ctx = detect(sql, 2, 29);
        assert_eq!(ctx.context_type, ContextType::Parameter);
        assert_eq!(ctx.parameters, vec!["@limit".to_string()]);
    }

    #[test]
    fn test_parameters_reset_per_batch() {
        let sql = "DECLARE @limit INT = 5\nGO\nSELECT * FROM t WHERE id > @";
        let ctx = detect(sql, 3, 29);
        assert_eq!(ctx.context_type, ContextType::Parameter);
        assert!(ctx.parameters.is_empty());
    }

    #[test]
    fn test_fallback_disabled_yields_unknown() {
        let snapshot = BufferSnapshot::build(1, "PRINT 'x' + ".to_string(), 16);
        let config = EngineConfig {
            fallback_enabled: false,
            ..EngineConfig::default()
        };
        let metadata = StaticMetadata::new();
        let req = ContextRequest::new(&snapshot, Position::new(1, 13), &config, &metadata);
        let ctx = ContextDetector::new(&config).detect(&req);
        assert_eq!(ctx.context_type, ContextType::Unknown);
        assert_eq!(ctx.mode, ContextMode::Normal);
    }
}
