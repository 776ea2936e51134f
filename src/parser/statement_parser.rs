//! Top-level statement loop and the helpers shared by every handler.
//!
//! The parser walks the whole token stream once. Each statement starter
//! produces one [`StatementChunk`]; everything else is skipped. Handlers
//! consume what they recognize and stop at the first token they do not, after
//! which the remainder of the statement is skipped up to the next boundary
//! (`;`, `GO`, a statement starter or a control-flow keyword).

use std::collections::HashSet;

use crate::model::{
    ScopeId, ScopeKind, ScopeNode, ScopeRef, StatementChunk, StatementKind, TempTableInfo,
    TempTables, TableReference,
};
use crate::scope::resolve_chunk_with_depth;
use crate::tokenizer::{Token, TokenKind, CONTROL_KEYWORDS, STATEMENT_STARTERS};

use super::clause_tracker::ClauseTracker;
use super::identifier_utils::{is_glued, normalize_key};
use super::token_parser_base::TokenParser;

/// Parenthesized queries nested deeper than this are skipped as plain groups.
const MAX_PARSE_NESTING: usize = 64;

/// Why an expression walk returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Stop {
    /// One of the caller's stop words, at paren depth 0
    Keyword,
    /// A comma at depth 0 (only when requested)
    Comma,
    /// A `)` closing an enclosing group
    CloseParen,
    /// `;`, `GO` or the start of the next statement
    Boundary,
    End,
}

/// A pending `SELECT ... INTO #t` waiting for the select list to be resolved.
struct PendingInto {
    name: String,
    line: usize,
}

/// Recursive-descent parser over one buffer's token stream.
pub struct StatementParser<'a> {
    pub(super) base: TokenParser<'a>,
    pub(super) batch: usize,
    /// Lower-cased CTE names declared so far in the current batch
    pub(super) known_ctes: HashSet<String>,
    pub(super) temp_tables: TempTables,
    pub(super) nesting: usize,
    max_scope_depth: usize,
    pending_into: Option<PendingInto>,
}

impl<'a> StatementParser<'a> {
    pub fn new(tokens: &'a [Token], max_scope_depth: usize) -> Self {
        Self {
            base: TokenParser::new(tokens),
            batch: 0,
            known_ctes: HashSet::new(),
            temp_tables: TempTables::new(),
            nesting: 0,
            max_scope_depth,
            pending_into: None,
        }
    }

    /// Parse every statement in the stream.
    pub fn parse_all(mut self) -> (Vec<StatementChunk>, TempTables) {
        let mut chunks = Vec::new();
        while let Some(token) = self.base.current_token() {
            match token.kind {
                TokenKind::BatchSeparator => {
                    self.batch += 1;
                    self.known_ctes.clear();
                    self.base.advance();
                }
                TokenKind::Keyword
                    if token.is_any_keyword(STATEMENT_STARTERS)
                        && self.is_statement_boundary(self.base.pos()) =>
                {
                    chunks.push(self.parse_statement());
                }
                _ => self.base.advance(),
            }
        }
        (chunks, self.temp_tables)
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn parse_statement(&mut self) -> StatementChunk {
        let start_idx = self.base.pos();
        let mut chunk = StatementChunk::new(
            StatementKind::Other,
            self.batch,
            self.base.current_start(),
        );
        let mut clauses = ClauseTracker::new();

        chunk.kind = self.dispatch(&mut chunk, &mut clauses);
        if self.base.pos() == start_idx {
            self.base.advance();
        }
        self.skip_to_statement_end();

        let end_idx = self.base.pos();
        chunk.end = self.base.previous_end();
        if self.base.check_kind(TokenKind::Semicolon) {
            chunk.terminated = true;
            self.base.advance();
        }
        chunk.clause_positions = clauses.finish(chunk.end);
        self.collect_parameters(&mut chunk, start_idx, end_idx);

        resolve_chunk_with_depth(&mut chunk, self.max_scope_depth);
        if let Some(pending) = self.pending_into.take() {
            self.create_temp_from_select(&chunk, pending);
        }
        chunk
    }

    /// Dispatch on the statement keyword at the current position.
    pub(super) fn dispatch(
        &mut self,
        chunk: &mut StatementChunk,
        clauses: &mut ClauseTracker,
    ) -> StatementKind {
        let Some(token) = self.base.current_token() else {
            return StatementKind::Other;
        };
        match token.text.to_ascii_uppercase().as_str() {
            "SELECT" => {
                self.parse_query(chunk, ScopeRef::Statement, clauses);
                StatementKind::Select
            }
            "WITH" => self.parse_with(chunk, clauses),
            "INSERT" => self.parse_insert(chunk, clauses),
            "UPDATE" => self.parse_update(chunk, clauses),
            "DELETE" => self.parse_delete(chunk, clauses),
            "MERGE" => self.parse_merge(chunk, clauses),
            "CREATE" | "ALTER" => self.parse_create_or_alter(chunk, clauses),
            "DROP" => self.parse_drop(),
            "TRUNCATE" => self.parse_truncate(clauses),
            "EXEC" | "EXECUTE" => self.parse_exec(chunk, clauses),
            "DECLARE" => self.parse_declare(chunk, clauses),
            "SET" => self.parse_set(chunk),
            "USE" => self.parse_use(clauses),
            _ => StatementKind::Other,
        }
    }

    /// Skip whatever is left of the current statement.
    ///
    /// Stops at `;` (not consumed), `GO`, or a depth-0 boundary keyword.
    pub(super) fn skip_to_statement_end(&mut self) {
        let mut depth = 0usize;
        let mut case_depth = 0usize;
        while let Some(token) = self.base.current_token() {
            match token.kind {
                TokenKind::Semicolon | TokenKind::BatchSeparator => return,
                TokenKind::ParenOpen => depth += 1,
                TokenKind::ParenClose => depth = depth.saturating_sub(1),
                TokenKind::Keyword => {
                    if token.is_keyword("CASE") {
                        case_depth += 1;
                    } else if token.is_keyword("END") && case_depth > 0 {
                        case_depth -= 1;
                    } else if case_depth == 0 && self.is_statement_boundary(self.base.pos()) {
                        return;
                    }
                }
                _ => {}
            }
            self.base.advance();
        }
    }

    /// Whether the keyword at `idx` ends the current statement.
    ///
    /// Contextual uses of starter keywords are not boundaries: table hints
    /// (`WITH (NOLOCK)`), `ON DELETE CASCADE`, `ON UPDATE SET NULL`, MERGE
    /// actions after `THEN`, and `ALTER COLUMN` / `DROP CONSTRAINT` inside
    /// ALTER TABLE.
    pub(super) fn is_statement_boundary(&self, idx: usize) -> bool {
        let tokens = self.base.tokens();
        let Some(token) = tokens.get(idx) else {
            return false;
        };
        if token.kind != TokenKind::Keyword {
            return false;
        }
        if token.is_any_keyword(CONTROL_KEYWORDS) {
            return true;
        }
        if !token.is_any_keyword(STATEMENT_STARTERS) {
            return false;
        }
        let previous = idx.checked_sub(1).and_then(|i| tokens.get(i));
        let next = tokens.get(idx + 1);
        let upper = token.text.to_ascii_uppercase();
        match upper.as_str() {
            "WITH" => self.starts_cte(idx),
            "DELETE" | "UPDATE" => !previous.is_some_and(|p| p.is_any_keyword(&["ON", "THEN"])),
            "INSERT" => !previous.is_some_and(|p| p.is_keyword("THEN")),
            "SET" => !previous.is_some_and(|p| p.is_any_keyword(&["DELETE", "UPDATE"])),
            "ALTER" | "DROP" => !next.is_some_and(|n| n.is_word("COLUMN") || n.is_word("CONSTRAINT")),
            _ => true,
        }
    }

    /// `WITH name [(cols)] AS` or `WITH XMLNAMESPACES`, as opposed to a hint or
    /// option list.
    fn starts_cte(&self, idx: usize) -> bool {
        let tokens = self.base.tokens();
        let Some(name) = tokens.get(idx + 1) else {
            // A trailing WITH is most likely the start of a CTE being typed.
            return true;
        };
        if name.is_word("XMLNAMESPACES") {
            return true;
        }
        if !name.is_name() {
            return false;
        }
        match tokens.get(idx + 2) {
            None => true,
            Some(next) => next.is_keyword("AS") || next.kind == TokenKind::ParenOpen,
        }
    }

    // ========================================================================
    // Expressions and nested queries
    // ========================================================================

    /// Walk an expression region, parsing nested `(SELECT ...)` as child scopes
    /// of `at`.
    ///
    /// Returns at a depth-0 stop word, a depth-0 comma when `stop_on_comma`,
    /// an unmatched `)`, or a statement boundary; the stopping token is not
    /// consumed. `CASE ... END` is tracked so that `WHEN`/`ELSE`/`END` inside
    /// it never stop the walk.
    pub(super) fn walk(
        &mut self,
        chunk: &mut StatementChunk,
        at: ScopeRef,
        stop_words: &[&str],
        stop_on_comma: bool,
    ) -> Stop {
        let mut depth = 0usize;
        let mut case_depth = 0usize;
        while let Some(token) = self.base.current_token() {
            let idx = self.base.pos();
            match token.kind {
                TokenKind::ParenOpen => {
                    if self.opens_subquery(idx) {
                        self.parse_subquery(chunk, at, ScopeKind::Subquery);
                        continue;
                    }
                    depth += 1;
                }
                TokenKind::ParenClose => {
                    if depth == 0 {
                        return Stop::CloseParen;
                    }
                    depth -= 1;
                }
                TokenKind::Semicolon | TokenKind::BatchSeparator => return Stop::Boundary,
                TokenKind::Comma if depth == 0 && stop_on_comma => return Stop::Comma,
                TokenKind::Keyword => {
                    if token.is_keyword("CASE") {
                        case_depth += 1;
                    } else if token.is_keyword("END") && case_depth > 0 {
                        case_depth -= 1;
                    } else if case_depth == 0 {
                        if depth == 0 && token.is_any_keyword(stop_words) {
                            return Stop::Keyword;
                        }
                        if self.is_statement_boundary(idx) {
                            return Stop::Boundary;
                        }
                    }
                }
                _ => {}
            }
            self.base.advance();
        }
        Stop::End
    }

    /// `(` at `idx` followed by SELECT (or a nested `WITH`).
    pub(super) fn opens_subquery(&self, idx: usize) -> bool {
        if self.nesting >= MAX_PARSE_NESTING {
            return false;
        }
        let tokens = self.base.tokens();
        tokens.get(idx).is_some_and(|t| t.kind == TokenKind::ParenOpen)
            && tokens
                .get(idx + 1)
                .is_some_and(|t| t.is_keyword("SELECT") || t.is_keyword("WITH"))
    }

    /// Parse a parenthesized query at the current `(` into a new scope node.
    ///
    /// CTE nodes are detached (no parent); every other node is linked under
    /// `parent`. Returns with the position past the closing parenthesis, or at
    /// the boundary that cut an unclosed query short.
    pub(super) fn parse_subquery(
        &mut self,
        chunk: &mut StatementChunk,
        parent: ScopeRef,
        kind: ScopeKind,
    ) -> ScopeId {
        let id = ScopeId(chunk.scopes.len());
        let is_cte = matches!(kind, ScopeKind::Cte { .. });
        let parent_id = match (is_cte, parent) {
            (false, ScopeRef::Node(p)) => Some(p),
            _ => None,
        };
        let start = match self.base.current_token() {
            Some(open) => open.end(),
            None => self.base.last_end(),
        };
        chunk.scopes.push(ScopeNode::new(id, kind, parent_id, start));
        match (is_cte, parent_id) {
            (true, _) => chunk.ctes.push(id),
            (false, Some(p)) => {
                if let Some(node) = chunk.scope_mut(p) {
                    node.children.push(id);
                }
            }
            (false, None) => chunk.subqueries.push(id),
        }

        self.base.advance();
        self.nesting += 1;
        let mut clauses = ClauseTracker::new();
        let here = ScopeRef::Node(id);
        if self.base.check_keyword("WITH") {
            // A nested WITH is not valid T-SQL; keep going with its query.
            self.parse_with(chunk, &mut clauses);
        } else {
            self.parse_query(chunk, here, &mut clauses);
        }
        self.nesting -= 1;

        let (end, closed) = self.close_scope();
        if let Some(node) = chunk.scope_mut(id) {
            node.end = end.max(node.start);
            node.closed = closed;
            node.clause_positions = clauses.finish(node.end);
        }
        id
    }

    /// Consume up to and including the `)` that closes the current scope.
    fn close_scope(&mut self) -> (crate::model::Position, bool) {
        loop {
            let Some(token) = self.base.current_token() else {
                return (self.base.previous_end(), false);
            };
            match token.kind {
                TokenKind::ParenClose => {
                    self.base.advance();
                    return (token.start(), true);
                }
                TokenKind::Semicolon | TokenKind::BatchSeparator => {
                    return (self.base.previous_end(), false);
                }
                TokenKind::ParenOpen => self.base.skip_parenthesized(),
                TokenKind::Keyword if self.is_statement_boundary(self.base.pos()) => {
                    return (self.base.previous_end(), false);
                }
                _ => self.base.advance(),
            }
        }
    }

    // ========================================================================
    // Post-processing
    // ========================================================================

    /// Collect `@name` references (not `@@name`) for the chunk and each scope.
    fn collect_parameters(&self, chunk: &mut StatementChunk, start: usize, end: usize) {
        let tokens = self.base.tokens();
        let range = tokens.get(start..end).unwrap_or(&[]);
        let found = parameter_refs(range);
        for node in chunk.scopes.iter_mut() {
            node.parameters = found
                .iter()
                .filter(|(pos, _)| node.reaches(*pos, node.end))
                .map(|(_, name)| name.clone())
                .fold(Vec::new(), dedup_push);
        }
        chunk.parameters = found
            .into_iter()
            .map(|(_, name)| name)
            .fold(Vec::new(), dedup_push);
    }

    pub(super) fn note_select_into(&mut self, target: &TableReference, line: usize) {
        if target.is_temp {
            self.pending_into = Some(PendingInto {
                name: target.name.clone(),
                line,
            });
        }
    }

    fn create_temp_from_select(&mut self, chunk: &StatementChunk, pending: PendingInto) {
        let columns = chunk
            .columns
            .iter()
            .map(|c| {
                if c.is_star {
                    "*".to_string()
                } else {
                    c.output_name().to_string()
                }
            })
            .fold(Vec::new(), dedup_push);
        self.temp_tables.create(TempTableInfo {
            is_global: pending.name.starts_with("##"),
            name: pending.name,
            columns,
            created_in_batch: self.batch,
            created_at_line: pending.line,
            dropped_at_line: None,
        });
    }

    /// Whether a bare name refers to a CTE declared earlier in this batch.
    pub(super) fn is_known_cte(&self, table: &TableReference) -> bool {
        table.schema.is_none()
            && table.database.is_none()
            && self.known_ctes.contains(&normalize_key(&table.name))
    }
}

/// `@name` references with their positions, skipping `@@system` names.
fn parameter_refs(tokens: &[Token]) -> Vec<(crate::model::Position, String)> {
    let mut found = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        if token.kind != TokenKind::AtSign {
            continue;
        }
        let after_at = i
            .checked_sub(1)
            .and_then(|p| tokens.get(p))
            .is_some_and(|p| p.kind == TokenKind::AtSign && is_glued(p, Some(token)));
        if after_at {
            continue;
        }
        let Some(name) = tokens.get(i + 1) else {
            continue;
        };
        let is_word = matches!(
            name.kind,
            TokenKind::Identifier | TokenKind::Keyword | TokenKind::BracketedIdentifier
        );
        if is_word && is_glued(token, Some(name)) {
            found.push((token.start(), format!("@{}", name.text)));
        }
    }
    found
}

fn dedup_push(mut acc: Vec<String>, name: String) -> Vec<String> {
    if !acc.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
        acc.push(name);
    }
    acc
}
