//! SELECT queries: WITH blocks, set-operation chains, select lists and the
//! clauses that trail FROM.

use crate::model::{ColumnInfo, ScopeKind, ScopeRef, StatementChunk, StatementKind};
use crate::tokenizer::{Token, TokenKind};

use super::clause_tracker::ClauseTracker;
use super::identifier_utils::{normalize_key, parse_qualified_name};
use super::statement_parser::{StatementParser, Stop};
use super::token_parser_base::join_tokens;

/// Keywords that end a select list item.
const SELECT_LIST_STOPS: &[&str] = &[
    "FROM", "INTO", "WHERE", "GROUP", "HAVING", "ORDER", "UNION", "INTERSECT", "EXCEPT",
    "OPTION", "FOR",
];

/// Keywords that end a WHERE / GROUP BY / HAVING / ORDER BY clause.
const TRAILING_STOPS: &[&str] = &[
    "WHERE", "GROUP", "HAVING", "ORDER", "UNION", "INTERSECT", "EXCEPT", "OPTION", "FOR",
];

const SET_OPERATORS: &[&str] = &["UNION", "INTERSECT", "EXCEPT"];

impl<'a> StatementParser<'a> {
    // ========================================================================
    // WITH
    // ========================================================================

    /// `WITH name [(cols)] AS (query) [, ...] <statement>`
    ///
    /// Each name is registered before its body is parsed so recursive CTEs and
    /// later CTEs can refer to it. Returns the kind of the statement that
    /// follows the CTE list.
    pub(super) fn parse_with(
        &mut self,
        chunk: &mut StatementChunk,
        clauses: &mut ClauseTracker,
    ) -> StatementKind {
        self.base.advance();
        if self.base.check_word_ci("XMLNAMESPACES") {
            self.base.advance();
            self.base.skip_parenthesized();
            if self.base.expect_kind(TokenKind::Comma).is_none() {
                return self.dispatch_after_with(chunk, clauses);
            }
        }

        while let Some(name) = self.base.parse_identifier() {
            let explicit_columns = if self.base.check_kind(TokenKind::ParenOpen) {
                self.base.parse_name_list()
            } else {
                Vec::new()
            };
            if self.base.expect_keyword("AS").is_none() {
                break;
            }
            self.known_ctes.insert(normalize_key(&name));
            if !self.base.check_kind(TokenKind::ParenOpen) {
                break;
            }
            self.parse_subquery(
                chunk,
                ScopeRef::Statement,
                ScopeKind::Cte {
                    name,
                    explicit_columns,
                },
            );
            if self.base.expect_kind(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.dispatch_after_with(chunk, clauses)
    }

    fn dispatch_after_with(
        &mut self,
        chunk: &mut StatementChunk,
        clauses: &mut ClauseTracker,
    ) -> StatementKind {
        if self.base.check_keyword("WITH") {
            return StatementKind::Select;
        }
        match self.dispatch(chunk, clauses) {
            StatementKind::Other => StatementKind::Select,
            kind => kind,
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// A query expression: one or more SELECT members joined by
    /// UNION / INTERSECT / EXCEPT.
    pub(super) fn parse_query(
        &mut self,
        chunk: &mut StatementChunk,
        at: ScopeRef,
        clauses: &mut ClauseTracker,
    ) {
        loop {
            if self.base.check_keyword("SELECT") {
                self.parse_select_core(chunk, at, clauses);
            } else if self.opens_subquery(self.base.pos()) {
                // (SELECT ...) UNION (SELECT ...)
                self.parse_subquery(chunk, at, ScopeKind::Subquery);
            } else {
                break;
            }
            if !self.base.check_any_keyword(SET_OPERATORS) {
                break;
            }
            self.base.advance();
            if self.base.check_keyword("ALL") {
                self.base.advance();
            }
            clauses.next_member();
        }
    }

    fn parse_select_core(
        &mut self,
        chunk: &mut StatementChunk,
        at: ScopeRef,
        clauses: &mut ClauseTracker,
    ) {
        clauses.open("select", self.base.current_start());
        self.base.advance();
        if self.base.check_any_keyword(&["DISTINCT", "ALL"]) {
            self.base.advance();
        }
        self.skip_top();

        let columns = self.parse_select_list(chunk, at);
        if clauses.member() == 1 {
            if let Some(target) = chunk.columns_of_mut(at) {
                target.extend(columns);
            }
        }

        if self.base.check_keyword("INTO") {
            let line = self.base.current_token().map_or(1, |t| t.line);
            clauses.open("into", self.base.current_start());
            self.base.advance();
            if let Some(target) = parse_qualified_name(&mut self.base) {
                if at == ScopeRef::Statement && clauses.member() == 1 && target.is_temp {
                    chunk.temp_table_target = Some(target.name.clone());
                    self.note_select_into(&target, line);
                }
            }
        }

        if self.base.check_keyword("FROM") {
            clauses.open("from", self.base.current_start());
            self.base.advance();
            self.parse_from(chunk, at, clauses);
        }
        self.parse_trailing_clauses(chunk, at, clauses);
    }

    /// `TOP n`, `TOP (expr) [PERCENT] [WITH TIES]`
    pub(super) fn skip_top(&mut self) {
        if !self.base.check_keyword("TOP") {
            return;
        }
        self.base.advance();
        if self.base.check_kind(TokenKind::ParenOpen) {
            self.base.skip_parenthesized();
        } else if self.base.check_kind(TokenKind::AtSign) {
            self.base.advance_by(2);
        } else if self.base.check_kind(TokenKind::Number) {
            self.base.advance();
        }
        if self.base.check_keyword("PERCENT") {
            self.base.advance();
        }
        if self.base.check_keyword("WITH") && self.base.peek(1).is_some_and(|t| t.is_word("TIES")) {
            self.base.advance_by(2);
        }
    }

    fn parse_select_list(&mut self, chunk: &mut StatementChunk, at: ScopeRef) -> Vec<ColumnInfo> {
        let mut columns = Vec::new();
        loop {
            let start = self.base.pos();
            let stop = self.walk(chunk, at, SELECT_LIST_STOPS, true);
            let item = self.base.tokens().get(start..self.base.pos()).unwrap_or(&[]);
            if let Some(column) = column_from_tokens(item) {
                columns.push(column);
            }
            if stop != Stop::Comma {
                break;
            }
            self.base.advance();
        }
        columns
    }

    /// WHERE, GROUP BY, HAVING, ORDER BY and OPTION, in any order.
    pub(super) fn parse_trailing_clauses(
        &mut self,
        chunk: &mut StatementChunk,
        at: ScopeRef,
        clauses: &mut ClauseTracker,
    ) {
        while let Some(token) = self.base.current_token() {
            let by_follows = self.base.check_keyword_at(1, "BY");
            let key = match token.text.to_ascii_uppercase().as_str() {
                "WHERE" if token.kind == TokenKind::Keyword => "where",
                "HAVING" if token.kind == TokenKind::Keyword => "having",
                "GROUP" if by_follows => "group_by",
                "ORDER" if by_follows => "order_by",
                "OPTION" if token.kind == TokenKind::Keyword => "option",
                _ => break,
            };
            clauses.open(key, token.start());
            self.base.advance_by(if by_follows { 2 } else { 1 });
            if key == "option" {
                self.base.skip_parenthesized();
                continue;
            }
            if self.walk(chunk, at, TRAILING_STOPS, false) != Stop::Keyword {
                break;
            }
        }
    }
}

/// Build a column from the tokens of one select list item.
///
/// Handles `expr AS alias`, `expr alias`, `alias = expr`, `*`, `q.*` and
/// dotted column names. Returns `None` for empty items, variable assignments
/// (`@v = expr`) and names still being typed (`e.`).
pub(super) fn column_from_tokens(tokens: &[Token]) -> Option<ColumnInfo> {
    let first = tokens.first()?;
    // @v = expr, @v += expr
    if first.kind == TokenKind::AtSign && tokens.iter().skip(2).take(2).any(|t| t.is_operator("=")) {
        return None;
    }

    // alias = expr
    if tokens.len() > 2 && first.is_name() && tokens[1].is_operator("=") {
        let mut column = expression_column(&tokens[2..])?;
        column.alias = Some(first.text.clone());
        return Some(column);
    }

    let (expr, alias) = split_alias(tokens);
    let mut column = expression_column(expr)?;
    column.alias = alias;
    Some(column)
}

/// Split a trailing `AS alias` or implicit alias off an item.
fn split_alias(tokens: &[Token]) -> (&[Token], Option<String>) {
    let n = tokens.len();
    if n >= 3 && tokens[n - 2].is_keyword("AS") {
        let last = &tokens[n - 1];
        if last.is_name() || last.kind == TokenKind::String {
            return (&tokens[..n - 2], Some(last.text.clone()));
        }
    }
    if n >= 2 && tokens[n - 1].is_alias_candidate() {
        let previous = &tokens[n - 2];
        let ends_expression = matches!(
            previous.kind,
            TokenKind::Identifier
                | TokenKind::BracketedIdentifier
                | TokenKind::Number
                | TokenKind::String
                | TokenKind::ParenClose
        ) || previous.is_keyword("END")
            || previous.is_keyword("NULL");
        if ends_expression {
            return (&tokens[..n - 1], Some(tokens[n - 1].text.clone()));
        }
    }
    (tokens, None)
}

fn expression_column(tokens: &[Token]) -> Option<ColumnInfo> {
    if tokens.is_empty() {
        return None;
    }
    if tokens.len() == 1 && tokens[0].kind == TokenKind::Star {
        return Some(ColumnInfo::star(None));
    }

    // name(.name)* optionally ending in .*
    let mut parts: Vec<&Token> = Vec::new();
    let mut expect_name = true;
    let mut star = false;
    let mut dangling_dot = false;
    let mut is_chain = true;
    for token in tokens {
        match (expect_name, token.kind) {
            (true, TokenKind::Star) if !parts.is_empty() => {
                star = true;
                expect_name = false;
                dangling_dot = false;
            }
            (true, _) if token.is_name() && !star => {
                parts.push(token);
                expect_name = false;
                dangling_dot = false;
            }
            (false, TokenKind::Dot) if !star => {
                expect_name = true;
                dangling_dot = true;
            }
            _ => {
                is_chain = false;
                break;
            }
        }
    }

    if is_chain {
        if dangling_dot {
            return None;
        }
        let qualifier = parts
            .len()
            .checked_sub(if star { 1 } else { 2 })
            .and_then(|i| parts.get(i))
            .map(|t| t.text.clone());
        if star {
            return Some(ColumnInfo::star(qualifier));
        }
        let name = parts.last()?;
        return Some(ColumnInfo {
            source_table: qualifier,
            ..ColumnInfo::named(name.text.clone())
        });
    }

    Some(ColumnInfo {
        is_expression: true,
        ..ColumnInfo::named(join_tokens(tokens))
    })
}
