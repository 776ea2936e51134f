//! FROM clauses: table sources, derived tables, JOIN chains and ON predicates.

use crate::model::{
    ColumnInfo, ScopeId, ScopeKind, ScopeNode, ScopeRef, StatementChunk, TableReference,
};
use crate::tokenizer::{KeywordCategory, TokenKind};

use super::clause_tracker::ClauseTracker;
use super::identifier_utils::parse_qualified_name;
use super::statement_parser::{StatementParser, Stop};

/// Words that can start a JOIN.
const JOIN_WORDS: &[&str] = &["JOIN", "INNER", "LEFT", "RIGHT", "FULL", "CROSS", "OUTER"];

/// Join modifiers and hints allowed between the first join word and JOIN/APPLY.
const JOIN_MODIFIERS: &[&str] = &["INNER", "LEFT", "RIGHT", "FULL", "CROSS", "OUTER"];

/// Keywords that end an ON predicate.
const ON_STOPS: &[&str] = &[
    "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "CROSS", "OUTER", "WHERE", "GROUP", "HAVING",
    "ORDER", "OPTION", "UNION", "INTERSECT", "EXCEPT", "FOR", "WHEN", "OUTPUT",
];

impl<'a> StatementParser<'a> {
    /// Parse table sources separated by commas and JOINs.
    ///
    /// Stops at the first token that does not continue the FROM clause
    /// (WHERE, GROUP BY, a set operator, `)` ...), leaving it for the caller.
    pub(super) fn parse_from(
        &mut self,
        chunk: &mut StatementChunk,
        at: ScopeRef,
        clauses: &mut ClauseTracker,
    ) {
        self.parse_table_source(chunk, at, clauses);
        while let Some(token) = self.base.current_token() {
            if token.kind == TokenKind::Comma {
                self.base.advance();
                self.parse_table_source(chunk, at, clauses);
                continue;
            }
            if !token.is_any_keyword(JOIN_WORDS) || self.is_function_call() {
                break;
            }

            let n = clauses.next_join();
            clauses.open(&format!("join_{n}"), token.start());
            while self.base.check_any_keyword(JOIN_MODIFIERS) || self.base.check_word_ci("HASH")
                || self.base.check_word_ci("LOOP")
            {
                self.base.advance();
            }
            if self.base.expect_keyword("JOIN").is_none()
                && self.base.expect_keyword("APPLY").is_none()
            {
                break;
            }
            self.parse_table_source(chunk, at, clauses);

            if self.base.check_keyword("ON") {
                clauses.open(&format!("on_{n}"), self.base.current_start());
                self.base.advance();
                self.walk_predicate(chunk, at, ON_STOPS);
            }
        }
    }

    /// Walk a search condition, treating `LEFT(...)` / `RIGHT(...)` as
    /// function calls rather than join starts.
    pub(super) fn walk_predicate(
        &mut self,
        chunk: &mut StatementChunk,
        at: ScopeRef,
        stop_words: &[&str],
    ) -> Stop {
        loop {
            let stop = self.walk(chunk, at, stop_words, false);
            if stop == Stop::Keyword && self.is_function_call() {
                self.base.advance();
                continue;
            }
            return stop;
        }
    }

    fn is_function_call(&self) -> bool {
        self.base.check_any_keyword(&["LEFT", "RIGHT"])
            && self.base.check_kind_at(1, TokenKind::ParenOpen)
    }

    /// One table source: a name, derived table, `(VALUES ...)`, table-valued
    /// function call or parenthesized join, with its hints and alias.
    pub(super) fn parse_table_source(
        &mut self,
        chunk: &mut StatementChunk,
        at: ScopeRef,
        clauses: &mut ClauseTracker,
    ) -> Option<TableReference> {
        let token = self.base.current_token()?;
        if token.kind == TokenKind::ParenOpen {
            if self.opens_subquery(self.base.pos()) {
                return Some(self.parse_derived_table(chunk, at));
            }
            if self.base.check_keyword_at(1, "VALUES") {
                return self.parse_values_table(chunk, at);
            }
            // (a JOIN b ON ...)
            self.base.advance();
            self.parse_from(chunk, at, clauses);
            self.base.expect_kind(TokenKind::ParenClose);
            return None;
        }

        let mut table = parse_qualified_name(&mut self.base)?;
        if table.name.is_empty() {
            return None;
        }
        if self.base.check_kind(TokenKind::ParenOpen) {
            // Table-valued function arguments or a legacy `(NOLOCK)` hint.
            self.base.skip_parenthesized();
        }
        table.is_cte = self.is_known_cte(&table);
        self.skip_table_hints();
        table.alias = self.parse_alias();
        self.skip_table_hints();
        self.register_table(chunk, at, table.clone());
        self.parse_pivot(chunk, at);
        Some(table)
    }

    fn parse_derived_table(&mut self, chunk: &mut StatementChunk, at: ScopeRef) -> TableReference {
        let id = self.parse_subquery(
            chunk,
            at,
            ScopeKind::Derived {
                alias: None,
                column_aliases: Vec::new(),
            },
        );
        let alias = self.parse_alias();
        let column_aliases = if self.base.check_kind(TokenKind::ParenOpen) {
            self.base.parse_name_list()
        } else {
            Vec::new()
        };
        if let Some(node) = chunk.scope_mut(id) {
            node.kind = ScopeKind::Derived {
                alias: alias.clone(),
                column_aliases,
            };
        }
        let table = TableReference {
            name: alias.clone().unwrap_or_default(),
            alias,
            derived_scope: Some(id),
            ..Default::default()
        };
        self.register_table(chunk, at, table.clone());
        table
    }

    /// `(VALUES (...), (...)) AS v (a, b)` becomes a closed derived scope whose
    /// columns are the listed names.
    fn parse_values_table(
        &mut self,
        chunk: &mut StatementChunk,
        at: ScopeRef,
    ) -> Option<TableReference> {
        let start = self.base.current_token().map(|t| t.end())?;
        self.base.skip_parenthesized();
        let end = self.base.previous().map_or(start, |t| t.start());
        let alias = self.parse_alias();
        let column_aliases = if self.base.check_kind(TokenKind::ParenOpen) {
            self.base.parse_name_list()
        } else {
            Vec::new()
        };

        let id = ScopeId(chunk.scopes.len());
        let parent = match at {
            ScopeRef::Node(p) => Some(p),
            ScopeRef::Statement => None,
        };
        let mut node = ScopeNode::new(
            id,
            ScopeKind::Derived {
                alias: alias.clone(),
                column_aliases: column_aliases.clone(),
            },
            parent,
            start,
        );
        node.end = end.max(start);
        node.closed = true;
        node.columns = column_aliases.into_iter().map(ColumnInfo::named).collect();
        chunk.scopes.push(node);
        match parent {
            Some(p) => {
                if let Some(owner) = chunk.scope_mut(p) {
                    owner.children.push(id);
                }
            }
            None => chunk.subqueries.push(id),
        }

        let table = TableReference {
            name: alias.clone().unwrap_or_default(),
            alias,
            derived_scope: Some(id),
            ..Default::default()
        };
        self.register_table(chunk, at, table.clone());
        Some(table)
    }

    /// `PIVOT (...) AS p` / `UNPIVOT (...) AS u` after a source.
    fn parse_pivot(&mut self, chunk: &mut StatementChunk, at: ScopeRef) {
        if !self.base.check_any_keyword(&["PIVOT", "UNPIVOT"]) {
            return;
        }
        self.base.advance();
        self.base.skip_parenthesized();
        if let Some(alias) = self.parse_alias() {
            let table = TableReference {
                alias: Some(alias.clone()),
                ..TableReference::named(alias)
            };
            self.register_table(chunk, at, table);
        }
    }

    /// `[AS] alias`. Keywords are never taken as implicit aliases.
    pub(super) fn parse_alias(&mut self) -> Option<String> {
        if self.base.check_keyword("AS") {
            let next = self.base.peek(1)?;
            if next.is_name() || next.kind == TokenKind::String {
                self.base.advance_by(2);
                return Some(next.text.clone());
            }
            return None;
        }
        let token = self.base.current_token().filter(|t| t.is_alias_candidate())?;
        self.base.advance();
        Some(token.text.clone())
    }

    /// `WITH (NOLOCK, INDEX(ix))` or a bare `(NOLOCK)` after a table name.
    pub(super) fn skip_table_hints(&mut self) {
        if self.base.check_keyword("WITH") && self.base.check_kind_at(1, TokenKind::ParenOpen) {
            self.base.advance();
            self.base.skip_parenthesized();
        } else if self.base.check_kind(TokenKind::ParenOpen)
            && self
                .base
                .peek(1)
                .is_some_and(|t| t.keyword_category == Some(KeywordCategory::Modifier))
        {
            self.base.skip_parenthesized();
        }
    }

    /// Add a source to the tables and alias map of `at`.
    pub(super) fn register_table(
        &mut self,
        chunk: &mut StatementChunk,
        at: ScopeRef,
        table: TableReference,
    ) {
        let key = table.scope_key();
        if !key.is_empty() {
            if let Some(aliases) = chunk.aliases_of_mut(at) {
                aliases.insert(key, table.clone());
            }
        }
        if let Some(tables) = chunk.tables_of_mut(at) {
            tables.push(table);
        }
    }
}
