//! CREATE / ALTER / DROP / TRUNCATE and the procedural statements
//! (EXEC, DECLARE, SET, USE).

use crate::model::{
    DeclaredVariable, ScopeKind, ScopeRef, StatementChunk, StatementKind, TableReference,
    TempTableInfo,
};
use crate::tokenizer::{TokenKind, STATEMENT_STARTERS};

use super::clause_tracker::ClauseTracker;
use super::identifier_utils::{parse_qualified_name, parse_variable, table_reference};
use super::statement_parser::StatementParser;

/// Leading words of table-level constraint and index lines in a column list.
const CONSTRAINT_ITEMS: &[&str] = &[
    "CONSTRAINT", "PRIMARY", "UNIQUE", "FOREIGN", "CHECK", "INDEX", "PERIOD",
];

/// Words allowed between CREATE and the object type (`CREATE UNIQUE CLUSTERED INDEX`).
const CREATE_MODIFIERS: &[&str] = &["UNIQUE", "CLUSTERED", "NONCLUSTERED"];

impl<'a> StatementParser<'a> {
    // ========================================================================
    // CREATE / ALTER
    // ========================================================================

    pub(super) fn parse_create_or_alter(
        &mut self,
        chunk: &mut StatementChunk,
        clauses: &mut ClauseTracker,
    ) -> StatementKind {
        let is_create = self.base.check_keyword("CREATE");
        let line = self.base.current_token().map_or(1, |t| t.line);
        self.base.advance();
        if self.base.check_keyword("OR") && self.base.check_keyword_at(1, "ALTER") {
            self.base.advance_by(2);
        }
        while self.base.check_any_keyword(CREATE_MODIFIERS)
            || self.base.check_word_ci("COLUMNSTORE")
        {
            self.base.advance();
        }

        let object_type = match self.base.current_token() {
            Some(token) if token.is_word("PROC") => "PROCEDURE".to_string(),
            Some(token) => token.text.to_ascii_uppercase(),
            None => String::new(),
        };
        self.base.advance();
        let name = parse_qualified_name(&mut self.base).filter(|t| !t.name.is_empty());

        match object_type.as_str() {
            "TABLE" if is_create => self.parse_table_columns(name.as_ref(), line),
            "VIEW" => self.parse_view_body(chunk, clauses),
            "PROCEDURE" | "FUNCTION" | "TRIGGER" => {
                self.skip_routine_header(chunk, &object_type);
                self.parse_routine_body(chunk, clauses);
            }
            "INDEX" => {
                if self.base.expect_keyword("ON").is_some() {
                    if let Some(table) = parse_qualified_name(&mut self.base) {
                        self.register_table(chunk, ScopeRef::Statement, table);
                    }
                }
            }
            _ => {}
        }

        if is_create {
            StatementKind::Create { object_type, name }
        } else {
            StatementKind::Alter { object_type, name }
        }
    }

    /// Column list of `CREATE TABLE name (...)`; temp tables are recorded.
    fn parse_table_columns(&mut self, name: Option<&TableReference>, line: usize) {
        if !self.base.check_kind(TokenKind::ParenOpen) {
            return;
        }
        let columns = self.column_definitions();
        if let Some(table) = name.filter(|t| t.is_temp) {
            self.temp_tables.create(TempTableInfo {
                name: table.name.clone(),
                columns,
                is_global: table.is_global_temp,
                created_in_batch: self.batch,
                created_at_line: line,
                dropped_at_line: None,
            });
        }
    }

    /// Names of the column definitions in a parenthesized list, skipping
    /// constraint and index lines.
    fn column_definitions(&mut self) -> Vec<String> {
        self.base
            .parse_name_list()
            .into_iter()
            .filter(|name| !CONSTRAINT_ITEMS.iter().any(|c| name.eq_ignore_ascii_case(c)))
            .collect()
    }

    /// `[(cols)] [WITH SCHEMABINDING] AS <query>`
    fn parse_view_body(&mut self, chunk: &mut StatementChunk, clauses: &mut ClauseTracker) {
        while let Some(token) = self.base.current_token() {
            if token.is_keyword("AS") {
                self.base.advance();
                break;
            }
            if matches!(token.kind, TokenKind::Semicolon | TokenKind::BatchSeparator) {
                return;
            }
            if token.kind == TokenKind::ParenOpen {
                self.base.skip_parenthesized();
            } else {
                self.base.advance();
            }
        }
        if self.base.check_keyword("WITH") {
            self.parse_with(chunk, clauses);
        } else {
            self.parse_query(chunk, ScopeRef::Statement, clauses);
        }
    }

    /// Skip parameters, RETURNS and options up to the `AS` that opens the body.
    ///
    /// `EXECUTE AS` and `@param AS type` are part of the header. A trigger's
    /// `ON table` is registered as a source.
    fn skip_routine_header(&mut self, chunk: &mut StatementChunk, object_type: &str) {
        let mut depth = 0usize;
        while let Some(token) = self.base.current_token() {
            match token.kind {
                TokenKind::BatchSeparator => return,
                TokenKind::ParenOpen => depth += 1,
                TokenKind::ParenClose => depth = depth.saturating_sub(1),
                TokenKind::Keyword if depth == 0 && token.is_keyword("AS") => {
                    let after_exec = self
                        .base
                        .previous()
                        .is_some_and(|p| p.is_any_keyword(&["EXEC", "EXECUTE"]));
                    let after_param = self.base.pos() >= 2
                        && self
                            .base
                            .tokens()
                            .get(self.base.pos() - 2)
                            .is_some_and(|t| t.kind == TokenKind::AtSign);
                    if !after_exec && !after_param {
                        self.base.advance();
                        return;
                    }
                }
                TokenKind::Keyword
                    if depth == 0 && object_type == "TRIGGER" && token.is_keyword("ON") =>
                {
                    self.base.advance();
                    if let Some(table) = parse_qualified_name(&mut self.base) {
                        self.register_table(chunk, ScopeRef::Statement, table);
                    }
                    continue;
                }
                _ => {}
            }
            self.base.advance();
        }
    }

    /// Parse every statement of a routine body into the current chunk.
    ///
    /// The body runs to the next `GO` (or end of input); semicolons and
    /// control-flow words inside it do not end the routine.
    fn parse_routine_body(&mut self, chunk: &mut StatementChunk, clauses: &mut ClauseTracker) {
        while let Some(token) = self.base.current_token() {
            let idx = self.base.pos();
            if token.kind == TokenKind::BatchSeparator {
                return;
            }
            if self.opens_subquery(idx) {
                self.parse_subquery(chunk, ScopeRef::Statement, ScopeKind::Subquery);
                continue;
            }
            if token.is_any_keyword(STATEMENT_STARTERS) && self.is_statement_boundary(idx) {
                self.dispatch(chunk, clauses);
                if self.base.pos() == idx {
                    self.base.advance();
                }
                continue;
            }
            self.base.advance();
        }
    }

    // ========================================================================
    // DROP / TRUNCATE
    // ========================================================================

    /// `DROP type [IF EXISTS] name [, name ...]`; dropped temp tables stop
    /// being visible from this line on.
    pub(super) fn parse_drop(&mut self) -> StatementKind {
        let line = self.base.current_token().map_or(1, |t| t.line);
        self.base.advance();
        let object_type = match self.base.current_token() {
            Some(token) if token.is_word("PROC") => "PROCEDURE".to_string(),
            Some(token) if token.kind != TokenKind::Semicolon => token.text.to_ascii_uppercase(),
            _ => String::new(),
        };
        self.base.advance();
        if self.base.check_keyword("IF") && self.base.check_keyword_at(1, "EXISTS") {
            self.base.advance_by(2);
        }

        let mut names = Vec::new();
        while let Some(table) = parse_qualified_name(&mut self.base) {
            if table.is_temp {
                self.temp_tables.drop_table(&table.name, line, self.batch);
            }
            names.push(table);
            if self.base.expect_kind(TokenKind::Comma).is_none() {
                break;
            }
        }
        StatementKind::Drop { object_type, names }
    }

    pub(super) fn parse_truncate(&mut self, clauses: &mut ClauseTracker) -> StatementKind {
        clauses.open("truncate_target", self.base.current_start());
        self.base.advance();
        self.base.expect_keyword("TABLE");
        let target = parse_qualified_name(&mut self.base).filter(|t| !t.name.is_empty());
        StatementKind::Truncate { target }
    }

    // ========================================================================
    // EXEC / DECLARE / SET / USE
    // ========================================================================

    /// `EXEC [@ret =] procedure [args]`; `EXEC ('dynamic sql')` has no procedure.
    pub(super) fn parse_exec(
        &mut self,
        chunk: &mut StatementChunk,
        clauses: &mut ClauseTracker,
    ) -> StatementKind {
        clauses.open("exec", self.base.current_start());
        self.base.advance();
        if self.base.check_kind(TokenKind::AtSign) && self.base.peek(2).is_some_and(|t| t.is_operator("=")) {
            parse_variable(&mut self.base);
            self.base.advance();
        }
        let procedure = if self.base.check_kind(TokenKind::ParenOpen) {
            None
        } else {
            parse_qualified_name(&mut self.base).filter(|t| !t.name.is_empty())
        };
        self.walk(chunk, ScopeRef::Statement, &[], false);
        StatementKind::Exec { procedure }
    }

    /// `DECLARE @a INT = 1, @t TABLE (...), @c CURSOR FOR SELECT ...`
    pub(super) fn parse_declare(
        &mut self,
        chunk: &mut StatementChunk,
        clauses: &mut ClauseTracker,
    ) -> StatementKind {
        self.base.advance();
        let mut variables = Vec::new();
        while let Some(name) = parse_variable(&mut self.base) {
            self.base.expect_keyword("AS");
            let mut variable = DeclaredVariable {
                name,
                data_type: String::new(),
                table_columns: Vec::new(),
            };
            if self.base.check_keyword("TABLE") {
                self.base.advance();
                variable.data_type = "TABLE".to_string();
                if self.base.check_kind(TokenKind::ParenOpen) {
                    variable.table_columns = self.column_definitions();
                }
            } else if self.base.check_keyword("CURSOR") {
                self.base.advance();
                variable.data_type = "CURSOR".to_string();
                while !self.base.is_at_end() && !self.base.check_keyword("FOR") {
                    if self.is_statement_boundary(self.base.pos()) {
                        break;
                    }
                    self.base.advance();
                }
                if self.base.expect_keyword("FOR").is_some() {
                    if self.base.check_keyword("WITH") {
                        self.parse_with(chunk, clauses);
                    } else {
                        self.parse_query(chunk, ScopeRef::Statement, clauses);
                    }
                }
            } else {
                variable.data_type = self.parse_data_type();
                if self.base.current_token().is_some_and(|t| t.is_operator("=")) {
                    self.base.advance();
                    self.walk(chunk, ScopeRef::Statement, &[], true);
                }
            }
            variables.push(variable);
            if self.base.expect_kind(TokenKind::Comma).is_none() {
                break;
            }
        }
        StatementKind::Declare { variables }
    }

    /// Type text up to `=`, `,` or the end of the declaration: `DECIMAL(10, 2)`.
    fn parse_data_type(&mut self) -> String {
        let start = self.base.pos();
        while let Some(token) = self.base.current_token() {
            let ends = match token.kind {
                TokenKind::Comma | TokenKind::Semicolon | TokenKind::BatchSeparator => true,
                TokenKind::Operator => token.text == "=",
                TokenKind::Keyword => self.is_statement_boundary(self.base.pos()),
                _ => false,
            };
            if ends {
                break;
            }
            if token.kind == TokenKind::ParenOpen {
                self.base.skip_parenthesized();
            } else {
                self.base.advance();
            }
        }
        self.base.tokens_to_string(start, self.base.pos())
    }

    /// `SET @v = expr` or a session option (`SET NOCOUNT ON`).
    pub(super) fn parse_set(&mut self, chunk: &mut StatementChunk) -> StatementKind {
        self.base.advance();
        let variable = parse_variable(&mut self.base);
        if variable.is_some() {
            self.walk(chunk, ScopeRef::Statement, &[], false);
        }
        StatementKind::Set { variable }
    }

    pub(super) fn parse_use(&mut self, clauses: &mut ClauseTracker) -> StatementKind {
        clauses.open("use", self.base.current_start());
        self.base.advance();
        let database = self.base.parse_identifier();
        StatementKind::Use { database }
    }
}

/// Table variables declared by a DECLARE chunk, with their column names.
pub fn declared_table_variables(chunk: &StatementChunk) -> Vec<(TableReference, Vec<String>)> {
    match &chunk.kind {
        StatementKind::Declare { variables } => variables
            .iter()
            .filter(|v| v.is_table())
            .map(|v| {
                (
                    table_reference(None, None, None, v.name.clone()),
                    v.table_columns.clone(),
                )
            })
            .collect(),
        _ => Vec::new(),
    }
}
