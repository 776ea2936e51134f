//! INSERT, UPDATE, DELETE and MERGE.

use crate::model::{ScopeRef, StatementChunk, StatementKind, TableReference};
use crate::tokenizer::TokenKind;

use super::clause_tracker::ClauseTracker;
use super::identifier_utils::parse_qualified_name;
use super::statement_parser::StatementParser;

/// Keywords that end an UPDATE ... SET list.
const SET_STOPS: &[&str] = &["FROM", "WHERE", "OUTPUT", "OPTION"];

/// Keywords that end an OUTPUT column list.
const OUTPUT_STOPS: &[&str] = &["INTO", "FROM", "WHERE", "VALUES", "DEFAULT", "OPTION", "WHEN"];

/// Keywords that end a MERGE section.
const MERGE_STOPS: &[&str] = &["WHEN", "OUTPUT", "OPTION"];

impl<'a> StatementParser<'a> {
    // ========================================================================
    // INSERT
    // ========================================================================

    /// `INSERT [TOP (n)] [INTO] target [(cols)] [OUTPUT ...]
    /// {VALUES (...) | SELECT ... | EXEC ... | DEFAULT VALUES}`
    ///
    /// The target is kept on the statement kind only; the tables of a trailing
    /// SELECT form the statement scope.
    pub(super) fn parse_insert(
        &mut self,
        chunk: &mut StatementChunk,
        clauses: &mut ClauseTracker,
    ) -> StatementKind {
        clauses.open("into", self.base.current_start());
        self.base.advance();
        self.skip_top();
        self.base.expect_keyword("INTO");

        let target = self.parse_target();
        self.skip_table_hints();

        if self.base.check_kind(TokenKind::ParenOpen) && !self.opens_subquery(self.base.pos()) {
            clauses.open("insert_columns", self.base.current_start());
            chunk.insert_columns = self.base.parse_name_list();
        }
        self.parse_output(chunk, clauses);

        if self.base.check_keyword("VALUES") {
            clauses.open("values", self.base.current_start());
            self.base.advance();
            self.walk(chunk, ScopeRef::Statement, &[], false);
        } else if self.base.check_keyword("DEFAULT") && self.base.check_keyword_at(1, "VALUES") {
            self.base.advance_by(2);
        } else if self.base.check_keyword("SELECT") || self.opens_subquery(self.base.pos()) {
            self.parse_query(chunk, ScopeRef::Statement, clauses);
        } else if self.base.check_keyword("WITH") {
            self.parse_with(chunk, clauses);
        } else if self.base.check_any_keyword(&["EXEC", "EXECUTE"]) {
            self.parse_exec(chunk, clauses);
        }
        StatementKind::Insert { target }
    }

    // ========================================================================
    // UPDATE / DELETE
    // ========================================================================

    /// `UPDATE [TOP (n)] target SET ... [OUTPUT ...] [FROM ...] [WHERE ...]`
    pub(super) fn parse_update(
        &mut self,
        chunk: &mut StatementChunk,
        clauses: &mut ClauseTracker,
    ) -> StatementKind {
        clauses.open("update_target", self.base.current_start());
        self.base.advance();
        self.skip_top();
        let target = self.parse_target();
        self.skip_table_hints();

        if self.base.check_keyword("SET") {
            clauses.open("set", self.base.current_start());
            self.base.advance();
            self.walk_predicate(chunk, ScopeRef::Statement, SET_STOPS);
        }
        self.parse_output(chunk, clauses);
        let target = self.parse_dml_from(chunk, clauses, target);
        self.parse_trailing_clauses(chunk, ScopeRef::Statement, clauses);
        StatementKind::Update { target }
    }

    /// `DELETE [TOP (n)] [FROM] target [OUTPUT ...] [FROM ...] [WHERE ...]`
    pub(super) fn parse_delete(
        &mut self,
        chunk: &mut StatementChunk,
        clauses: &mut ClauseTracker,
    ) -> StatementKind {
        clauses.open("delete_target", self.base.current_start());
        self.base.advance();
        self.skip_top();
        self.base.expect_keyword("FROM");
        let target = self.parse_target();
        self.skip_table_hints();

        self.parse_output(chunk, clauses);
        let target = self.parse_dml_from(chunk, clauses, target);
        self.parse_trailing_clauses(chunk, ScopeRef::Statement, clauses);
        StatementKind::Delete { target }
    }

    /// The optional FROM of UPDATE / DELETE.
    ///
    /// With a FROM clause its tables are the real scope and the target is only
    /// a name for one of them; the matching source replaces it. Without one the
    /// target itself is the only table.
    fn parse_dml_from(
        &mut self,
        chunk: &mut StatementChunk,
        clauses: &mut ClauseTracker,
        target: Option<TableReference>,
    ) -> Option<TableReference> {
        if !self.base.check_keyword("FROM") {
            if let Some(table) = &target {
                self.register_table(chunk, ScopeRef::Statement, table.clone());
            }
            return target;
        }
        clauses.open("from", self.base.current_start());
        self.base.advance();
        self.parse_from(chunk, ScopeRef::Statement, clauses);

        let target = target?;
        let named = if target.schema.is_none() && target.database.is_none() {
            chunk
                .tables
                .iter()
                .find(|t| t.answers_to(&target.name))
                .cloned()
        } else {
            None
        };
        match named {
            Some(source) => Some(source),
            None => {
                self.register_table(chunk, ScopeRef::Statement, target.clone());
                Some(target)
            }
        }
    }

    /// `OUTPUT inserted.*, deleted.x [INTO @t (cols)]`
    fn parse_output(&mut self, chunk: &mut StatementChunk, clauses: &mut ClauseTracker) {
        if !self.base.check_keyword("OUTPUT") {
            return;
        }
        clauses.open("output", self.base.current_start());
        self.base.advance();
        self.walk(chunk, ScopeRef::Statement, OUTPUT_STOPS, false);
        if self.base.check_keyword("INTO") {
            self.base.advance();
            parse_qualified_name(&mut self.base);
            if self.base.check_kind(TokenKind::ParenOpen) {
                self.base.skip_parenthesized();
            }
        }
    }

    /// Target name of a DML statement; a half-typed `dbo.` yields nothing.
    fn parse_target(&mut self) -> Option<TableReference> {
        let mut target = parse_qualified_name(&mut self.base).filter(|t| !t.name.is_empty())?;
        target.is_cte = self.is_known_cte(&target);
        Some(target)
    }

    // ========================================================================
    // MERGE
    // ========================================================================

    /// `MERGE [INTO] target [AS t] USING source [AS s] ON ... WHEN ... THEN ...`
    pub(super) fn parse_merge(
        &mut self,
        chunk: &mut StatementChunk,
        clauses: &mut ClauseTracker,
    ) -> StatementKind {
        clauses.open("merge_target", self.base.current_start());
        self.base.advance();
        self.skip_top();
        self.base.expect_keyword("INTO");

        let target = self.parse_target().map(|mut table| {
            self.skip_table_hints();
            table.alias = self.parse_alias();
            table
        });
        if let Some(table) = &target {
            self.register_table(chunk, ScopeRef::Statement, table.clone());
        }

        let mut source = None;
        if self.base.check_keyword("USING") {
            clauses.open("using", self.base.current_start());
            self.base.advance();
            source = self.parse_table_source(chunk, ScopeRef::Statement, clauses);
        }
        if self.base.check_keyword("ON") {
            clauses.open("on", self.base.current_start());
            self.base.advance();
            self.walk_predicate(chunk, ScopeRef::Statement, MERGE_STOPS);
        }

        let mut when = 0;
        while self.base.check_keyword("WHEN") {
            when += 1;
            clauses.open(&format!("when_{when}"), self.base.current_start());
            self.base.advance();
            self.walk_predicate(chunk, ScopeRef::Statement, &["THEN"]);
            if self.base.expect_keyword("THEN").is_none() {
                break;
            }
            self.parse_merge_action(chunk, clauses);
        }

        self.parse_output(chunk, clauses);
        if self.base.check_keyword("OPTION") {
            clauses.open("option", self.base.current_start());
            self.base.advance();
            self.base.skip_parenthesized();
        }
        StatementKind::Merge { target, source }
    }

    /// `UPDATE SET ...`, `DELETE` or `INSERT [(cols)] VALUES (...)` after THEN.
    fn parse_merge_action(&mut self, chunk: &mut StatementChunk, clauses: &mut ClauseTracker) {
        if self.base.check_keyword("UPDATE") {
            self.base.advance();
            if self.base.check_keyword("SET") {
                clauses.open("set", self.base.current_start());
                self.base.advance();
                self.walk_predicate(chunk, ScopeRef::Statement, MERGE_STOPS);
            }
        } else if self.base.check_keyword("DELETE") {
            self.base.advance();
        } else if self.base.check_keyword("INSERT") {
            self.base.advance();
            if self.base.check_kind(TokenKind::ParenOpen) {
                clauses.open("insert_columns", self.base.current_start());
                chunk.insert_columns = self.base.parse_name_list();
            }
            if self.base.check_keyword("VALUES") {
                clauses.open("values", self.base.current_start());
                self.base.advance();
                self.walk(chunk, ScopeRef::Statement, MERGE_STOPS, false);
            } else if self.base.check_keyword("DEFAULT") && self.base.check_keyword_at(1, "VALUES") {
                self.base.advance_by(2);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;

    fn parse_one(sql: &str) -> StatementChunk {
        let tokens = tokenize(sql);
        let (mut chunks, _) = StatementParser::new(&tokens, 16).parse_all();
        chunks.remove(0)
    }

    #[test]
    fn test_insert_values() {
        let chunk = parse_one("INSERT INTO dbo.Orders (id, [Customer Id]) VALUES (1, 2)");
        assert_eq!(chunk.statement_type(), "INSERT");
        assert_eq!(chunk.kind.target().unwrap().name, "Orders");
        assert_eq!(chunk.insert_columns, vec!["id", "Customer Id"]);
        assert!(chunk.clause_positions.contains_key("insert_columns"));
        assert!(chunk.clause_positions.contains_key("values"));
        assert!(chunk.tables.is_empty());
    }

    #[test]
    fn test_insert_select_tables_join_scope() {
        let chunk = parse_one("INSERT #staging SELECT o.id FROM Orders o");
        assert!(chunk.kind.target().unwrap().is_temp);
        assert_eq!(chunk.aliases["o"].name, "Orders");
        assert_eq!(chunk.columns.len(), 1);
    }

    #[test]
    fn test_update_with_from_uses_source_table() {
        let chunk = parse_one(
            "UPDATE o SET o.total = 0 FROM dbo.Orders o JOIN Lines l ON l.order_id = o.id WHERE l.qty = 0",
        );
        let target = chunk.kind.target().unwrap();
        assert_eq!(target.name, "Orders");
        assert_eq!(target.alias.as_deref(), Some("o"));
        assert_eq!(chunk.tables.len(), 2);
        for key in ["update_target", "set", "from", "join_1", "on_1", "where"] {
            assert!(chunk.clause_positions.contains_key(key), "missing {key}");
        }
    }

    #[test]
    fn test_simple_update_registers_target() {
        let chunk = parse_one("UPDATE Customers SET name = 'x' WHERE id = 1");
        assert_eq!(chunk.tables.len(), 1);
        assert_eq!(chunk.aliases["customers"].name, "Customers");
    }

    #[test]
    fn test_delete_forms() {
        let simple = parse_one("DELETE FROM Orders WHERE id = 1");
        assert_eq!(simple.kind.target().unwrap().name, "Orders");
        assert!(simple.clause_positions.contains_key("delete_target"));

        let joined = parse_one("DELETE o FROM Orders o JOIN Lines l ON l.oid = o.id");
        assert_eq!(joined.kind.target().unwrap().name, "Orders");
        assert_eq!(joined.tables.len(), 2);
    }

    #[test]
    fn test_merge() {
        let chunk = parse_one(
            "MERGE INTO dbo.Target AS t USING (SELECT id, v FROM Src) AS s ON t.id = s.id \
             WHEN MATCHED THEN UPDATE SET t.v = s.v \
             WHEN NOT MATCHED THEN INSERT (id, v) VALUES (s.id, s.v);",
        );
        assert_eq!(chunk.statement_type(), "MERGE");
        assert!(chunk.aliases.contains_key("t"));
        assert!(chunk.aliases["s"].is_derived());
        for key in ["merge_target", "using", "on", "when_1", "set", "when_2", "insert_columns", "values"] {
            assert!(chunk.clause_positions.contains_key(key), "missing {key}");
        }
        assert_eq!(chunk.insert_columns, vec!["id", "v"]);
        assert!(chunk.terminated);
    }
}
