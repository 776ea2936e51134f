//! Table, column and temp-table element types

use serde::Serialize;

use super::scope::ScopeId;

/// A table-like source referenced by a statement (FROM/JOIN/INTO/targets).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TableReference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Object name as written, including any `#`/`##`/`@` prefix
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub is_temp: bool,
    pub is_global_temp: bool,
    pub is_table_variable: bool,
    pub is_cte: bool,
    /// Arena index of the derived-table scope when this source is `(SELECT ...) alias`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derived_scope: Option<ScopeId>,
}

impl TableReference {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Lower-cased key under which this source is reachable: alias if present, else name.
    pub fn scope_key(&self) -> String {
        self.alias.as_deref().unwrap_or(&self.name).to_lowercase()
    }

    /// Dotted name as written, e.g. `db.dbo.Users`.
    pub fn qualified_name(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(4);
        for part in [&self.server, &self.database, &self.schema]
            .into_iter()
            .flatten()
        {
            parts.push(part);
        }
        parts.push(&self.name);
        parts.join(".")
    }

    /// Whether `ident` names this source, either by alias or by bare table name.
    pub fn answers_to(&self, ident: &str) -> bool {
        self.alias
            .as_deref()
            .is_some_and(|a| a.eq_ignore_ascii_case(ident))
            || self.name.eq_ignore_ascii_case(ident)
    }

    pub fn is_derived(&self) -> bool {
        self.derived_scope.is_some()
    }
}

/// A column as written in a select list (or inferred from a star).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Output alias (`expr AS alias`, `alias = expr`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Qualifier as written (`a` in `a.col`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_table: Option<String>,
    /// Resolved table, filled in by scope resolution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_schema: Option<String>,
    pub is_star: bool,
    /// True for computed expressions (`COUNT(*)`, `a + b`)
    pub is_expression: bool,
}

impl ColumnInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn star(source_table: Option<String>) -> Self {
        Self {
            name: "*".to_string(),
            source_table,
            is_star: true,
            ..Default::default()
        }
    }

    /// Name visible to an enclosing query.
    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// A variable introduced by DECLARE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeclaredVariable {
    /// Name including the `@` prefix
    pub name: String,
    pub data_type: String,
    /// Column names for `@t TABLE (...)` declarations
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub table_columns: Vec<String>,
}

impl DeclaredVariable {
    pub fn is_table(&self) -> bool {
        self.data_type.eq_ignore_ascii_case("TABLE")
    }
}

/// A `#temp` / `##temp` table created by SELECT...INTO or CREATE TABLE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TempTableInfo {
    /// Name including the `#`/`##` prefix
    pub name: String,
    pub columns: Vec<String>,
    pub is_global: bool,
    pub created_in_batch: usize,
    pub created_at_line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dropped_at_line: Option<usize>,
}

impl TempTableInfo {
    /// Visibility at a cursor line inside `batch`.
    ///
    /// Global temp tables are visible in every batch; local ones only in the
    /// batch that created them. Neither is visible before its creation line or
    /// on/after its drop line.
    pub fn is_visible_at(&self, line: usize, batch: usize) -> bool {
        if !self.is_global && self.created_in_batch != batch {
            return false;
        }
        if line < self.created_at_line {
            return false;
        }
        match self.dropped_at_line {
            Some(dropped) => line < dropped,
            None => true,
        }
    }
}

/// Every temp table created in a buffer, in creation order.
///
/// The same name may be created more than once (e.g. once per batch), so
/// entries are kept as a list and looked up newest-first.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct TempTables {
    entries: Vec<TempTableInfo>,
}

impl TempTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TempTableInfo> {
        self.entries.iter()
    }

    /// Most recently created temp table with this name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&TempTableInfo> {
        self.entries
            .iter()
            .rev()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn create(&mut self, info: TempTableInfo) {
        self.entries.push(info);
    }

    /// Record a DROP of `name` issued at `line` in `batch`.
    ///
    /// Applies to the newest live entry that the dropping batch can see.
    pub fn drop_table(&mut self, name: &str, line: usize, batch: usize) -> bool {
        let target = self.entries.iter_mut().rev().find(|t| {
            t.name.eq_ignore_ascii_case(name)
                && t.dropped_at_line.is_none()
                && t.created_at_line <= line
                && (t.is_global || t.created_in_batch == batch)
        });
        match target {
            Some(entry) => {
                entry.dropped_at_line = Some(line);
                true
            }
            None => false,
        }
    }

    /// Temp tables visible at `line` within `batch`.
    pub fn visible_at(&self, line: usize, batch: usize) -> Vec<&TempTableInfo> {
        let mut visible: Vec<&TempTableInfo> = Vec::new();
        for entry in self.entries.iter().rev() {
            if entry.is_visible_at(line, batch)
                && !visible.iter().any(|v| v.name.eq_ignore_ascii_case(&entry.name))
            {
                visible.push(entry);
            }
        }
        visible.reverse();
        visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp(name: &str, batch: usize, line: usize) -> TempTableInfo {
        TempTableInfo {
            name: name.to_string(),
            columns: vec!["id".to_string()],
            is_global: name.starts_with("##"),
            created_in_batch: batch,
            created_at_line: line,
            dropped_at_line: None,
        }
    }

    #[test]
    fn test_qualified_name() {
        let table = TableReference {
            database: Some("Sales".to_string()),
            schema: Some("dbo".to_string()),
            name: "Orders".to_string(),
            ..Default::default()
        };
        assert_eq!(table.qualified_name(), "Sales.dbo.Orders");
    }

    #[test]
    fn test_scope_key_prefers_alias() {
        let mut table = TableReference::named("Orders");
        assert_eq!(table.scope_key(), "orders");
        table.alias = Some("O".to_string());
        assert_eq!(table.scope_key(), "o");
    }

    #[test]
    fn test_local_temp_visibility_is_batch_scoped() {
        let info = temp("#t", 0, 3);
        assert!(!info.is_visible_at(2, 0));
        assert!(info.is_visible_at(3, 0));
        assert!(!info.is_visible_at(10, 1));
    }

    #[test]
    fn test_global_temp_visible_in_later_batches() {
        let info = temp("##g", 0, 1);
        assert!(info.is_visible_at(20, 3));
    }

    #[test]
    fn test_drop_hides_table_from_drop_line() {
        let mut tables = TempTables::new();
        tables.create(temp("#t", 0, 1));
        assert!(tables.drop_table("#T", 5, 0));
        assert_eq!(tables.visible_at(4, 0).len(), 1);
        assert!(tables.visible_at(5, 0).is_empty());
    }

    #[test]
    fn test_recreated_table_shadows_dropped_one() {
        let mut tables = TempTables::new();
        tables.create(temp("#t", 0, 1));
        tables.drop_table("#t", 3, 0);
        tables.create(temp("#t", 0, 5));
        let visible = tables.visible_at(6, 0);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].created_at_line, 5);
    }
}
