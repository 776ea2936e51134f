//! Scope resolution over a parsed chunk.
//!
//! Runs after a chunk is parsed: fills `parent_table` / `parent_schema` on
//! columns whose qualifier (or sole source) is known, then expands star
//! columns that point at derived tables and CTEs. Stars over real tables are
//! left for a metadata provider.
//!
//! Lookups walk outward from a scope through its ancestors to the statement,
//! except that a CTE body only sees itself and the CTEs declared before it.

use std::collections::{HashMap, HashSet};

use crate::model::{ColumnInfo, ScopeId, ScopeKind, ScopeRef, StatementChunk, TableReference};
use crate::parser::normalize_key;

/// Default cap on nested expansion (scope within scope).
pub const DEFAULT_MAX_SCOPE_DEPTH: usize = 16;

/// What a qualifier such as `a` in `a.col` refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// A real table, temp table or table variable
    Table(TableReference),
    /// A derived table or CTE in the chunk's arena
    Scope(ScopeId),
    Unresolved,
}

/// Resolve every scope of a chunk with the default depth cap.
pub fn resolve_chunk(chunk: &mut StatementChunk) {
    resolve_chunk_with_depth(chunk, DEFAULT_MAX_SCOPE_DEPTH);
}

pub fn resolve_chunk_with_depth(chunk: &mut StatementChunk, max_depth: usize) {
    attribute_columns(chunk);

    let (expanded, statement_columns) = {
        let mut expander = Expander::new(chunk, max_depth);
        for index in 0..chunk.scopes.len() {
            expander.scope_columns(ScopeId(index), 1);
        }
        let statement_columns = expander.expand_list(ScopeRef::Statement, &chunk.columns, 0);
        (expander.done, statement_columns)
    };
    for (id, columns) in expanded {
        if let Some(node) = chunk.scope_mut(id) {
            node.columns = columns;
        }
    }
    chunk.columns = statement_columns;
}

// ============================================================================
// Lookups
// ============================================================================

/// Tables visible at a scope: its own, then those of enclosing scopes.
pub fn visible_tables(chunk: &StatementChunk, at: ScopeRef) -> Vec<&TableReference> {
    let mut tables = Vec::new();
    let mut current = Some(at);
    while let Some(scope) = current {
        tables.extend(chunk.tables_of(scope));
        current = chunk.parent_of(scope);
    }
    tables
}

/// Resolve a qualifier innermost-out: aliases, then bare table names, then
/// CTE names.
pub fn resolve_qualifier(chunk: &StatementChunk, at: ScopeRef, qualifier: &str) -> Resolved {
    let key = normalize_key(qualifier);
    let mut current = Some(at);
    while let Some(scope) = current {
        if let Some(table) = chunk.aliases_of(scope).and_then(|aliases| aliases.get(&key)) {
            return classify(chunk, at, table);
        }
        if let Some(table) = chunk
            .tables_of(scope)
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(qualifier))
        {
            return classify(chunk, at, table);
        }
        current = chunk.parent_of(scope);
    }
    match visible_cte(chunk, at, qualifier) {
        Some(id) => Resolved::Scope(id),
        None => Resolved::Unresolved,
    }
}

/// Column names behind a qualifier when it names a derived table or CTE.
///
/// Real tables return `None`; their columns come from a metadata provider.
pub fn columns_for_qualifier(
    chunk: &StatementChunk,
    at: ScopeRef,
    qualifier: &str,
) -> Option<Vec<String>> {
    match resolve_qualifier(chunk, at, qualifier) {
        Resolved::Scope(id) => chunk.scope(id).map(|node| node.column_names()),
        _ => None,
    }
}

/// CTE named `name` that is visible from `at`.
///
/// Inside a CTE body only that CTE and the ones declared before it count.
pub fn visible_cte(chunk: &StatementChunk, at: ScopeRef, name: &str) -> Option<ScopeId> {
    let limit = match chunk.enclosing_cte(at) {
        Some(current) => chunk
            .ctes
            .iter()
            .position(|id| *id == current)
            .map_or(chunk.ctes.len(), |i| i + 1),
        None => chunk.ctes.len(),
    };
    chunk.ctes[..limit].iter().copied().find(|id| {
        chunk
            .scope(*id)
            .and_then(|node| node.cte_name())
            .is_some_and(|n| n.eq_ignore_ascii_case(name))
    })
}

/// Scope behind a table source, if it is a derived table or a visible CTE.
fn source_scope(chunk: &StatementChunk, at: ScopeRef, table: &TableReference) -> Option<ScopeId> {
    if let Some(id) = table.derived_scope {
        return Some(id);
    }
    if table.schema.is_none() && table.database.is_none() {
        return visible_cte(chunk, at, &table.name);
    }
    None
}

fn classify(chunk: &StatementChunk, at: ScopeRef, table: &TableReference) -> Resolved {
    match source_scope(chunk, at, table) {
        Some(id) => Resolved::Scope(id),
        None => Resolved::Table(table.clone()),
    }
}

// ============================================================================
// Attribution
// ============================================================================

/// Fill `parent_table` / `parent_schema` from qualifiers or a sole source.
fn attribute_columns(chunk: &mut StatementChunk) {
    let mut scopes: Vec<ScopeRef> = (0..chunk.scopes.len())
        .map(|i| ScopeRef::Node(ScopeId(i)))
        .collect();
    scopes.push(ScopeRef::Statement);

    for at in scopes {
        let parents: Vec<Option<(String, Option<String>)>> = chunk
            .columns_of(at)
            .iter()
            .map(|column| column_parent(chunk, at, column))
            .collect();
        if let Some(columns) = chunk.columns_of_mut(at) {
            for (column, parent) in columns.iter_mut().zip(parents) {
                if let Some((table, schema)) = parent {
                    column.parent_table = Some(table);
                    column.parent_schema = schema;
                }
            }
        }
    }
}

fn column_parent(
    chunk: &StatementChunk,
    at: ScopeRef,
    column: &ColumnInfo,
) -> Option<(String, Option<String>)> {
    if column.is_expression {
        return None;
    }
    let table = match &column.source_table {
        Some(qualifier) => match resolve_qualifier(chunk, at, qualifier) {
            Resolved::Table(table) => return Some((table.name, table.schema)),
            Resolved::Scope(id) => return Some((scope_label(chunk, id, qualifier), None)),
            Resolved::Unresolved => return None,
        },
        None => match chunk.tables_of(at) {
            [only] => only,
            _ => return None,
        },
    };
    match source_scope(chunk, at, table) {
        Some(id) => Some((scope_label(chunk, id, &table.name), None)),
        None => Some((table.name.clone(), table.schema.clone())),
    }
}

/// Name a scope is known by: CTE name, derived alias, or the fallback.
fn scope_label(chunk: &StatementChunk, id: ScopeId, fallback: &str) -> String {
    match chunk.scope(id).map(|node| &node.kind) {
        Some(ScopeKind::Cte { name, .. }) => name.clone(),
        Some(ScopeKind::Derived {
            alias: Some(alias), ..
        }) => alias.clone(),
        _ => fallback.to_string(),
    }
}

// ============================================================================
// Star expansion
// ============================================================================

/// Memoized star expansion with a recursion guard.
struct Expander<'c> {
    chunk: &'c StatementChunk,
    max_depth: usize,
    done: HashMap<ScopeId, Vec<ColumnInfo>>,
    in_progress: HashSet<ScopeId>,
}

impl<'c> Expander<'c> {
    fn new(chunk: &'c StatementChunk, max_depth: usize) -> Self {
        Self {
            chunk,
            max_depth,
            done: HashMap::new(),
            in_progress: HashSet::new(),
        }
    }

    /// Output columns of a scope with stars expanded and renames applied.
    ///
    /// Returns `None` for a scope already being expanded (a recursive CTE)
    /// or past the depth cap.
    fn scope_columns(&mut self, id: ScopeId, depth: usize) -> Option<Vec<ColumnInfo>> {
        if let Some(columns) = self.done.get(&id) {
            return Some(columns.clone());
        }
        if depth > self.max_depth {
            tracing::trace!(scope = id.0, depth, "scope expansion depth cap reached");
            return None;
        }
        let chunk = self.chunk;
        let node = chunk.scope(id)?;
        if !self.in_progress.insert(id) {
            return None;
        }
        let expanded = self.expand_list(ScopeRef::Node(id), &node.columns, depth);
        let columns = match &node.kind {
            ScopeKind::Cte {
                explicit_columns, ..
            } => rename_positionally(expanded, explicit_columns),
            ScopeKind::Derived { column_aliases, .. } => {
                rename_positionally(expanded, column_aliases)
            }
            ScopeKind::Subquery => expanded,
        };
        self.in_progress.remove(&id);
        self.done.insert(id, columns.clone());
        Some(columns)
    }

    fn expand_list(&mut self, at: ScopeRef, columns: &[ColumnInfo], depth: usize) -> Vec<ColumnInfo> {
        let chunk = self.chunk;
        let mut out = Vec::with_capacity(columns.len());
        for column in columns {
            if !column.is_star {
                out.push(column.clone());
                continue;
            }
            match &column.source_table {
                Some(qualifier) => match resolve_qualifier(chunk, at, qualifier) {
                    Resolved::Scope(id) => match self.scope_columns(id, depth + 1) {
                        Some(inner) => out.extend(requalify(inner, qualifier)),
                        None => out.push(column.clone()),
                    },
                    _ => out.push(column.clone()),
                },
                None => {
                    let tables = chunk.tables_of(at);
                    if tables.is_empty() {
                        out.push(column.clone());
                    }
                    for table in tables {
                        out.extend(self.expand_source(at, table, depth));
                    }
                }
            }
        }
        out
    }

    /// Columns contributed by one source to an unqualified `*`.
    fn expand_source(&mut self, at: ScopeRef, table: &TableReference, depth: usize) -> Vec<ColumnInfo> {
        let label = table.alias.as_deref().unwrap_or(&table.name);
        if let Some(id) = source_scope(self.chunk, at, table) {
            if let Some(inner) = self.scope_columns(id, depth + 1) {
                return requalify(inner, label);
            }
        }
        vec![ColumnInfo {
            parent_table: Some(table.name.clone()),
            parent_schema: table.schema.clone(),
            ..ColumnInfo::star(table.alias.clone())
        }]
    }
}

/// Columns of an inner scope as seen through `qualifier`.
fn requalify(columns: Vec<ColumnInfo>, qualifier: &str) -> Vec<ColumnInfo> {
    columns
        .into_iter()
        .map(|column| {
            if column.is_star {
                // A star over a real table stays attributed to that table.
                return column;
            }
            ColumnInfo {
                name: column.output_name().to_string(),
                source_table: Some(qualifier.to_string()),
                parent_table: Some(qualifier.to_string()),
                ..ColumnInfo::default()
            }
        })
        .collect()
}

/// Apply an explicit column list (`cte (a, b)`, `AS d (a, b)`) by position.
fn rename_positionally(columns: Vec<ColumnInfo>, names: &[String]) -> Vec<ColumnInfo> {
    if names.is_empty() {
        return columns;
    }
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let mut column = columns
                .get(i)
                .filter(|c| !c.is_star)
                .cloned()
                .unwrap_or_else(|| ColumnInfo::named(name.clone()));
            column.alias = Some(name.clone());
            column
        })
        .collect()
}
