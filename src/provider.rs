//! Metadata provider seam
//!
//! The engine never talks to a database. Column lists for real tables and the
//! set of known schema names come from a [`MetadataProvider`] supplied by the
//! host.

use std::collections::{BTreeSet, HashMap};

use crate::cache::BufferSnapshot;
use crate::context::{Context, ContextType};
use crate::model::{ColumnInfo, ScopeRef, StatementChunk, TableReference};
use crate::parser::{declared_table_variables, normalize_key};
use crate::scope::{resolve_qualifier, Resolved};

/// Live schema information.
pub trait MetadataProvider: Send + Sync {
    /// Columns of a real table, or `None` when the table is unknown.
    fn columns(&self, table: &TableReference) -> Option<Vec<String>>;

    /// Whether `name` is a schema (used to tell `schema.` from `alias.`).
    fn is_schema(&self, name: &str) -> bool;
}

/// In-memory metadata, keyed case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct StaticMetadata {
    schemas: BTreeSet<String>,
    /// `schema.table` -> columns
    tables: HashMap<String, Vec<String>>,
}

const DEFAULT_SCHEMA: &str = "dbo";

impl StaticMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(mut self, schema: &str) -> Self {
        self.add_schema(schema);
        self
    }

    pub fn with_table(mut self, schema: &str, table: &str, columns: &[&str]) -> Self {
        self.add_table(schema, table, columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn add_schema(&mut self, schema: &str) {
        self.schemas.insert(normalize_key(schema));
    }

    pub fn add_table(&mut self, schema: &str, table: &str, columns: Vec<String>) {
        self.add_schema(schema);
        self.tables
            .insert(format!("{}.{}", normalize_key(schema), normalize_key(table)), columns);
    }
}

impl MetadataProvider for StaticMetadata {
    fn columns(&self, table: &TableReference) -> Option<Vec<String>> {
        let name = normalize_key(&table.name);
        match &table.schema {
            Some(schema) => self
                .tables
                .get(&format!("{}.{}", normalize_key(schema), name))
                .cloned(),
            None => self
                .tables
                .get(&format!("{DEFAULT_SCHEMA}.{name}"))
                .or_else(|| {
                    let suffix = format!(".{name}");
                    let mut matches = self.tables.iter().filter(|(key, _)| key.ends_with(&suffix));
                    match (matches.next(), matches.next()) {
                        (Some((_, columns)), None) => Some(columns),
                        _ => None,
                    }
                })
                .cloned(),
        }
    }

    fn is_schema(&self, name: &str) -> bool {
        self.schemas.contains(&normalize_key(name))
    }
}

/// Candidate column names for a `Column` context.
///
/// Derived tables and CTEs answer from their own resolved columns, temp tables
/// and table variables from what the buffer recorded, real tables from the
/// provider. Stars are expanded against the provider.
pub fn candidate_columns(
    ctx: &Context,
    snapshot: &BufferSnapshot,
    provider: &dyn MetadataProvider,
) -> Vec<String> {
    if ctx.context_type != ContextType::Column {
        return Vec::new();
    }
    let chunk = ctx.chunk_index.and_then(|i| snapshot.chunks.get(i));
    let at = ScopeRef::from(ctx.scope);
    let lookup = ColumnLookup {
        ctx,
        snapshot,
        provider,
        chunk,
        at,
    };

    let mut names: Vec<String> = Vec::new();
    match &ctx.table_ref {
        Some(qualifier) => lookup.qualified(qualifier, &mut names),
        None => {
            for table in &ctx.tables_in_scope {
                lookup.table(table, &mut names);
            }
            if ctx.tables_in_scope.is_empty() {
                if let Some(target) = &ctx.insert_target {
                    lookup.table(target, &mut names);
                }
            }
        }
    }
    if !ctx.prefix.is_empty() {
        let prefix = ctx.prefix.to_lowercase();
        names.retain(|n| n.to_lowercase().starts_with(&prefix));
    }
    names
}

struct ColumnLookup<'a> {
    ctx: &'a Context,
    snapshot: &'a BufferSnapshot,
    provider: &'a dyn MetadataProvider,
    chunk: Option<&'a StatementChunk>,
    at: ScopeRef,
}

impl ColumnLookup<'_> {
    fn qualified(&self, qualifier: &str, out: &mut Vec<String>) {
        if let Some(chunk) = self.chunk {
            match resolve_qualifier(chunk, self.at, qualifier) {
                Resolved::Scope(id) => {
                    if let Some(node) = chunk.scope(id) {
                        self.expand(&node.columns, out);
                    }
                    return;
                }
                Resolved::Table(table) => {
                    self.table(&table, out);
                    return;
                }
                Resolved::Unresolved => {}
            }
        }
        let mut table = TableReference::named(qualifier);
        table.schema = self.ctx.schema.clone();
        table.database = self.ctx.database.clone();
        table.is_temp = qualifier.starts_with('#');
        table.is_table_variable = qualifier.starts_with('@');
        self.table(&table, out);
    }

    fn table(&self, table: &TableReference, out: &mut Vec<String>) {
        if let (Some(chunk), Some(id)) = (self.chunk, table.derived_scope) {
            if let Some(node) = chunk.scope(id) {
                self.expand(&node.columns, out);
            }
            return;
        }
        if table.is_cte || self.ctx.ctes.contains_key(&normalize_key(&table.name)) {
            if let Some(node) = self.chunk.and_then(|chunk| chunk.cte(&table.name)) {
                self.expand(&node.columns, out);
                return;
            }
        }
        if table.is_temp {
            if let Some(columns) = self.ctx.temp_tables.get(&normalize_key(&table.name)) {
                extend_unique(out, columns.iter().filter(|c| *c != "*").cloned());
            }
            return;
        }
        if table.is_table_variable {
            let batch = self.ctx.batch;
            let declared = self
                .snapshot
                .chunks
                .iter()
                .filter(|c| c.go_batch_index == batch)
                .flat_map(declared_table_variables)
                .find(|(variable, _)| variable.name.eq_ignore_ascii_case(&table.name));
            if let Some((_, columns)) = declared {
                extend_unique(out, columns);
            }
            return;
        }
        if let Some(columns) = self.provider.columns(table) {
            extend_unique(out, columns);
        }
    }

    fn expand(&self, columns: &[ColumnInfo], out: &mut Vec<String>) {
        for column in columns {
            if !column.is_star {
                extend_unique(out, [column.output_name().to_string()]);
                continue;
            }
            let Some(parent) = &column.parent_table else {
                continue;
            };
            let mut table = TableReference::named(parent.clone());
            table.schema = column.parent_schema.clone();
            if let Some(found) = self.provider.columns(&table) {
                extend_unique(out, found);
            }
        }
    }
}

fn extend_unique(out: &mut Vec<String>, names: impl IntoIterator<Item = String>) {
    for name in names {
        if !out.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
            out.push(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_metadata_lookup() {
        let meta = StaticMetadata::new()
            .with_table("dbo", "Users", &["id", "name"])
            .with_table("sales", "Orders", &["id", "total"])
            .with_schema("audit");

        assert!(meta.is_schema("DBO"));
        assert!(meta.is_schema("audit"));
        assert!(!meta.is_schema("u"));

        let users = meta.columns(&TableReference::named("users")).unwrap();
        assert_eq!(users, vec!["id", "name"]);

        // Unique name outside dbo resolves without a schema
        let orders = meta.columns(&TableReference::named("Orders")).unwrap();
        assert_eq!(orders, vec!["id", "total"]);

        let mut qualified = TableReference::named("Orders");
        qualified.schema = Some("dbo".to_string());
        assert!(meta.columns(&qualified).is_none());
    }
}
