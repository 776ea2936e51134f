//! Parsed statement chunks

use std::collections::BTreeMap;

use serde::Serialize;

use super::elements::{ColumnInfo, DeclaredVariable, TableReference};
use super::position::{Position, Span};
use super::scope::{ScopeId, ScopeKind, ScopeNode, ScopeRef};

/// Statement type with a per-kind payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatementKind {
    Select,
    Insert {
        target: Option<TableReference>,
    },
    Update {
        target: Option<TableReference>,
    },
    Delete {
        target: Option<TableReference>,
    },
    Merge {
        target: Option<TableReference>,
        source: Option<TableReference>,
    },
    Create {
        object_type: String,
        name: Option<TableReference>,
    },
    Alter {
        object_type: String,
        name: Option<TableReference>,
    },
    Drop {
        object_type: String,
        names: Vec<TableReference>,
    },
    Truncate {
        target: Option<TableReference>,
    },
    Exec {
        procedure: Option<TableReference>,
    },
    Declare {
        variables: Vec<DeclaredVariable>,
    },
    Set {
        variable: Option<String>,
    },
    Use {
        database: Option<String>,
    },
    Other,
}

impl StatementKind {
    /// Upper-case statement type name.
    pub fn statement_type(&self) -> &'static str {
        match self {
            StatementKind::Select => "SELECT",
            StatementKind::Insert { .. } => "INSERT",
            StatementKind::Update { .. } => "UPDATE",
            StatementKind::Delete { .. } => "DELETE",
            StatementKind::Merge { .. } => "MERGE",
            StatementKind::Create { .. } => "CREATE",
            StatementKind::Alter { .. } => "ALTER",
            StatementKind::Drop { .. } => "DROP",
            StatementKind::Truncate { .. } => "TRUNCATE",
            StatementKind::Exec { .. } => "EXEC",
            StatementKind::Declare { .. } => "DECLARE",
            StatementKind::Set { .. } => "SET",
            StatementKind::Use { .. } => "USE",
            StatementKind::Other => "OTHER",
        }
    }

    /// DML/DDL target table, when the statement has one.
    pub fn target(&self) -> Option<&TableReference> {
        match self {
            StatementKind::Insert { target }
            | StatementKind::Update { target }
            | StatementKind::Delete { target }
            | StatementKind::Truncate { target }
            | StatementKind::Merge { target, .. } => target.as_ref(),
            StatementKind::Create { name, .. } | StatementKind::Alter { name, .. } => {
                name.as_ref()
            }
            _ => None,
        }
    }
}

/// One top-level statement within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementChunk {
    pub kind: StatementKind,
    pub tables: Vec<TableReference>,
    /// Lower-cased alias -> source
    pub aliases: BTreeMap<String, TableReference>,
    pub columns: Vec<ColumnInfo>,
    /// Root-level subquery / derived-table scopes
    pub subqueries: Vec<ScopeId>,
    /// CTE scopes in declaration order
    pub ctes: Vec<ScopeId>,
    /// Arena holding every nested scope of this statement
    pub scopes: Vec<ScopeNode>,
    pub parameters: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_table_target: Option<String>,
    pub insert_columns: Vec<String>,
    pub go_batch_index: usize,
    pub start: Position,
    pub end: Position,
    /// True when the statement was closed by `;`
    pub terminated: bool,
    pub clause_positions: BTreeMap<String, Span>,
}

impl StatementChunk {
    pub fn new(kind: StatementKind, batch: usize, start: Position) -> Self {
        Self {
            kind,
            tables: Vec::new(),
            aliases: BTreeMap::new(),
            columns: Vec::new(),
            subqueries: Vec::new(),
            ctes: Vec::new(),
            scopes: Vec::new(),
            parameters: Vec::new(),
            temp_table_target: None,
            insert_columns: Vec::new(),
            go_batch_index: batch,
            start,
            end: start,
            terminated: false,
            clause_positions: BTreeMap::new(),
        }
    }

    pub fn statement_type(&self) -> &'static str {
        self.kind.statement_type()
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.start <= pos && pos <= self.end
    }

    pub fn scope(&self, id: ScopeId) -> Option<&ScopeNode> {
        self.scopes.get(id.0)
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> Option<&mut ScopeNode> {
        self.scopes.get_mut(id.0)
    }

    /// CTE scope with this name (case-insensitive).
    pub fn cte(&self, name: &str) -> Option<&ScopeNode> {
        self.ctes
            .iter()
            .filter_map(|id| self.scope(*id))
            .find(|s| s.cte_name().is_some_and(|n| n.eq_ignore_ascii_case(name)))
    }

    pub fn cte_names(&self) -> Vec<String> {
        self.ctes
            .iter()
            .filter_map(|id| self.scope(*id))
            .filter_map(|s| s.cte_name().map(str::to_string))
            .collect()
    }

    pub fn tables_of(&self, at: ScopeRef) -> &[TableReference] {
        match at {
            ScopeRef::Statement => &self.tables,
            ScopeRef::Node(id) => self.scope(id).map(|s| s.tables.as_slice()).unwrap_or(&[]),
        }
    }

    pub fn aliases_of(&self, at: ScopeRef) -> Option<&BTreeMap<String, TableReference>> {
        match at {
            ScopeRef::Statement => Some(&self.aliases),
            ScopeRef::Node(id) => self.scope(id).map(|s| &s.aliases),
        }
    }

    pub fn columns_of(&self, at: ScopeRef) -> &[ColumnInfo] {
        match at {
            ScopeRef::Statement => &self.columns,
            ScopeRef::Node(id) => self.scope(id).map(|s| s.columns.as_slice()).unwrap_or(&[]),
        }
    }

    pub fn clauses_of(&self, at: ScopeRef) -> Option<&BTreeMap<String, Span>> {
        match at {
            ScopeRef::Statement => Some(&self.clause_positions),
            ScopeRef::Node(id) => self.scope(id).map(|s| &s.clause_positions),
        }
    }

    pub fn tables_of_mut(&mut self, at: ScopeRef) -> Option<&mut Vec<TableReference>> {
        match at {
            ScopeRef::Statement => Some(&mut self.tables),
            ScopeRef::Node(id) => self.scope_mut(id).map(|s| &mut s.tables),
        }
    }

    pub fn aliases_of_mut(
        &mut self,
        at: ScopeRef,
    ) -> Option<&mut BTreeMap<String, TableReference>> {
        match at {
            ScopeRef::Statement => Some(&mut self.aliases),
            ScopeRef::Node(id) => self.scope_mut(id).map(|s| &mut s.aliases),
        }
    }

    pub fn columns_of_mut(&mut self, at: ScopeRef) -> Option<&mut Vec<ColumnInfo>> {
        match at {
            ScopeRef::Statement => Some(&mut self.columns),
            ScopeRef::Node(id) => self.scope_mut(id).map(|s| &mut s.columns),
        }
    }

    /// Enclosing scope used for correlated lookups.
    ///
    /// CTE bodies cannot see the statement that uses them, so their chain
    /// stops at the CTE itself.
    pub fn parent_of(&self, at: ScopeRef) -> Option<ScopeRef> {
        match at {
            ScopeRef::Statement => None,
            ScopeRef::Node(id) => {
                let node = self.scope(id)?;
                match (node.parent, &node.kind) {
                    (Some(parent), _) => Some(ScopeRef::Node(parent)),
                    (None, ScopeKind::Cte { .. }) => None,
                    (None, _) => Some(ScopeRef::Statement),
                }
            }
        }
    }

    /// The CTE that (transitively) encloses a scope, if any.
    pub fn enclosing_cte(&self, at: ScopeRef) -> Option<ScopeId> {
        let mut current = at;
        loop {
            match current {
                ScopeRef::Statement => return None,
                ScopeRef::Node(id) => {
                    let node = self.scope(id)?;
                    if node.is_cte() {
                        return Some(id);
                    }
                    current = match node.parent {
                        Some(parent) => ScopeRef::Node(parent),
                        None => ScopeRef::Statement,
                    };
                }
            }
        }
    }

    /// Nesting depth of a scope (statement = 0).
    pub fn depth_of(&self, id: ScopeId) -> usize {
        let mut depth = 1;
        let mut current = self.scope(id).and_then(|s| s.parent);
        while let Some(parent) = current {
            depth += 1;
            current = self.scope(parent).and_then(|s| s.parent);
        }
        depth
    }

    /// Clause spans ordered by start position.
    pub fn ordered_clauses(&self) -> Vec<(&str, Span)> {
        let mut clauses: Vec<(&str, Span)> = self
            .clause_positions
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .collect();
        clauses.sort_by_key(|(_, span)| span.start());
        clauses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_type_names() {
        assert_eq!(StatementKind::Select.statement_type(), "SELECT");
        assert_eq!(
            StatementKind::Merge {
                target: None,
                source: None
            }
            .statement_type(),
            "MERGE"
        );
        assert_eq!(StatementKind::Other.statement_type(), "OTHER");
    }

    #[test]
    fn test_parent_of_cte_stops_at_cte() {
        let mut chunk = StatementChunk::new(StatementKind::Select, 0, Position::new(1, 1));
        chunk.scopes.push(ScopeNode::new(
            ScopeId(0),
            ScopeKind::Cte {
                name: "x".to_string(),
                explicit_columns: Vec::new(),
            },
            None,
            Position::new(1, 10),
        ));
        chunk.scopes.push(ScopeNode::new(
            ScopeId(1),
            ScopeKind::Subquery,
            None,
            Position::new(2, 1),
        ));
        assert_eq!(chunk.parent_of(ScopeRef::Node(ScopeId(0))), None);
        assert_eq!(
            chunk.parent_of(ScopeRef::Node(ScopeId(1))),
            Some(ScopeRef::Statement)
        );
    }
}
