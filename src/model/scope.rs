//! Arena-allocated query scopes (subqueries, derived tables, CTEs)

use std::collections::BTreeMap;

use serde::Serialize;

use super::elements::{ColumnInfo, TableReference};
use super::position::{Position, Span};

/// Index of a scope node inside its chunk's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ScopeId(pub usize);

/// What introduced a scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScopeKind {
    /// Parenthesized SELECT used as an expression (WHERE/SELECT list/IN ...)
    Subquery,
    /// `(SELECT ...) alias` in a FROM/JOIN/USING position
    Derived {
        alias: Option<String>,
        /// `AS d (a, b)` column renames
        column_aliases: Vec<String>,
    },
    /// `name [(cols)] AS (SELECT ...)` inside a WITH block
    Cte {
        name: String,
        explicit_columns: Vec<String>,
    },
}

/// One nested query scope.
///
/// Nodes never own each other: `parent` and `children` are arena indices so
/// correlated lookups and CTE-to-CTE references are plain index walks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeNode {
    pub id: ScopeId,
    #[serde(flatten)]
    pub kind: ScopeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<ScopeId>,
    pub columns: Vec<ColumnInfo>,
    pub tables: Vec<TableReference>,
    pub aliases: BTreeMap<String, TableReference>,
    pub children: Vec<ScopeId>,
    pub parameters: Vec<String>,
    /// Just inside the opening parenthesis
    pub start: Position,
    /// At the closing parenthesis (or the last token when unbalanced)
    pub end: Position,
    /// False while the closing parenthesis has not been typed yet
    pub closed: bool,
    pub clause_positions: BTreeMap<String, Span>,
}

impl ScopeNode {
    pub fn new(id: ScopeId, kind: ScopeKind, parent: Option<ScopeId>, start: Position) -> Self {
        Self {
            id,
            kind,
            parent,
            columns: Vec::new(),
            tables: Vec::new(),
            aliases: BTreeMap::new(),
            children: Vec::new(),
            parameters: Vec::new(),
            start,
            end: start,
            closed: false,
            clause_positions: BTreeMap::new(),
        }
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.start <= pos && pos <= self.end
    }

    /// Like [`ScopeNode::contains`], but an unclosed scope extends to `limit`.
    pub fn reaches(&self, pos: Position, limit: Position) -> bool {
        if self.closed {
            self.contains(pos)
        } else {
            self.start <= pos && pos <= limit.max(self.end)
        }
    }

    pub fn is_cte(&self) -> bool {
        matches!(self.kind, ScopeKind::Cte { .. })
    }

    pub fn cte_name(&self) -> Option<&str> {
        match &self.kind {
            ScopeKind::Cte { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Output column names after resolution.
    pub fn column_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| c.output_name().to_string())
            .collect()
    }
}

/// A position in a chunk's scope tree: the statement itself or a nested node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeRef {
    Statement,
    Node(ScopeId),
}

impl From<Option<ScopeId>> for ScopeRef {
    fn from(id: Option<ScopeId>) -> Self {
        match id {
            Some(id) => ScopeRef::Node(id),
            None => ScopeRef::Statement,
        }
    }
}
