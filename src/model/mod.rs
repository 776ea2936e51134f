//! Parse model: positions, table/column references, scopes and statement chunks

mod elements;
mod position;
mod scope;
mod statement;

pub use elements::*;
pub use position::{Position, Span};
pub use scope::{ScopeId, ScopeKind, ScopeNode, ScopeRef};
pub use statement::{StatementChunk, StatementKind};
