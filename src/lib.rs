//! sql-scope: context-aware SQL completion core
//!
//! This library turns partially typed T-SQL buffers into statement chunks with
//! nested scopes, and classifies a cursor position into a completion context
//! (column, table, schema, procedure, parameter ...).
//!
//! The pipeline is tokenizer -> statement parser -> scope resolver, wrapped by
//! a per-buffer statement cache and a context detector.

pub mod cache;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod loader;
pub mod model;
pub mod parser;
pub mod provider;
pub mod scope;
pub mod tokenizer;

pub use cache::{BufferSnapshot, BufferSource, InMemoryBuffer, StatementCache};
pub use config::EngineConfig;
pub use context::{Context, ContextDetector, ContextMode, ContextType};
pub use engine::{context_for_text, CompletionEngine};
pub use error::SqlScopeError;
pub use parser::{parse, ParseOutput};
pub use provider::{candidate_columns, MetadataProvider, StaticMetadata};
pub use tokenizer::tokenize;
