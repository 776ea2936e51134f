//! Tolerant recursive-descent parsing of SQL buffers into statement chunks

mod clause_tracker;
mod ddl_parser;
mod dml_parser;
mod from_parser;
mod identifier_utils;
mod select_parser;
mod statement_parser;
mod token_parser_base;

use serde::Serialize;

use crate::model::{StatementChunk, TempTables};
use crate::scope::DEFAULT_MAX_SCOPE_DEPTH;
use crate::tokenizer::{tokenize_with_regions, TextRegion, Token, TokenKind};

pub use clause_tracker::{clause_base, MEMBER_SEPARATOR};
pub use ddl_parser::declared_table_variables;
pub use identifier_utils::{normalize_identifier, normalize_key, MAX_NAME_PARTS};
pub use statement_parser::StatementParser;
pub use token_parser_base::{join_tokens, TokenParser};

/// Everything derived from one buffer text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseOutput {
    pub chunks: Vec<StatementChunk>,
    pub temp_tables: TempTables,
    #[serde(skip)]
    pub tokens: Vec<Token>,
    #[serde(skip)]
    pub regions: Vec<TextRegion>,
    /// Lines holding a batch separator, in order
    pub go_boundaries: Vec<usize>,
}

impl ParseOutput {
    /// Batch index of a line: the number of separators on earlier lines.
    pub fn batch_index_at(&self, line: usize) -> usize {
        self.go_boundaries.iter().take_while(|&&go| go < line).count()
    }
}

/// Parse a buffer with the default scope expansion depth.
pub fn parse(text: &str) -> ParseOutput {
    parse_with_depth(text, DEFAULT_MAX_SCOPE_DEPTH)
}

/// Parse a buffer, capping star expansion through nested scopes at `max_scope_depth`.
pub fn parse_with_depth(text: &str, max_scope_depth: usize) -> ParseOutput {
    let stream = tokenize_with_regions(text);
    let go_boundaries = stream
        .tokens
        .iter()
        .filter(|t| t.kind == TokenKind::BatchSeparator)
        .map(|t| t.line)
        .collect();
    let (chunks, temp_tables) = StatementParser::new(&stream.tokens, max_scope_depth).parse_all();
    ParseOutput {
        chunks,
        temp_tables,
        tokens: stream.tokens,
        regions: stream.regions,
        go_boundaries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_collects_batch_boundaries() {
        let output = parse("SELECT 1\nGO\nSELECT 2\nGO 3\nSELECT 3");
        assert_eq!(output.go_boundaries, vec![2, 4]);
        assert_eq!(output.batch_index_at(1), 0);
        assert_eq!(output.batch_index_at(2), 0);
        assert_eq!(output.batch_index_at(3), 1);
        assert_eq!(output.batch_index_at(5), 2);
        assert_eq!(output.chunks.len(), 3);
    }

    #[test]
    fn test_parse_empty_text() {
        let output = parse("");
        assert!(output.chunks.is_empty());
        assert!(output.tokens.is_empty());
    }

    #[test]
    fn test_parse_is_idempotent() {
        let sql = "WITH c AS (SELECT id FROM T) SELECT * FROM c JOIN (SELECT x FROM U) d ON 1 = 1";
        assert_eq!(parse(sql), parse(sql));
    }
}
