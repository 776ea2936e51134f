//! Immutable parse results for one buffer revision

use std::collections::BTreeMap;

use crate::model::{
    Position, ScopeId, ScopeRef, Span, StatementChunk, TempTableInfo, TempTables,
};
use crate::parser::{parse_with_depth, ParseOutput};
use crate::tokenizer::{in_comment_or_string, TextRegion, Token};

/// Everything the detector needs about a buffer at one revision.
///
/// Snapshots are never mutated after they are built; the cache swaps in a new
/// one on reparse.
#[derive(Debug, Clone)]
pub struct BufferSnapshot {
    pub revision: u64,
    pub text: String,
    pub tokens: Vec<Token>,
    pub regions: Vec<TextRegion>,
    pub chunks: Vec<StatementChunk>,
    pub temp_tables: TempTables,
    pub go_boundaries: Vec<usize>,
}

impl BufferSnapshot {
    pub fn build(revision: u64, text: String, max_scope_depth: usize) -> Self {
        let output = parse_with_depth(&text, max_scope_depth);
        Self::from_output(revision, text, output)
    }

    pub fn from_output(revision: u64, text: String, output: ParseOutput) -> Self {
        Self {
            revision,
            text,
            tokens: output.tokens,
            regions: output.regions,
            chunks: output.chunks,
            temp_tables: output.temp_tables,
            go_boundaries: output.go_boundaries,
        }
    }

    /// Batch index of a 1-based line.
    pub fn batch_index_at(&self, line: usize) -> usize {
        self.go_boundaries.iter().take_while(|&&go| go < line).count()
    }

    /// 1-based line text, empty past the end of the buffer.
    pub fn line_text(&self, line: usize) -> &str {
        line.checked_sub(1)
            .and_then(|index| self.text.split('\n').nth(index))
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .unwrap_or("")
    }

    pub fn in_comment_or_string(&self, pos: Position) -> bool {
        in_comment_or_string(&self.regions, pos)
    }

    /// Tokens that end at or before `pos`.
    pub fn tokens_before(&self, pos: Position) -> &[Token] {
        let count = self.tokens.partition_point(|t| t.start() < pos);
        let tokens = &self.tokens[..count];
        match tokens.last() {
            Some(last) if last.end() > pos => &tokens[..count - 1],
            _ => tokens,
        }
    }

    /// Chunk containing `pos`, or the chunk the cursor is still continuing.
    ///
    /// A cursor just past an unterminated chunk, within `lookahead_lines`
    /// lines of its end and in the same batch, belongs to that chunk.
    pub fn chunk_at_position(
        &self,
        pos: Position,
        lookahead_lines: usize,
    ) -> Option<(usize, &StatementChunk)> {
        if let Some(found) = self
            .chunks
            .iter()
            .enumerate()
            .rev()
            .find(|(_, chunk)| chunk.contains(pos))
        {
            return Some(found);
        }

        let batch = self.batch_index_at(pos.line);
        let (index, chunk) = self
            .chunks
            .iter()
            .enumerate()
            .rev()
            .find(|(_, chunk)| chunk.end < pos)?;
        let continuing = !chunk.terminated
            && chunk.go_batch_index == batch
            && pos.line <= chunk.end.line + lookahead_lines;
        continuing.then_some((index, chunk))
    }

    /// Innermost subquery, derived table or CTE scope around `pos`.
    ///
    /// Scopes whose closing parenthesis has not been typed yet extend up to
    /// the cursor.
    pub fn subquery_at_position(&self, chunk: &StatementChunk, pos: Position) -> Option<ScopeId> {
        let limit = pos.max(chunk.end);
        let roots = chunk.ctes.iter().chain(chunk.subqueries.iter());
        deepest_scope(chunk, roots, pos, limit)
    }

    /// Clause of `at` that the cursor falls in.
    pub fn clause_at_position<'c>(
        &self,
        chunk: &'c StatementChunk,
        at: ScopeRef,
        pos: Position,
    ) -> Option<(&'c str, Span)> {
        clause_at(chunk.clauses_of(at)?, pos)
    }

    pub fn visible_temp_tables(&self, line: usize, batch: usize) -> Vec<&TempTableInfo> {
        self.temp_tables.visible_at(line, batch)
    }
}

fn deepest_scope<'a>(
    chunk: &StatementChunk,
    candidates: impl Iterator<Item = &'a ScopeId>,
    pos: Position,
    limit: Position,
) -> Option<ScopeId> {
    for id in candidates {
        let Some(node) = chunk.scope(*id) else {
            continue;
        };
        if node.reaches(pos, limit) {
            return deepest_scope(chunk, node.children.iter(), pos, limit).or(Some(*id));
        }
    }
    None
}

/// The clause whose span contains `pos`, else the latest one starting before it.
///
/// Adjacent clauses share a boundary position; the later clause wins there.
pub fn clause_at(clauses: &BTreeMap<String, Span>, pos: Position) -> Option<(&str, Span)> {
    let latest = |filter: &dyn Fn(&Span) -> bool| {
        clauses
            .iter()
            .filter(|(_, span)| filter(span))
            .max_by_key(|(_, span)| span.start())
            .map(|(key, span)| (key.as_str(), *span))
    };
    latest(&|span: &Span| span.contains(pos)).or_else(|| latest(&|span: &Span| span.start() <= pos))
}
