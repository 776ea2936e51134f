//! SQL tokenizer for partially typed buffers
//!
//! A single-pass state machine turns raw text into a flat token stream with
//! 1-based source positions. It never fails: unterminated strings, bracketed
//! identifiers and comments run to the end of input so that a buffer in the
//! middle of an edit still yields a usable stream.
//!
//! Comment and string regions are reported separately so callers can tell
//! whether a cursor sits inside one.

mod keywords;

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::model::Position;

pub use keywords::{
    is_keyword, keyword_category, KeywordCategory, CONTROL_KEYWORDS, STATEMENT_STARTERS,
};

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?$").unwrap());

/// Token kinds produced by the tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Keyword,
    Identifier,
    BracketedIdentifier,
    String,
    Number,
    Operator,
    ParenOpen,
    ParenClose,
    Comma,
    Dot,
    Semicolon,
    Star,
    BatchSeparator,
    AtSign,
    Hash,
}

/// A lexical token with its source range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Token text; bracketed identifiers are stored without their delimiters
    pub text: String,
    pub line: usize,
    pub col: usize,
    pub end_line: usize,
    /// Exclusive end column
    pub end_col: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_category: Option<KeywordCategory>,
}

impl Token {
    #[inline]
    pub fn start(&self) -> Position {
        Position::new(self.line, self.col)
    }

    #[inline]
    pub fn end(&self) -> Position {
        Position::new(self.end_line, self.end_col)
    }

    /// Check for a keyword (case-insensitive).
    #[inline]
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text.eq_ignore_ascii_case(keyword)
    }

    /// Check for an unquoted word, keyword or not (case-insensitive).
    #[inline]
    pub fn is_word(&self, word: &str) -> bool {
        matches!(self.kind, TokenKind::Keyword | TokenKind::Identifier)
            && self.text.eq_ignore_ascii_case(word)
    }

    #[inline]
    pub fn is_any_keyword(&self, keywords: &[&str]) -> bool {
        self.kind == TokenKind::Keyword
            && keywords.iter().any(|k| self.text.eq_ignore_ascii_case(k))
    }

    /// Whether this token can name a table, column or alias.
    pub fn is_name(&self) -> bool {
        match self.kind {
            TokenKind::Identifier | TokenKind::BracketedIdentifier => true,
            TokenKind::Keyword => self.keyword_category.is_some_and(|c| c.is_soft()),
            _ => false,
        }
    }

    /// Whether this token can be an implicit alias (`FROM Users u`).
    ///
    /// Stricter than [`Token::is_name`]: soft keywords need an explicit `AS`.
    #[inline]
    pub fn is_alias_candidate(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Identifier | TokenKind::BracketedIdentifier
        )
    }

    #[inline]
    pub fn is_operator(&self, op: &str) -> bool {
        self.kind == TokenKind::Operator && self.text == op
    }
}

/// Kind of a non-token text region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    LineComment,
    BlockComment,
    String,
}

/// A comment or string literal region.
///
/// `end` is exclusive; `terminated` is false when the region ran to the end
/// of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextRegion {
    pub kind: RegionKind,
    pub start: Position,
    pub end: Position,
    pub terminated: bool,
}

impl TextRegion {
    /// Whether a cursor at `pos` is inside the region.
    ///
    /// A cursor right after the opening delimiter counts as inside; a cursor
    /// right after a closing delimiter does not. Line comments own the rest of
    /// their line.
    pub fn contains_cursor(&self, pos: Position) -> bool {
        if pos <= self.start {
            return false;
        }
        match self.kind {
            RegionKind::LineComment => pos.line == self.start.line,
            _ if !self.terminated => true,
            _ => pos < self.end,
        }
    }
}

/// Scanner state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Normal,
    InString,
    InBracketedId,
    InQuotedId,
    InBlockComment,
    InLineComment,
}

/// Tokenizer output: tokens plus comment/string regions.
#[derive(Debug, Clone, Default)]
pub struct TokenStream {
    pub tokens: Vec<Token>,
    pub regions: Vec<TextRegion>,
}

/// Tokenize SQL text.
pub fn tokenize(text: &str) -> Vec<Token> {
    tokenize_with_regions(text).tokens
}

/// Tokenize SQL text and report comment/string regions.
pub fn tokenize_with_regions(text: &str) -> TokenStream {
    let normalized = text.replace('\t', " ");
    let mut scanner = Scanner::new(&normalized);
    scanner.run();
    let mut stream = TokenStream {
        tokens: scanner.tokens,
        regions: scanner.regions,
    };
    tag_batch_separators(&mut stream.tokens);
    stream
}

struct Scanner {
    chars: Vec<char>,
    idx: usize,
    line: usize,
    col: usize,
    state: ScanState,
    tokens: Vec<Token>,
    regions: Vec<TextRegion>,
    word: String,
    word_start: Position,
    // Literal/comment in progress
    pending_text: String,
    pending_start: Position,
    comment_depth: usize,
}

impl Scanner {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            idx: 0,
            line: 1,
            col: 1,
            state: ScanState::Normal,
            tokens: Vec::new(),
            regions: Vec::new(),
            word: String::new(),
            word_start: Position::new(1, 1),
            pending_text: String::new(),
            pending_start: Position::new(1, 1),
            comment_depth: 0,
        }
    }

    #[inline]
    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.idx + offset).copied()
    }

    #[inline]
    fn here(&self) -> Position {
        Position::new(self.line, self.col)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.idx).copied()?;
        self.idx += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn run(&mut self) {
        while self.idx < self.chars.len() {
            match self.state {
                ScanState::Normal => self.scan_normal(),
                ScanState::InString => self.scan_string(),
                ScanState::InBracketedId => self.scan_delimited_id(']'),
                ScanState::InQuotedId => self.scan_delimited_id('"'),
                ScanState::InBlockComment => self.scan_block_comment(),
                ScanState::InLineComment => self.scan_line_comment(),
            }
        }
        self.finish();
    }

    /// Close whatever construct is still open at end of input.
    fn finish(&mut self) {
        let end = self.here();
        match self.state {
            ScanState::Normal => self.flush_word(),
            ScanState::InString => {
                let text = std::mem::take(&mut self.pending_text);
                self.push_region(RegionKind::String, end, false);
                self.push_token(TokenKind::String, text, self.pending_start, end);
            }
            ScanState::InBracketedId | ScanState::InQuotedId => {
                let text = std::mem::take(&mut self.pending_text);
                self.push_token(TokenKind::BracketedIdentifier, text, self.pending_start, end);
            }
            ScanState::InBlockComment => self.push_region(RegionKind::BlockComment, end, false),
            ScanState::InLineComment => self.push_region(RegionKind::LineComment, end, true),
        }
        self.state = ScanState::Normal;
    }

    fn scan_normal(&mut self) {
        let Some(c) = self.peek(0) else {
            return;
        };
        let next = self.peek(1);

        if c.is_whitespace() {
            self.flush_word();
            self.bump();
            return;
        }

        match c {
            '-' if next == Some('-') => {
                self.flush_word();
                self.pending_start = self.here();
                self.bump();
                self.bump();
                self.state = ScanState::InLineComment;
            }
            '/' if next == Some('*') => {
                self.flush_word();
                self.pending_start = self.here();
                self.bump();
                self.bump();
                self.comment_depth = 1;
                self.state = ScanState::InBlockComment;
            }
            '\'' => {
                // N'...' national literal: the N prefix belongs to the string
                let national = self.word.eq_ignore_ascii_case("N");
                if national {
                    self.pending_start = self.word_start;
                    self.pending_text = std::mem::take(&mut self.word);
                } else {
                    self.flush_word();
                    self.pending_start = self.here();
                    self.pending_text.clear();
                }
                self.pending_text.push('\'');
                self.bump();
                self.state = ScanState::InString;
            }
            '[' => {
                self.flush_word();
                self.pending_start = self.here();
                self.pending_text.clear();
                self.bump();
                self.state = ScanState::InBracketedId;
            }
            '"' => {
                self.flush_word();
                self.pending_start = self.here();
                self.pending_text.clear();
                self.bump();
                self.state = ScanState::InQuotedId;
            }
            '.' if self.word_is_integer() && next.is_some_and(|n| n.is_ascii_digit()) => {
                // Decimal point inside a number literal
                self.word.push(c);
                self.bump();
            }
            '(' | ')' | ',' | '.' | ';' | '*' | '@' | '#' => {
                self.flush_word();
                let kind = match c {
                    '(' => TokenKind::ParenOpen,
                    ')' => TokenKind::ParenClose,
                    ',' => TokenKind::Comma,
                    '.' => TokenKind::Dot,
                    ';' => TokenKind::Semicolon,
                    '*' => TokenKind::Star,
                    '@' => TokenKind::AtSign,
                    _ => TokenKind::Hash,
                };
                self.emit_char(kind, c);
            }
            '=' | '<' | '>' | '+' | '-' | '/' | '%' | '!' | ':' | '&' | '|' | '^' | '~' => {
                self.flush_word();
                self.emit_char(TokenKind::Operator, c);
            }
            c if c.is_alphanumeric() || c == '_' || c == '$' => {
                if self.word.is_empty() {
                    self.word_start = self.here();
                }
                self.word.push(c);
                self.bump();
            }
            _ => {
                // Anything else (`?`, `{`, backtick ...) is kept as an operator
                // so the stream still covers it.
                self.flush_word();
                self.emit_char(TokenKind::Operator, c);
            }
        }
    }

    fn scan_string(&mut self) {
        while let Some(c) = self.peek(0) {
            if c == '\'' {
                if self.peek(1) == Some('\'') {
                    self.pending_text.push_str("''");
                    self.bump();
                    self.bump();
                    continue;
                }
                self.pending_text.push('\'');
                self.bump();
                let end = self.here();
                let text = std::mem::take(&mut self.pending_text);
                self.push_region(RegionKind::String, end, true);
                self.push_token(TokenKind::String, text, self.pending_start, end);
                self.state = ScanState::Normal;
                return;
            }
            self.pending_text.push(c);
            self.bump();
        }
    }

    fn scan_delimited_id(&mut self, close: char) {
        while let Some(c) = self.peek(0) {
            if c == close {
                if self.peek(1) == Some(close) {
                    self.pending_text.push(close);
                    self.bump();
                    self.bump();
                    continue;
                }
                self.bump();
                let end = self.here();
                let text = std::mem::take(&mut self.pending_text);
                self.push_token(TokenKind::BracketedIdentifier, text, self.pending_start, end);
                self.state = ScanState::Normal;
                return;
            }
            self.pending_text.push(c);
            self.bump();
        }
    }

    fn scan_block_comment(&mut self) {
        while let Some(c) = self.peek(0) {
            if c == '/' && self.peek(1) == Some('*') {
                self.comment_depth += 1;
                self.bump();
                self.bump();
                continue;
            }
            if c == '*' && self.peek(1) == Some('/') {
                self.bump();
                self.bump();
                self.comment_depth -= 1;
                if self.comment_depth == 0 {
                    let end = self.here();
                    self.push_region(RegionKind::BlockComment, end, true);
                    self.state = ScanState::Normal;
                    return;
                }
                continue;
            }
            self.bump();
        }
    }

    fn scan_line_comment(&mut self) {
        while let Some(c) = self.peek(0) {
            if c == '\n' {
                let end = self.here();
                self.push_region(RegionKind::LineComment, end, true);
                self.state = ScanState::Normal;
                return;
            }
            self.bump();
        }
    }

    fn word_is_integer(&self) -> bool {
        !self.word.is_empty() && self.word.chars().all(|c| c.is_ascii_digit())
    }

    fn emit_char(&mut self, kind: TokenKind, c: char) {
        let start = self.here();
        self.bump();
        let end = self.here();
        self.push_token(kind, c.to_string(), start, end);
    }

    fn flush_word(&mut self) {
        if self.word.is_empty() {
            return;
        }
        let word = std::mem::take(&mut self.word);
        let start = self.word_start;
        let end = Position::new(start.line, start.col + word.chars().count());
        if NUMBER_RE.is_match(&word) {
            self.push_token(TokenKind::Number, word, start, end);
        } else if let Some(category) = keyword_category(&word) {
            self.tokens.push(Token {
                kind: TokenKind::Keyword,
                text: word,
                line: start.line,
                col: start.col,
                end_line: end.line,
                end_col: end.col,
                keyword_category: Some(category),
            });
        } else {
            self.push_token(TokenKind::Identifier, word, start, end);
        }
    }

    fn push_token(&mut self, kind: TokenKind, text: String, start: Position, end: Position) {
        self.tokens.push(Token {
            kind,
            text,
            line: start.line,
            col: start.col,
            end_line: end.line,
            end_col: end.col,
            keyword_category: None,
        });
    }

    fn push_region(&mut self, kind: RegionKind, end: Position, terminated: bool) {
        self.regions.push(TextRegion {
            kind,
            start: self.pending_start,
            end,
            terminated,
        });
    }
}

/// Re-tag standalone `GO` lines as batch separators.
///
/// `GO` must be the first token on its line and may only be followed on that
/// line by a repeat count and/or a semicolon.
fn tag_batch_separators(tokens: &mut [Token]) {
    for i in 0..tokens.len() {
        if !tokens[i].is_word("GO") {
            continue;
        }
        let line = tokens[i].line;
        let first_on_line = i == 0 || tokens[i - 1].end_line < line;
        if !first_on_line {
            continue;
        }
        let rest_ok = tokens[i + 1..]
            .iter()
            .take_while(|t| t.line == line)
            .all(|t| matches!(t.kind, TokenKind::Number | TokenKind::Semicolon));
        if rest_ok {
            tokens[i].kind = TokenKind::BatchSeparator;
            tokens[i].keyword_category = None;
        }
    }
}

/// Comment and string regions of `text`, in source order.
pub fn comment_and_string_spans(text: &str) -> Vec<TextRegion> {
    tokenize_with_regions(text).regions
}

/// Whether `pos` sits inside a comment or string literal.
pub fn in_comment_or_string(regions: &[TextRegion], pos: Position) -> bool {
    regions.iter().any(|r| r.contains_cursor(pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(sql: &str) -> Vec<TokenKind> {
        tokenize(sql).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_select() {
        let tokens = tokenize("SELECT a.id FROM dbo.Users u");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["SELECT", "a", ".", "id", "FROM", "dbo", ".", "Users", "u"]
        );
        assert_eq!(tokens[0].kind, TokenKind::Keyword);
        assert_eq!(tokens[0].keyword_category, Some(KeywordCategory::Statement));
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[2].kind, TokenKind::Dot);
    }

    #[test]
    fn test_positions_are_one_based() {
        let tokens = tokenize("SELECT x\n  FROM t");
        assert_eq!((tokens[0].line, tokens[0].col), (1, 1));
        assert_eq!(tokens[0].end_col, 7);
        assert_eq!((tokens[1].line, tokens[1].col), (1, 8));
        assert_eq!((tokens[2].line, tokens[2].col), (2, 3));
        assert_eq!((tokens[3].line, tokens[3].col), (2, 8));
    }

    #[test]
    fn test_tabs_count_as_one_column() {
        let tokens = tokenize("\tSELECT");
        assert_eq!(tokens[0].col, 2);
    }

    #[test]
    fn test_string_with_doubled_quote() {
        let tokens = tokenize("SELECT 'it''s' AS x");
        assert_eq!(tokens[1].kind, TokenKind::String);
        assert_eq!(tokens[1].text, "'it''s'");
        assert_eq!(tokens[2].text, "AS");
    }

    #[test]
    fn test_national_string() {
        let tokens = tokenize("SELECT N'abc'");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].kind, TokenKind::String);
        assert_eq!(tokens[1].text, "N'abc'");
        assert_eq!(tokens[1].col, 8);
    }

    #[test]
    fn test_bracketed_identifier() {
        let tokens = tokenize("SELECT [Order Id], [a]]b] FROM [dbo].[Orders]");
        assert_eq!(tokens[1].kind, TokenKind::BracketedIdentifier);
        assert_eq!(tokens[1].text, "Order Id");
        assert_eq!(tokens[3].text, "a]b");
        assert_eq!(tokens[5].text, "dbo");
        assert_eq!(tokens[7].text, "Orders");
    }

    #[test]
    fn test_double_quoted_identifier() {
        let tokens = tokenize("SELECT \"Name\" FROM t");
        assert_eq!(tokens[1].kind, TokenKind::BracketedIdentifier);
        assert_eq!(tokens[1].text, "Name");
    }

    #[test]
    fn test_nested_block_comment() {
        let stream = tokenize_with_regions("SELECT /* a /* b */ c */ x");
        let texts: Vec<&str> = stream.tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["SELECT", "x"]);
        assert_eq!(stream.regions.len(), 1);
        assert_eq!(stream.regions[0].kind, RegionKind::BlockComment);
    }

    #[test]
    fn test_line_comment() {
        let stream = tokenize_with_regions("SELECT x -- trailing GO\nFROM t");
        let texts: Vec<&str> = stream.tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["SELECT", "x", "FROM", "t"]);
        assert_eq!(stream.regions[0].kind, RegionKind::LineComment);
    }

    #[test]
    fn test_unterminated_constructs_consume_to_end() {
        let stream = tokenize_with_regions("SELECT 'abc");
        assert_eq!(stream.tokens.len(), 2);
        assert_eq!(stream.tokens[1].kind, TokenKind::String);
        assert!(!stream.regions[0].terminated);

        let tokens = tokenize("SELECT [unfinished");
        assert_eq!(tokens[1].kind, TokenKind::BracketedIdentifier);
        assert_eq!(tokens[1].text, "unfinished");

        let stream = tokenize_with_regions("SELECT /* open");
        assert_eq!(stream.tokens.len(), 1);
        assert!(!stream.regions[0].terminated);
    }

    #[test]
    fn test_numbers() {
        let tokens = tokenize("SELECT 1, 2.50, 1e3");
        assert_eq!(tokens[1].kind, TokenKind::Number);
        assert_eq!(tokens[3].kind, TokenKind::Number);
        assert_eq!(tokens[3].text, "2.50");
        assert_eq!(tokens[5].kind, TokenKind::Number);
    }

    #[test]
    fn test_prefix_tokens_are_separate() {
        assert_eq!(
            kinds("@p @@ROWCOUNT #t ##g"),
            vec![
                TokenKind::AtSign,
                TokenKind::Identifier,
                TokenKind::AtSign,
                TokenKind::AtSign,
                TokenKind::Identifier,
                TokenKind::Hash,
                TokenKind::Identifier,
                TokenKind::Hash,
                TokenKind::Hash,
                TokenKind::Identifier,
            ]
        );
    }

    #[test]
    fn test_operators_and_star() {
        assert_eq!(
            kinds("a*b>=c"),
            vec![
                TokenKind::Identifier,
                TokenKind::Star,
                TokenKind::Identifier,
                TokenKind::Operator,
                TokenKind::Operator,
                TokenKind::Identifier,
            ]
        );
    }

    #[test]
    fn test_batch_separator() {
        let tokens = tokenize("SELECT 1\nGO\nSELECT 2\ngo 5\nSELECT go FROM t");
        let separators: Vec<usize> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::BatchSeparator)
            .map(|t| t.line)
            .collect();
        assert_eq!(separators, vec![2, 4]);
    }

    #[test]
    fn test_go_inside_comment_is_not_separator() {
        let tokens = tokenize("SELECT 1\n/*\nGO\n*/\nSELECT 2");
        assert!(tokens.iter().all(|t| t.kind != TokenKind::BatchSeparator));
    }

    #[test]
    fn test_cursor_in_regions() {
        let stream = tokenize_with_regions("SELECT 'abc' -- note");
        assert!(in_comment_or_string(&stream.regions, Position::new(1, 10)));
        assert!(!in_comment_or_string(&stream.regions, Position::new(1, 13)));
        assert!(in_comment_or_string(&stream.regions, Position::new(1, 21)));
    }

    #[test]
    fn test_non_ascii_input_does_not_panic() {
        let tokens = tokenize("SELECT naïve, '日本' FROM café");
        assert_eq!(tokens[1].text, "naïve");
        assert_eq!(tokens.last().unwrap().text, "café");
    }
}
