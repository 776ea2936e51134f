//! Base token cursor shared by the statement handlers.
//!
//! `TokenParser` wraps a borrowed token slice and a position, and provides
//! the navigation and checking helpers every handler needs. Handlers never
//! index the slice directly.

use crate::model::Position;
use crate::tokenizer::{Token, TokenKind};

/// Cursor over a token stream.
pub struct TokenParser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> TokenParser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    // ========================================================================
    // Position and state
    // ========================================================================

    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.tokens.len());
    }

    #[inline]
    pub fn tokens(&self) -> &'a [Token] {
        self.tokens
    }

    // ========================================================================
    // Token access
    // ========================================================================

    /// Get current token without consuming.
    #[inline]
    pub fn current_token(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    /// Peek at a token at an offset from the current position.
    #[inline]
    pub fn peek(&self, offset: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + offset)
    }

    /// Token just before the current position.
    #[inline]
    pub fn previous(&self) -> Option<&'a Token> {
        self.pos.checked_sub(1).and_then(|i| self.tokens.get(i))
    }

    #[inline]
    pub fn advance(&mut self) {
        if !self.is_at_end() {
            self.pos += 1;
        }
    }

    #[inline]
    pub fn advance_by(&mut self, count: usize) {
        self.pos = (self.pos + count).min(self.tokens.len());
    }

    /// Start of the current token, or the end of the last token at EOF.
    pub fn current_start(&self) -> Position {
        match self.current_token() {
            Some(token) => token.start(),
            None => self.last_end(),
        }
    }

    /// End of the token before the current position.
    pub fn previous_end(&self) -> Position {
        match self.previous() {
            Some(token) => token.end(),
            None => Position::new(1, 1),
        }
    }

    /// End of the last token in the stream.
    pub fn last_end(&self) -> Position {
        self.tokens
            .last()
            .map(Token::end)
            .unwrap_or_else(|| Position::new(1, 1))
    }

    // ========================================================================
    // Token type checks
    // ========================================================================

    /// Check if current token is a specific keyword.
    #[inline]
    pub fn check_keyword(&self, keyword: &str) -> bool {
        self.current_token().is_some_and(|t| t.is_keyword(keyword))
    }

    #[inline]
    pub fn check_any_keyword(&self, keywords: &[&str]) -> bool {
        self.current_token()
            .is_some_and(|t| t.is_any_keyword(keywords))
    }

    /// Check if current token is a word matching (case-insensitive), whether
    /// or not it is a reserved word (`MATCHED`, `TARGET`, `NOCOUNT`).
    #[inline]
    pub fn check_word_ci(&self, word: &str) -> bool {
        self.current_token().is_some_and(|t| t.is_word(word))
    }

    #[inline]
    pub fn check_kind(&self, kind: TokenKind) -> bool {
        self.current_token().is_some_and(|t| t.kind == kind)
    }

    #[inline]
    pub fn check_kind_at(&self, offset: usize, kind: TokenKind) -> bool {
        self.peek(offset).is_some_and(|t| t.kind == kind)
    }

    #[inline]
    pub fn check_keyword_at(&self, offset: usize, keyword: &str) -> bool {
        self.peek(offset).is_some_and(|t| t.is_keyword(keyword))
    }

    // ========================================================================
    // Expect methods (check and advance)
    // ========================================================================

    /// Expect a specific keyword, advancing if found.
    pub fn expect_keyword(&mut self, keyword: &str) -> Option<()> {
        if self.check_keyword(keyword) {
            self.advance();
            Some(())
        } else {
            None
        }
    }

    pub fn expect_kind(&mut self, kind: TokenKind) -> Option<&'a Token> {
        let token = self.current_token().filter(|t| t.kind == kind)?;
        self.advance();
        Some(token)
    }

    // ========================================================================
    // Identifier parsing
    // ========================================================================

    /// Parse a single name (bracketed or not), without brackets.
    pub fn parse_identifier(&mut self) -> Option<String> {
        let token = self.current_token().filter(|t| t.is_name())?;
        self.advance();
        Some(token.text.clone())
    }

    // ========================================================================
    // Utility methods
    // ========================================================================

    /// Index of the parenthesis closing the one at `open`, if it is closed.
    pub fn matching_paren(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (i, token) in self.tokens.iter().enumerate().skip(open) {
            match token.kind {
                TokenKind::ParenOpen => depth += 1,
                TokenKind::ParenClose => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Some(i);
                    }
                }
                TokenKind::Semicolon | TokenKind::BatchSeparator => return None,
                _ => {}
            }
        }
        None
    }

    /// Skip a parenthesized group, handling nesting.
    ///
    /// Position should be at the opening parenthesis. Afterwards it is past the
    /// closing one, or at the statement boundary when the group is unclosed.
    pub fn skip_parenthesized(&mut self) {
        if !self.check_kind(TokenKind::ParenOpen) {
            return;
        }
        match self.matching_paren(self.pos) {
            Some(close) => self.set_pos(close + 1),
            None => {
                while let Some(token) = self.current_token() {
                    if matches!(token.kind, TokenKind::Semicolon | TokenKind::BatchSeparator) {
                        break;
                    }
                    self.advance();
                }
            }
        }
    }

    /// Names listed in a parenthesized, comma-separated group: `(a, [b c], d)`.
    ///
    /// Position should be at the opening parenthesis; afterwards it is past the
    /// group. Only the first name of each item is taken, so column
    /// definitions (`a INT NOT NULL`) yield their column name.
    pub fn parse_name_list(&mut self) -> Vec<String> {
        let mut names = Vec::new();
        if !self.check_kind(TokenKind::ParenOpen) {
            return names;
        }
        let close = self.matching_paren(self.pos);
        self.advance();
        let mut depth = 0usize;
        let mut item_start = true;
        while let Some(token) = self.current_token() {
            if Some(self.pos) == close {
                self.advance();
                break;
            }
            match token.kind {
                TokenKind::ParenOpen => depth += 1,
                TokenKind::ParenClose if depth == 0 => break,
                TokenKind::ParenClose => depth -= 1,
                TokenKind::Comma if depth == 0 => {
                    item_start = true;
                    self.advance();
                    continue;
                }
                TokenKind::Semicolon | TokenKind::BatchSeparator => break,
                _ if item_start && depth == 0 && token.is_name() => {
                    names.push(token.text.clone());
                }
                _ => {}
            }
            item_start = false;
            self.advance();
        }
        names
    }

    /// Concatenated text of `tokens[start..end]`, separated by single spaces
    /// except around dots and parentheses.
    pub fn tokens_to_string(&self, start: usize, end: usize) -> String {
        let end = end.min(self.tokens.len());
        join_tokens(self.tokens.get(start..end).unwrap_or(&[]))
    }
}

/// Render tokens back to compact SQL text (`COUNT(*) + [a b].c`).
pub fn join_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut previous: Option<&Token> = None;
    for token in tokens {
        let glue = previous.map_or(true, |p| {
            matches!(
                p.kind,
                TokenKind::Dot | TokenKind::ParenOpen | TokenKind::AtSign | TokenKind::Hash
            ) || matches!(
                token.kind,
                TokenKind::Dot | TokenKind::ParenOpen | TokenKind::ParenClose | TokenKind::Comma
            )
        });
        if !glue {
            out.push(' ');
        }
        if token.kind == TokenKind::BracketedIdentifier {
            out.push('[');
            out.push_str(&token.text.replace(']', "]]"));
            out.push(']');
        } else {
            out.push_str(&token.text);
        }
        previous = Some(token);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;

    #[test]
    fn test_check_keyword() {
        let tokens = tokenize("CREATE TABLE");
        let parser = TokenParser::new(&tokens);
        assert!(parser.check_keyword("CREATE"));
        assert!(parser.check_keyword("create"));
        assert!(!parser.check_keyword("SELECT"));
    }

    #[test]
    fn test_check_word_ci_matches_non_keywords() {
        let tokens = tokenize("MINVALUE 100");
        let parser = TokenParser::new(&tokens);
        assert!(parser.check_word_ci("minvalue"));
        assert!(!parser.check_keyword("MINVALUE"));
    }

    #[test]
    fn test_parse_identifier_bracketed() {
        let tokens = tokenize("[My Table] x");
        let mut parser = TokenParser::new(&tokens);
        assert_eq!(parser.parse_identifier(), Some("My Table".to_string()));
        assert_eq!(parser.parse_identifier(), Some("x".to_string()));
        assert!(parser.is_at_end());
    }

    #[test]
    fn test_skip_parenthesized() {
        let tokens = tokenize("(a, (b, c), d) rest");
        let mut parser = TokenParser::new(&tokens);
        parser.skip_parenthesized();
        assert!(parser.check_word_ci("rest"));
    }

    #[test]
    fn test_skip_unclosed_parenthesized_stops_at_semicolon() {
        let tokens = tokenize("(a, b ; SELECT");
        let mut parser = TokenParser::new(&tokens);
        parser.skip_parenthesized();
        assert!(parser.check_kind(TokenKind::Semicolon));
    }

    #[test]
    fn test_parse_name_list() {
        let tokens = tokenize("(id INT NOT NULL, [Full Name] NVARCHAR(50), total DECIMAL(10, 2)) AS");
        let mut parser = TokenParser::new(&tokens);
        assert_eq!(parser.parse_name_list(), vec!["id", "Full Name", "total"]);
        assert!(parser.check_keyword("AS"));
    }

    #[test]
    fn test_tokens_to_string() {
        let tokens = tokenize("COUNT ( * ) + [a b] . c");
        let parser = TokenParser::new(&tokens);
        assert_eq!(parser.tokens_to_string(0, tokens.len()), "COUNT(*) + [a b].c");
    }
}
