//! Source positions and clause spans

use serde::Serialize;

/// A 1-based `(line, col)` location in a buffer.
///
/// Columns count characters after tab normalization. Ordering is by line,
/// then column, so positions can be compared directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl Position {
    pub const fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

/// Source range attributed to one clause of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        // A clause that was opened but never received content still gets a
        // well-formed (empty) span.
        let end = end.max(start);
        Self {
            start_line: start.line,
            start_col: start.col,
            end_line: end.line,
            end_col: end.col,
        }
    }

    #[inline]
    pub fn start(&self) -> Position {
        Position::new(self.start_line, self.start_col)
    }

    #[inline]
    pub fn end(&self) -> Position {
        Position::new(self.end_line, self.end_col)
    }

    /// Inclusive containment check.
    #[inline]
    pub fn contains(&self, pos: Position) -> bool {
        self.start() <= pos && pos <= self.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_ordering() {
        assert!(Position::new(1, 10) < Position::new(2, 1));
        assert!(Position::new(3, 2) < Position::new(3, 5));
    }

    #[test]
    fn test_span_contains_is_inclusive() {
        let span = Span::new(Position::new(1, 5), Position::new(1, 9));
        assert!(span.contains(Position::new(1, 5)));
        assert!(span.contains(Position::new(1, 9)));
        assert!(!span.contains(Position::new(1, 10)));
        assert!(!span.contains(Position::new(1, 4)));
    }

    #[test]
    fn test_span_never_inverted() {
        let span = Span::new(Position::new(2, 5), Position::new(1, 1));
        assert_eq!(span.start(), span.end());
    }
}
