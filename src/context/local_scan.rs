//! Token and text scans for sub-contexts the parser does not track as clauses

use std::sync::LazyLock;

use regex::Regex;

use crate::tokenizer::{Token, TokenKind};

/// `lhs <op>` at the very end of the text before the cursor.
static COMPARISON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"((?:\[[^\]]+\]|[\w@#$]+)(?:\.(?:\[[^\]]+\]|[\w@#$]+))*)\s*(?:<>|!=|<=|>=|=|<|>)\s*$",
    )
    .unwrap()
});

/// Keywords that end the search for the clause governing a predicate.
const PREDICATE_ANCHORS: &[&str] = &[
    "ON", "WHERE", "JOIN", "FROM", "SELECT", "SET", "GROUP", "ORDER", "HAVING", "WHEN",
    "THEN", "USING", "APPLY", "VALUES",
];

/// Index of the `(` left open at the end of `tokens`.
pub fn unclosed_paren(tokens: &[Token]) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().rev() {
        match token.kind {
            TokenKind::ParenClose => depth += 1,
            TokenKind::ParenOpen if depth == 0 => return Some(i),
            TokenKind::ParenOpen => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Index of the `(` matching the `)` at `close`.
fn matching_open(tokens: &[Token], close: usize) -> Option<usize> {
    unclosed_paren(&tokens[..close])
}

/// The nearest anchor keyword at the cursor's nesting level is `ON`.
///
/// `AND`/`OR` chains are transparent, so `ON a.id = b.id AND |` still counts.
pub fn in_on_clause(tokens: &[Token]) -> bool {
    let mut i = tokens.len();
    while i > 0 {
        i -= 1;
        let token = &tokens[i];
        match token.kind {
            TokenKind::ParenOpen => return false,
            TokenKind::ParenClose => match matching_open(tokens, i) {
                Some(open) => i = open,
                None => return false,
            },
            TokenKind::Keyword if token.is_any_keyword(PREDICATE_ANCHORS) => {
                return token.is_keyword("ON")
            }
            _ => {}
        }
    }
    false
}

/// Zero-based position inside the VALUES tuple the cursor is typing.
///
/// Returns `None` unless the innermost open parenthesis is a tuple of a
/// `VALUES` list (`VALUES (1, 2), (3, |`).
pub fn values_position(tokens: &[Token]) -> Option<usize> {
    let open = unclosed_paren(tokens)?;

    let mut i = open;
    loop {
        let previous = tokens.get(i.checked_sub(1)?)?;
        match previous.kind {
            TokenKind::Keyword if previous.is_keyword("VALUES") => break,
            TokenKind::Comma => i -= 1,
            TokenKind::ParenClose => i = matching_open(tokens, i - 1)?,
            _ => return None,
        }
    }

    let mut depth = 0usize;
    let mut commas = 0;
    for token in &tokens[open + 1..] {
        match token.kind {
            TokenKind::ParenOpen => depth += 1,
            TokenKind::ParenClose => depth = depth.saturating_sub(1),
            TokenKind::Comma if depth == 0 => commas += 1,
            _ => {}
        }
    }
    Some(commas)
}

/// The cursor is inside `INSERT [INTO] target (` (or a MERGE `INSERT (`)
/// with the list still open.
pub fn insert_columns_open(tokens: &[Token]) -> bool {
    let Some(open) = unclosed_paren(tokens) else {
        return false;
    };
    if tokens[open + 1..]
        .iter()
        .any(|t| t.is_any_keyword(&["SELECT", "VALUES", "EXEC", "EXECUTE"]))
    {
        return false;
    }
    let mut i = open;
    let mut saw_name = false;
    while i > 0 {
        let token = &tokens[i - 1];
        if token.is_name() {
            saw_name = true;
        } else if !matches!(token.kind, TokenKind::Dot | TokenKind::Hash | TokenKind::AtSign) {
            break;
        }
        i -= 1;
    }
    if i == 0 {
        return false;
    }
    if saw_name {
        tokens[i - 1].is_any_keyword(&["INTO", "INSERT"])
    } else {
        // MERGE ... THEN INSERT (
        tokens[i - 1].is_keyword("INSERT")
    }
}

/// Left-hand side of a comparison the cursor is completing (`a.col = |`).
pub fn comparison_lhs(text_before: &str) -> Option<String> {
    COMPARISON_RE
        .captures(text_before)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;

    #[test]
    fn test_on_clause_detection() {
        assert!(in_on_clause(&tokenize("SELECT * FROM a JOIN b ON")));
        assert!(in_on_clause(&tokenize(
            "SELECT * FROM a JOIN b ON a.id = b.id AND"
        )));
        assert!(in_on_clause(&tokenize(
            "SELECT * FROM a JOIN b ON (a.id = b.id) OR"
        )));
        assert!(!in_on_clause(&tokenize("SELECT * FROM a JOIN b ON a.id = b.id WHERE")));
        assert!(!in_on_clause(&tokenize("SELECT * FROM a WHERE x IN (")));
    }

    #[test]
    fn test_values_position() {
        assert_eq!(values_position(&tokenize("INSERT INTO t (a, b) VALUES (")), Some(0));
        assert_eq!(values_position(&tokenize("INSERT INTO t VALUES (1, 'x',")), Some(2));
        assert_eq!(
            values_position(&tokenize("INSERT INTO t VALUES (1, 2), (3, COALESCE(4, 5),")),
            Some(2)
        );
        assert_eq!(values_position(&tokenize("INSERT INTO t VALUES (1, 2)")), None);
        assert_eq!(values_position(&tokenize("SELECT COUNT(")), None);
    }

    #[test]
    fn test_insert_columns_open() {
        assert!(insert_columns_open(&tokenize("INSERT INTO dbo.t (")));
        assert!(insert_columns_open(&tokenize("INSERT INTO #t (a,")));
        assert!(insert_columns_open(&tokenize("INSERT t (a, b,")));
        assert!(insert_columns_open(&tokenize("WHEN NOT MATCHED THEN INSERT (id,")));
        assert!(!insert_columns_open(&tokenize("INSERT INTO t (a, b)")));
        assert!(!insert_columns_open(&tokenize("SELECT COUNT(")));
    }

    #[test]
    fn test_comparison_lhs() {
        assert_eq!(comparison_lhs("WHERE a.id = ").as_deref(), Some("a.id"));
        assert_eq!(comparison_lhs("ON o.[Customer Id]<=").as_deref(), Some("o.[Customer Id]"));
        assert_eq!(comparison_lhs("WHERE total <> ").as_deref(), Some("total"));
        assert_eq!(comparison_lhs("WHERE a.id = 1 AND "), None);
    }
}
