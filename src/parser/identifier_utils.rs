//! Identifier handling: multi-part names, temp/variable prefixes, alias keys.

use crate::model::TableReference;
use crate::tokenizer::{Token, TokenKind};

use super::token_parser_base::TokenParser;

/// Maximum number of dot-separated parts in an object name
/// (`server.database.schema.name`).
pub const MAX_NAME_PARTS: usize = 4;

/// Lower-cased lookup key for aliases, CTE names and temp tables.
#[inline]
pub fn normalize_key(name: &str) -> String {
    name.to_lowercase()
}

/// Strips brackets `[]` and double quotes `""` from an identifier written in
/// source text.
pub fn normalize_identifier(ident: &str) -> String {
    ident
        .trim()
        .trim_matches(|c| c == '[' || c == ']' || c == '"')
        .to_string()
}

/// Read an optional `#`, `##` or `@` prefix glued to the following name.
///
/// Returns the prefix text and advances past it only when a name directly
/// follows; a lone `#` / `@` is left in place.
fn parse_name_prefix(p: &mut TokenParser<'_>) -> Option<&'static str> {
    let first = p.current_token()?;
    let (prefix, len) = match first.kind {
        TokenKind::Hash if is_glued(first, p.peek(1)) && p.check_kind_at(1, TokenKind::Hash) => {
            ("##", 2)
        }
        TokenKind::Hash => ("#", 1),
        TokenKind::AtSign => ("@", 1),
        _ => return None,
    };
    let last_prefix = p.peek(len - 1)?;
    let name = p.peek(len)?;
    if !name.is_name() || !is_glued(last_prefix, Some(name)) {
        return None;
    }
    p.advance_by(len);
    Some(prefix)
}

/// Whether `next` starts exactly where `token` ends.
#[inline]
pub fn is_glued(token: &Token, next: Option<&Token>) -> bool {
    next.is_some_and(|n| n.line == token.end_line && n.col == token.end_col)
}

/// Parse a possibly qualified object name into a [`TableReference`].
///
/// Reads up to four dot-separated parts, right-aligning them to name, schema,
/// database and server; excess leading parts are dropped. `db..name` leaves
/// the schema empty. A trailing dot (`dbo.` while typing) yields a reference
/// with an empty `name`. Returns `None` without consuming anything when the
/// current token cannot start a name.
pub fn parse_qualified_name(p: &mut TokenParser<'_>) -> Option<TableReference> {
    let start = p.pos();
    let prefix = parse_name_prefix(p);
    let Some(first) = p.parse_identifier() else {
        p.set_pos(start);
        return None;
    };

    let mut parts: Vec<Option<String>> = vec![Some(first)];
    while p.check_kind(TokenKind::Dot) {
        p.advance();
        if p.check_kind(TokenKind::Dot) {
            parts.push(None);
            continue;
        }
        match p.parse_identifier() {
            Some(part) => parts.push(Some(part)),
            None => {
                parts.push(Some(String::new()));
                break;
            }
        }
    }

    if parts.len() > MAX_NAME_PARTS {
        parts.drain(..parts.len() - MAX_NAME_PARTS);
    }
    let mut parts = parts.into_iter().rev();
    let name = parts.next().flatten().unwrap_or_default();
    let schema = parts.next().flatten();
    let database = parts.next().flatten();
    let server = parts.next().flatten();

    let name = match prefix {
        Some(prefix) if database.is_none() && schema.is_none() => format!("{prefix}{name}"),
        _ => name,
    };
    Some(table_reference(server, database, schema, name))
}

/// Build a reference, deriving the temp/variable flags from the name prefix.
pub fn table_reference(
    server: Option<String>,
    database: Option<String>,
    schema: Option<String>,
    name: String,
) -> TableReference {
    let is_global_temp = name.starts_with("##");
    let is_temp = name.starts_with('#');
    let is_table_variable = name.starts_with('@');
    TableReference {
        server,
        database,
        schema,
        name,
        is_temp,
        is_global_temp,
        is_table_variable,
        ..Default::default()
    }
}

/// Parse a `@name` variable reference, returning it with its `@`.
pub fn parse_variable(p: &mut TokenParser<'_>) -> Option<String> {
    let at = p.current_token().filter(|t| t.kind == TokenKind::AtSign)?;
    let name = p
        .peek(1)
        .filter(|n| (n.is_name() || n.kind == TokenKind::Keyword) && is_glued(at, Some(*n)))?;
    p.advance_by(2);
    Some(format!("@{}", name.text))
}
