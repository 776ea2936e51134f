//! Regex fallback over the text before the cursor

use std::sync::LazyLock;

use regex::Regex;

use super::{Context, ContextMode, ContextRequest, ContextStrategy, ContextType};
use crate::model::TableReference;
use crate::parser::{normalize_identifier, normalize_key};
use crate::tokenizer::keyword_category;

/// Comments and string literals, blanked out before anchoring.
static NOISE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)--[^\n]*|/\*.*?\*/|N?'(?:[^']|'')*'?").unwrap());

static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(select|from|join|apply|into|update|delete|merge|using|table|where|and|or|on|set|by|having|values|when|then|else|exec|execute|use)\b",
    )
    .unwrap()
});

/// `FROM|JOIN|UPDATE|INTO|APPLY name [AS] alias`
static SOURCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:from|join|update|into|apply)\s+((?:\[[^\]]+\]|[#@]*[\w$]+)(?:\s*\.\s*(?:\[[^\]]+\]|[\w$]+))*)(?:\s+(?:as\s+)?(\[[^\]]+\]|[\w$]+))?",
    )
    .unwrap()
});

/// Secondary strategy: keyword-anchored pattern match, no parse tree needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextFallbackStrategy;

impl ContextStrategy for TextFallbackStrategy {
    fn name(&self) -> &'static str {
        "text"
    }

    fn detect(&self, req: &ContextRequest<'_>) -> Option<Context> {
        let statement = statement_text(req);
        let mut ctx = Context::for_request(req, ContextType::Unknown, ContextMode::Fallback);
        collect_sources(&mut ctx, &format!("{statement} {}", statement_rest(req)));

        if req.cursor.trigger == Some('@') {
            ctx.context_type = ContextType::Parameter;
            return Some(ctx);
        }

        let Some(anchor) = ANCHOR_RE.find_iter(&statement).last() else {
            if statement.trim().is_empty() {
                ctx.context_type = ContextType::Keyword;
                return Some(ctx);
            }
            return None;
        };
        let keyword = anchor.as_str().to_ascii_uppercase();
        let tail = &statement[anchor.end()..];

        let expects = match keyword.as_str() {
            "FROM" | "JOIN" | "APPLY" | "INTO" | "UPDATE" | "DELETE" | "MERGE" | "USING"
            | "TABLE" => ContextType::Table,
            "EXEC" | "EXECUTE" => ContextType::Procedure,
            "USE" => ContextType::Database,
            _ => ContextType::Column,
        };

        if req.cursor.trigger == Some('.') {
            qualified(&mut ctx, req, expects);
            return Some(ctx);
        }
        if req.cursor.trigger == Some('#') {
            ctx.context_type = ContextType::Table;
            return Some(ctx);
        }

        let written = tail.trim();
        let finished = !written.is_empty()
            && tail.ends_with(char::is_whitespace)
            && !written.ends_with([',', '(', '=', '<', '>']);
        ctx.context_type = match expects {
            ContextType::Table | ContextType::Procedure if finished => ContextType::Keyword,
            other => other,
        };
        if keyword == "ON" || ((keyword == "AND" || keyword == "OR") && on_chain(&statement)) {
            ctx.clause = Some("on".to_string());
        }
        Some(ctx)
    }
}

/// Text of the current statement up to the cursor, minus the word being typed.
///
/// Starts after the last batch separator or `;` before the cursor; comments
/// and strings are blanked.
fn statement_text(req: &ContextRequest<'_>) -> String {
    let pos = req.position;
    let snapshot = req.snapshot;
    let first_line = snapshot
        .go_boundaries
        .iter()
        .filter(|&&go| go < pos.line)
        .last()
        .map_or(1, |go| go + 1);

    let mut text = String::new();
    for line in first_line..pos.line {
        text.push_str(snapshot.line_text(line));
        text.push('\n');
    }
    text.push_str(req.cursor.before_prefix());

    let cleaned = NOISE_RE.replace_all(&text, " ");
    match cleaned.rfind(';') {
        Some(semi) => cleaned[semi + 1..].to_string(),
        None => cleaned.into_owned(),
    }
}

/// Text after the cursor up to the end of the statement: the next `;` or
/// batch separator.
fn statement_rest(req: &ContextRequest<'_>) -> String {
    let pos = req.position;
    let snapshot = req.snapshot;
    let last_line = snapshot
        .go_boundaries
        .iter()
        .find(|&&go| go > pos.line)
        .map_or(usize::MAX, |go| go - 1);

    let mut text: String = snapshot
        .line_text(pos.line)
        .chars()
        .skip(pos.col.saturating_sub(1))
        .collect();
    let mut line = pos.line + 1;
    let line_count = snapshot.text.split('\n').count();
    while line <= last_line.min(line_count) {
        text.push('\n');
        text.push_str(snapshot.line_text(line));
        line += 1;
    }

    let cleaned = NOISE_RE.replace_all(&text, " ");
    match cleaned.find(';') {
        Some(semi) => cleaned[..semi].to_string(),
        None => cleaned.into_owned(),
    }
}

fn is_reserved(word: &str) -> bool {
    keyword_category(word).is_some_and(|c| !c.is_soft())
}

/// Whether the last `ON`/`WHERE` style anchor in the text is `ON`.
fn on_chain(statement: &str) -> bool {
    ANCHOR_RE
        .find_iter(statement)
        .map(|m| m.as_str().to_ascii_uppercase())
        .filter(|k| k != "AND" && k != "OR")
        .last()
        .is_some_and(|k| k == "ON")
}

fn collect_sources(ctx: &mut Context, statement: &str) {
    for caps in SOURCE_RE.captures_iter(statement) {
        let Some(name) = caps.get(1) else {
            continue;
        };
        let parts: Vec<String> = name
            .as_str()
            .split('.')
            .map(|p| normalize_identifier(p.trim()))
            .collect();
        let Some((table_name, qualifiers)) = parts.split_last() else {
            continue;
        };
        if is_reserved(table_name) {
            continue;
        }
        let mut table = TableReference::named(table_name.clone());
        table.schema = qualifiers.last().cloned();
        table.database = qualifiers.len().checked_sub(2).map(|i| qualifiers[i].clone());
        table.is_temp = table_name.starts_with('#');
        table.is_global_temp = table_name.starts_with("##");
        table.is_table_variable = table_name.starts_with('@');
        table.alias = caps
            .get(2)
            .map(|m| normalize_identifier(m.as_str()))
            .filter(|alias| !is_reserved(alias));

        ctx.aliases.insert(table.scope_key(), table.clone());
        if !ctx.tables_in_scope.contains(&table) {
            ctx.tables_in_scope.push(table);
        }
    }
}

fn qualified(ctx: &mut Context, req: &ContextRequest<'_>, expects: ContextType) {
    let parts = &req.cursor.qualifier;
    let Some(last) = parts.last() else {
        return;
    };
    let owner = parts.len().checked_sub(2).map(|i| parts[i].clone());
    ctx.mode = ContextMode::Qualified;

    let known_source = ctx.aliases.contains_key(&normalize_key(last));
    match expects {
        ContextType::Table | ContextType::Procedure => {
            ctx.context_type = expects;
            ctx.schema = Some(last.clone());
            ctx.database = owner;
        }
        _ if !known_source && req.metadata.is_schema(last) => {
            ctx.context_type = ContextType::Table;
            ctx.schema = Some(last.clone());
            ctx.database = owner;
        }
        _ => {
            ctx.context_type = ContextType::Column;
            ctx.table_ref = Some(last.clone());
            ctx.schema = ctx
                .aliases
                .get(&normalize_key(last))
                .and_then(|t| t.schema.clone())
                .or(owner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::BufferSnapshot;
    use crate::config::EngineConfig;
    use crate::model::Position;
    use crate::provider::StaticMetadata;

    fn fallback(sql: &str, line: usize, col: usize) -> Option<Context> {
        let snapshot = BufferSnapshot::build(1, sql.to_string(), 16);
        let config = EngineConfig::default();
        let metadata = StaticMetadata::new().with_schema("dbo");
        let req = ContextRequest::new(&snapshot, Position::new(line, col), &config, &metadata);
        TextFallbackStrategy.detect(&req)
    }

    #[test]
    fn test_anchor_keywords() {
        let ctx = fallback("SELECT a FROM ", 1, 15).unwrap();
        assert_eq!(ctx.context_type, ContextType::Table);
        assert_eq!(ctx.mode, ContextMode::Fallback);

        let ctx = fallback("SELECT a FROM t WHERE ", 1, 23).unwrap();
        assert_eq!(ctx.context_type, ContextType::Column);

        let ctx = fallback("EXEC ", 1, 6).unwrap();
        assert_eq!(ctx.context_type, ContextType::Procedure);
    }

    #[test]
    fn test_qualified_alias_from_text() {
        let ctx = fallback("SELECT o. FROM sales.Orders AS o", 1, 10).unwrap();
        assert_eq!(ctx.context_type, ContextType::Column);
        assert_eq!(ctx.mode, ContextMode::Qualified);
        assert_eq!(ctx.table_ref.as_deref(), Some("o"));
        assert_eq!(ctx.schema.as_deref(), Some("sales"));
    }

    #[test]
    fn test_sources_collected() {
        let ctx = fallback("SELECT * FROM dbo.Users u JOIN #tmp t ON ", 1, 42).unwrap();
        assert_eq!(ctx.aliases["u"].name, "Users");
        assert_eq!(ctx.aliases["u"].schema.as_deref(), Some("dbo"));
        assert!(ctx.aliases["t"].is_temp);
        assert_eq!(ctx.clause.as_deref(), Some("on"));
    }

    #[test]
    fn test_text_after_semicolon_only() {
        let ctx = fallback("SELECT * FROM t; ", 1, 18).unwrap();
        assert_eq!(ctx.context_type, ContextType::Keyword);
        assert!(ctx.tables_in_scope.is_empty());
    }

    #[test]
    fn test_comment_text_ignored() {
        let ctx = fallback("/* FROM */ SELECT ", 1, 19).unwrap();
        assert_eq!(ctx.context_type, ContextType::Column);
    }

    #[test]
    fn test_unanchored_text_declines() {
        assert!(fallback("PRINT 'x' + ", 1, 13).is_none());
    }
}
