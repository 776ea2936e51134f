//! Context detection from the parsed chunk and its clause spans

use tracing::trace;

use super::local_scan::{comparison_lhs, in_on_clause, insert_columns_open, values_position};
use super::{Context, ContextMode, ContextRequest, ContextStrategy, ContextType};
use crate::model::{ScopeRef, StatementChunk, StatementKind};
use crate::parser::{clause_base, normalize_key};
use crate::scope::{resolve_qualifier, visible_cte, visible_tables, Resolved};
use crate::tokenizer::{Token, TokenKind};

/// Primary strategy: chunk, innermost scope, clause.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParserStrategy;

/// What a clause expects, before sub-context refinement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expects {
    Column,
    Table,
    Procedure,
    Database,
    Keyword,
}

fn clause_expects(base: &str) -> Option<Expects> {
    let expects = match base {
        "select" | "where" | "group_by" | "having" | "order_by" | "set" | "on"
        | "insert_columns" | "values" | "output" | "when" => Expects::Column,
        "from" | "join" | "into" | "update_target" | "delete_target" | "merge_target"
        | "using" | "truncate_target" => Expects::Table,
        "exec" => Expects::Procedure,
        "use" => Expects::Database,
        "option" => Expects::Keyword,
        _ => return None,
    };
    Some(expects)
}

impl ContextStrategy for ParserStrategy {
    fn name(&self) -> &'static str {
        "parser"
    }

    fn detect(&self, req: &ContextRequest<'_>) -> Option<Context> {
        let snapshot = req.snapshot;
        let pos = req.position;
        let (chunk_index, chunk) = snapshot.chunk_at_position(pos, req.lookahead_lines)?;

        let mut scope = snapshot.subquery_at_position(chunk, pos);
        let clause = match snapshot.clause_at_position(chunk, ScopeRef::from(scope), pos) {
            Some((key, _)) => key,
            None => {
                scope = None;
                snapshot.clause_at_position(chunk, ScopeRef::Statement, pos)?.0
            }
        };
        let at = ScopeRef::from(scope);
        let expects = clause_expects(clause_base(clause))?;
        trace!(chunk = chunk_index, clause, ?scope, "parser context");

        let tokens = typed_tokens(req, chunk);
        let mut ctx = Context::for_request(req, ContextType::Unknown, ContextMode::Normal);
        ctx.clause = Some(clause.to_string());
        ctx.chunk_index = Some(chunk_index);
        ctx.scope = scope;
        fill_scope(&mut ctx, chunk, at);
        if let StatementKind::Insert { target } | StatementKind::Merge { target, .. } = &chunk.kind
        {
            ctx.insert_target = target.clone();
        }

        match req.cursor.trigger {
            Some('@') => ctx.context_type = ContextType::Parameter,
            Some('#') => ctx.context_type = ContextType::Table,
            Some('.') => qualified(&mut ctx, req, chunk, at, expects),
            _ => unqualified(&mut ctx, req, chunk, expects, tokens),
        }
        Some(ctx)
    }
}

/// Tokens of the chunk before the cursor, without the word being typed.
fn typed_tokens<'a>(req: &ContextRequest<'a>, chunk: &StatementChunk) -> &'a [Token] {
    let before = req.snapshot.tokens_before(req.position);
    let first = before.partition_point(|t| t.start() < chunk.start);
    let mut tokens = &before[first..];
    if !req.cursor.prefix.is_empty() {
        if let Some((last, rest)) = tokens.split_last() {
            if last.end() == req.position {
                tokens = rest;
            }
        }
    }
    tokens
}

fn fill_scope(ctx: &mut Context, chunk: &StatementChunk, at: ScopeRef) {
    ctx.tables_in_scope = visible_tables(chunk, at).into_iter().cloned().collect();

    let mut chain = Vec::new();
    let mut current = Some(at);
    while let Some(scope) = current {
        chain.push(scope);
        current = chunk.parent_of(scope);
    }
    // Outermost first so inner aliases shadow outer ones
    for scope in chain.into_iter().rev() {
        if let Some(aliases) = chunk.aliases_of(scope) {
            ctx.aliases
                .extend(aliases.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }

    for id in &chunk.ctes {
        let Some(node) = chunk.scope(*id) else {
            continue;
        };
        let Some(name) = node.cte_name() else {
            continue;
        };
        if visible_cte(chunk, at, name) == Some(*id) {
            ctx.ctes.insert(normalize_key(name), node.column_names());
        }
    }
}

fn qualified(
    ctx: &mut Context,
    req: &ContextRequest<'_>,
    chunk: &StatementChunk,
    at: ScopeRef,
    expects: Expects,
) {
    let parts = &req.cursor.qualifier;
    let Some(last) = parts.last() else {
        return;
    };
    let owner = parts.len().checked_sub(2).map(|i| parts[i].clone());
    ctx.mode = ContextMode::Qualified;

    match expects {
        Expects::Table | Expects::Procedure => {
            ctx.context_type = if expects == Expects::Table {
                ContextType::Table
            } else {
                ContextType::Procedure
            };
            ctx.schema = Some(last.clone());
            ctx.database = owner;
        }
        Expects::Database => ctx.context_type = ContextType::Unknown,
        Expects::Column | Expects::Keyword => {
            let resolved = resolve_qualifier(chunk, at, last);
            if resolved == Resolved::Unresolved
                && !last.starts_with('#')
                && !last.starts_with('@')
                && req.metadata.is_schema(last)
            {
                ctx.context_type = ContextType::Table;
                ctx.schema = Some(last.clone());
                ctx.database = owner;
                return;
            }
            ctx.context_type = ContextType::Column;
            ctx.table_ref = Some(last.clone());
            ctx.schema = match resolved {
                Resolved::Table(table) => table.schema.or(owner),
                _ => owner,
            };
            if parts.len() >= 3 {
                ctx.database = Some(parts[parts.len() - 3].clone());
            }
        }
    }
}

fn unqualified(
    ctx: &mut Context,
    req: &ContextRequest<'_>,
    chunk: &StatementChunk,
    expects: Expects,
    tokens: &[Token],
) {
    let base = ctx.clause.as_deref().map(clause_base).unwrap_or_default().to_string();
    ctx.context_type = match expects {
        Expects::Table if typing_alias(tokens) => ContextType::Unknown,
        Expects::Table if ends_with_name(tokens) => ContextType::Keyword,
        Expects::Table => ContextType::Table,
        Expects::Procedure if procedure_written(tokens) => ContextType::Parameter,
        Expects::Procedure => ContextType::Procedure,
        Expects::Database => ContextType::Database,
        Expects::Keyword => ContextType::Keyword,
        Expects::Column => return column_position(ctx, req, chunk, &base, tokens),
    };
}

fn column_position(
    ctx: &mut Context,
    req: &ContextRequest<'_>,
    chunk: &StatementChunk,
    base: &str,
    tokens: &[Token],
) {
    match base {
        "insert_columns" => {
            if insert_columns_open(tokens) {
                ctx.context_type = ContextType::Column;
                ctx.mode = ContextMode::InsertColumns;
                ctx.table_ref = ctx.insert_target.as_ref().map(|t| t.name.clone());
            } else {
                ctx.context_type = ContextType::Keyword;
            }
        }
        "values" => match values_position(tokens) {
            Some(index) => {
                ctx.context_type = ContextType::Column;
                ctx.mode = ContextMode::ValuesList;
                ctx.values_position = Some(index);
                ctx.values_column = chunk.insert_columns.get(index).cloned();
            }
            None => ctx.context_type = ContextType::Keyword,
        },
        _ => {
            if typing_alias(tokens) {
                ctx.context_type = ContextType::Unknown;
                return;
            }
            if ends_expression(tokens) {
                ctx.context_type = ContextType::Keyword;
                return;
            }
            ctx.context_type = ContextType::Column;
            if base == "on" || in_on_clause(tokens) {
                ctx.mode = ContextMode::OnClause;
            }
            if matches!(base, "where" | "having" | "on" | "when" | "join") {
                if let Some(lhs) = comparison_lhs(req.cursor.before_prefix()) {
                    ctx.mode = ContextMode::Comparison;
                    ctx.comparison_lhs = Some(lhs);
                }
            }
        }
    }
}

/// `... AS |`: the user is naming something.
fn typing_alias(tokens: &[Token]) -> bool {
    tokens.last().is_some_and(|t| t.is_keyword("AS"))
}

/// The previous token completes a table source (`FROM Users |`).
fn ends_with_name(tokens: &[Token]) -> bool {
    tokens.last().is_some_and(|t| {
        t.is_alias_candidate() || t.kind == TokenKind::ParenClose
    })
}

/// The previous token completes an operand (`WHERE a = 1 |`).
fn ends_expression(tokens: &[Token]) -> bool {
    let Some((last, rest)) = tokens.split_last() else {
        return false;
    };
    match last.kind {
        TokenKind::Identifier
        | TokenKind::BracketedIdentifier
        | TokenKind::String
        | TokenKind::Star => true,
        TokenKind::Number => !rest.last().is_some_and(|t| t.is_keyword("TOP")),
        TokenKind::ParenClose => {
            let open = super::local_scan::unclosed_paren(rest);
            !open
                .and_then(|i| i.checked_sub(1))
                .and_then(|i| rest.get(i))
                .is_some_and(|t| t.is_keyword("TOP"))
        }
        _ => false,
    }
}

/// `EXEC proc |`: the procedure name is done, arguments follow.
fn procedure_written(tokens: &[Token]) -> bool {
    let Some(exec) = tokens
        .iter()
        .rposition(|t| t.is_any_keyword(&["EXEC", "EXECUTE"]))
    else {
        return false;
    };
    let mut rest = &tokens[exec + 1..];
    // `EXEC @ret = proc`
    if rest.len() >= 3
        && rest[0].kind == TokenKind::AtSign
        && rest[2].is_operator("=")
    {
        rest = &rest[3..];
    }
    !rest.is_empty() && rest.last().is_some_and(|t| t.kind != TokenKind::Dot)
}
