//! The parse adapter (C1): the only component that knows the parser
//! vendor. Presents SQL text as a normalized `sqlparser` statement list,
//! and PL/pgSQL function bodies as a list of classified sub-statements.
//!
//! The analyzer targets PostgreSQL/Greenplum exclusively, so unlike the
//! teacher's `parse_sql_with_dialect` (which dispatches across four
//! dialects with a Generic-to-Postgres fallback), this adapter always
//! constructs `PostgreSqlDialect`. `sqlparser` has no PL/pgSQL grammar;
//! `parse_plpgsql_body` reproduces the Go original's
//! `PLPGSQL_BLACKLIST_STMTS` classification (`pg_query_go`'s JSON AST
//! statement kinds) with a lightweight statement split and keyword
//! classifier instead of a real PL/pgSQL parser.

use sqlparser::ast::Statement;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::error::ParseError;

/// Parses a single SQL text (possibly several `;`-separated statements)
/// using the Postgres dialect.
pub fn parse_sql(text: &str) -> Result<Vec<Statement>, ParseError> {
    Parser::parse_sql(&PostgreSqlDialect {}, text).map_err(ParseError::from)
}

/// The kind of PL/pgSQL statement a body line was classified as.
///
/// Only `ExecSql` and `DynExecute` carry embedded SQL the lineage
/// extractor processes (§4.1); the rest are recognized but ignored by
/// policy because they cannot introduce table dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlpgsqlStatementKind {
    ExecSql,
    DynExecute,
    Assign,
    Raise,
    If,
    Perform,
}

/// One classified statement inside a PL/pgSQL function body.
#[derive(Debug, Clone)]
pub struct PlpgsqlStatement {
    pub kind: PlpgsqlStatementKind,
    /// The raw statement text, with its leading keyword and trailing `;`
    /// stripped for `ExecSql`/`DynExecute` so it is ready for `parse_sql`.
    pub text: String,
}

/// Splits PL/pgSQL source on top-level semicolons (outside of string
/// literals, `$$`/`$tag$` dollar-quoting, and parens) and classifies each
/// resulting statement by its leading keyword.
pub fn parse_plpgsql_body(text: &str) -> Result<Vec<PlpgsqlStatement>, ParseError> {
    split_top_level_statements(text)
        .into_iter()
        .map(|raw| classify_statement(&raw))
        .collect()
}

fn classify_statement(raw: &str) -> Result<PlpgsqlStatement, ParseError> {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();

    if lower.starts_with("execute ") {
        // EXECUTE 'sql text' [USING ...] — dynamic SQL (PLpgSQL_stmt_dynexecute).
        let body = extract_dynamic_sql_literal(trimmed).unwrap_or_default();
        return Ok(PlpgsqlStatement {
            kind: PlpgsqlStatementKind::DynExecute,
            text: body,
        });
    }
    if lower.starts_with("raise") {
        return Ok(PlpgsqlStatement {
            kind: PlpgsqlStatementKind::Raise,
            text: trimmed.to_string(),
        });
    }
    if lower.starts_with("if ") || lower == "if" {
        return Ok(PlpgsqlStatement {
            kind: PlpgsqlStatementKind::If,
            text: trimmed.to_string(),
        });
    }
    if lower.starts_with("perform ") {
        return Ok(PlpgsqlStatement {
            kind: PlpgsqlStatementKind::Perform,
            text: trimmed.to_string(),
        });
    }
    if is_assignment(trimmed) {
        return Ok(PlpgsqlStatement {
            kind: PlpgsqlStatementKind::Assign,
            text: trimmed.to_string(),
        });
    }

    // Everything else (SELECT/INSERT/UPDATE/DELETE/CREATE/WITH/...) is
    // ordinary embedded SQL (PLpgSQL_stmt_execsql).
    Ok(PlpgsqlStatement {
        kind: PlpgsqlStatementKind::ExecSql,
        text: trimmed.to_string(),
    })
}

/// A crude `name := expr` detector: a leading identifier followed by `:=`
/// before any other statement-introducing keyword appears.
fn is_assignment(stmt: &str) -> bool {
    if let Some(pos) = stmt.find(":=") {
        let head = &stmt[..pos];
        !head.is_empty() && head.chars().all(|c| c.is_alphanumeric() || c == '_' || c.is_whitespace())
    } else {
        false
    }
}

/// Pulls the string literal out of `EXECUTE '...'`, unescaping doubled
/// single quotes. Returns `None` for `EXECUTE` forms built from a format
/// function call rather than a literal (too complex to reconstruct
/// without a real PL/pgSQL parser; matches the Go original's comment that
/// dynamic EXECUTE is only partially supported).
fn extract_dynamic_sql_literal(stmt: &str) -> Option<String> {
    let after_execute = stmt.get(8..)?.trim_start();
    if !after_execute.starts_with('\'') {
        return None;
    }
    let mut chars = after_execute[1..].chars();
    let mut out = String::new();
    while let Some(c) = chars.next() {
        if c == '\'' {
            if let Some('\'') = chars.clone().next() {
                out.push('\'');
                chars.next();
                continue;
            }
            return Some(out);
        }
        out.push(c);
    }
    None
}

/// Splits `text` on top-level `;`, respecting single/double-quoted
/// strings and `$tag$ ... $tag$` dollar-quoting so a semicolon embedded
/// in a quoted function body does not end the statement early. Used both
/// to break a PL/pgSQL body into classifiable statements and, by the
/// lineage extractor, to recover the raw text of each top-level SQL
/// statement so C2 can be applied to it before falling back to a normal
/// AST parse.
pub fn split_top_level_statements(text: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut chars = text.char_indices().peekable();
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut dollar_tag: Option<String> = None;

    while let Some((idx, ch)) = chars.next() {
        if let Some(tag) = &dollar_tag {
            current.push(ch);
            if ch == '$' && text[idx..].starts_with(tag.as_str()) {
                for _ in 1..tag.len() {
                    if let Some((_, c)) = chars.next() {
                        current.push(c);
                    }
                }
                dollar_tag = None;
            }
            continue;
        }
        if in_single_quote {
            current.push(ch);
            if ch == '\'' {
                in_single_quote = false;
            }
            continue;
        }
        if in_double_quote {
            current.push(ch);
            if ch == '"' {
                in_double_quote = false;
            }
            continue;
        }

        match ch {
            '\'' => {
                in_single_quote = true;
                current.push(ch);
            }
            '"' => {
                in_double_quote = true;
                current.push(ch);
            }
            '$' => {
                if let Some(tag) = find_dollar_tag(&text[idx..]) {
                    current.push_str(&tag);
                    for _ in 1..tag.len() {
                        chars.next();
                    }
                    dollar_tag = Some(tag);
                } else {
                    current.push(ch);
                }
            }
            ';' => {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    statements.push(trimmed.to_string());
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
    statements
}

/// Recognizes a `$$` or `$tag$` dollar-quote opener at the start of `s`.
fn find_dollar_tag(s: &str) -> Option<String> {
    let mut end = None;
    for (i, c) in s.char_indices().skip(1) {
        if c == '$' {
            end = Some(i);
            break;
        }
        if !(c.is_alphanumeric() || c == '_') {
            return None;
        }
    }
    end.map(|e| s[..=e].to_string())
}
