//! Error types for SQL parsing, graph mutation, and UDF/function resolution.
//!
//! # Error Handling Strategy
//!
//! The crate separates fatal parse failures from recoverable analysis
//! anomalies, the same split the source system makes between a hard
//! `pg_query.Parse` error and a logged-but-tolerated `DependOn` failure:
//!
//! - [`ParseError`]: stops analysis of the one statement/UDF body that
//!   failed to parse. Recoverable at the caller (e.g. skip this row from
//!   `pg_stat_statements` and move to the next).
//! - [`GraphError`]: returned by [`crate::graph::Graph::depend_on`] when an
//!   edge would be self-referential or would close a cycle. Never fatal;
//!   the caller logs it and continues (§7 of the design doc).
//! - [`ResolveError`]: returned by the function-call recognizer and the
//!   UDF resolver. `NotAFunctionCall` is not really an error for the
//!   lineage extractor — it just means "parse this as general SQL".

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Error encountered while parsing SQL text or a PL/pgSQL function body.
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Human-readable message, usually the underlying `sqlparser` message.
    pub message: String,
    /// Byte/line position, if the underlying message encoded one.
    pub position: Option<Position>,
}

/// Line/column position of a parse error (1-indexed, matching `sqlparser`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position: None,
        }
    }

    /// Extracts `Line: X, Column: Y` from a `sqlparser` error message, if present.
    fn parse_position_from_message(message: &str) -> Option<Position> {
        static POSITION_REGEX: OnceLock<Regex> = OnceLock::new();
        let re = POSITION_REGEX
            .get_or_init(|| Regex::new(r"Line:\s*(\d+)\s*,\s*Column:\s*(\d+)").expect("valid regex"));

        re.captures(message).and_then(|caps| {
            let line: usize = caps.get(1)?.as_str().parse().ok()?;
            let column: usize = caps.get(2)?.as_str().parse().ok()?;
            Some(Position { line, column })
        })
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error")?;
        if let Some(pos) = self.position {
            write!(f, " at line {}, column {}", pos.line, pos.column)?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for ParseError {}

impl From<sqlparser::parser::ParserError> for ParseError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        let message = err.to_string();
        let position = Self::parse_position_from_message(&message);
        Self { message, position }
    }
}

/// Anomaly raised while mutating the [`crate::graph::Graph`].
///
/// Neither variant is fatal: callers are expected to log it (spec §7) and
/// continue, since `Graph::contract` itself relies on `CircularDependency`
/// being tolerated when contraction re-derives an edge that already
/// exists in reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("a node cannot depend on itself")]
    SelfDependency,
    #[error("adding this edge would create a cycle")]
    CircularDependency,
}

/// Failure resolving a function call or UDF body (C2/C5).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The text is not a bare function/procedure call (C2). Not an error
    /// for the lineage extractor: it just means "parse as general SQL".
    #[error("text is not a function call")]
    NotAFunctionCall,
    /// No matching row in the catalog for `(schema, name)`.
    #[error("function {schema}.{name} not found in catalog")]
    NotFound { schema: String, name: String },
    /// The catalog connection or query itself failed.
    #[error("catalog error: {0}")]
    CatalogError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_extracted_from_sqlparser_style_message() {
        let msg = "Expected SELECT, found 'INSERT' at Line: 1, Column: 5";
        let pos = ParseError::parse_position_from_message(msg);
        assert_eq!(pos, Some(Position { line: 1, column: 5 }));
    }

    #[test]
    fn position_absent_when_not_encoded() {
        assert_eq!(ParseError::parse_position_from_message("bad token"), None);
    }

    #[test]
    fn display_includes_position_when_present() {
        let err = ParseError {
            message: "unexpected EOF".into(),
            position: Some(Position { line: 3, column: 9 }),
        };
        assert_eq!(err.to_string(), "parse error at line 3, column 9: unexpected EOF");
    }

    #[test]
    fn display_without_position() {
        let err = ParseError::new("bad syntax");
        assert_eq!(err.to_string(), "parse error: bad syntax");
    }

    #[test]
    fn graph_errors_are_not_fatal_types() {
        let _: &dyn std::error::Error = &GraphError::SelfDependency;
        let _: &dyn std::error::Error = &GraphError::CircularDependency;
    }

    #[test]
    fn resolve_error_not_found_message() {
        let err = ResolveError::NotFound {
            schema: "dw".into(),
            name: "f".into(),
        };
        assert_eq!(err.to_string(), "function dw.f not found in catalog");
    }
}
