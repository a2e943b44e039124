//! The function-call recognizer (C2): decides whether a piece of SQL
//! text is a bare function/procedure call and, if so, extracts its
//! `(schema, name)`.
//!
//! Grounded directly in `internal/lineage/utils.go`'s `IdentifyFuncCall`,
//! which applies two regexes in order: a bare `SELECT`/`CALL schema.name(...)`
//! form, and a set-returning-function-in-`FROM` form. Both are
//! case-insensitive and tolerate an optional trailing semicolon.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::ResolveError;

/// `SELECT schema.name(...)` or `CALL schema.name(...)`, whole statement.
fn call_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)^\s*(select|call)\s+(\w+)\.(\w+)\s*\((.*)\)\s*(;)?\s*$").expect("valid regex")
    })
}

/// `SELECT <projection> FROM schema.name(...) [AS ...]`, set-returning call.
fn set_returning_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)^\s*select\s+(.*)\bfrom\s+(\w+)\.(\w+)\s*\((.*)\)\s*(as\s+\w+)?\s*(;)?\s*$")
            .expect("valid regex")
    })
}

/// Result of recognizing a bare function/procedure call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub schema: String,
    pub name: String,
}

impl FunctionCall {
    /// System schemas are still reported, but C5 refuses to recurse into
    /// them (spec §4.4's infinite-recursion guard).
    pub fn is_system_schema(&self) -> bool {
        self.schema.is_empty() || self.schema.eq_ignore_ascii_case("pg_catalog")
    }
}

/// Recognizes a bare function call in `text`, applying the two patterns
/// in order. Returns `ResolveError::NotAFunctionCall` when neither
/// matches, which the lineage extractor treats as "parse this as general
/// SQL instead", not as a failure.
pub fn identify_func_call(text: &str) -> Result<FunctionCall, ResolveError> {
    if let Some(caps) = call_pattern().captures(text) {
        return Ok(FunctionCall {
            schema: caps[2].to_string(),
            name: caps[3].to_string(),
        });
    }
    if let Some(caps) = set_returning_pattern().captures(text) {
        return Ok(FunctionCall {
            schema: caps[2].to_string(),
            name: caps[3].to_string(),
        });
    }
    Err(ResolveError::NotAFunctionCall)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_select_call_form() {
        let call = identify_func_call("select dw.refresh_orders()").unwrap();
        assert_eq!(call.schema, "dw");
        assert_eq!(call.name, "refresh_orders");
    }

    #[test]
    fn recognizes_call_statement_form() {
        let call = identify_func_call("CALL dw.refresh_orders();").unwrap();
        assert_eq!(call.schema, "dw");
        assert_eq!(call.name, "refresh_orders");
    }

    #[test]
    fn recognizes_set_returning_function_form() {
        let call = identify_func_call("select * from dw.list_orders(1, 2) as t").unwrap();
        assert_eq!(call.schema, "dw");
        assert_eq!(call.name, "list_orders");
    }

    #[test]
    fn case_insensitive_and_optional_semicolon() {
        assert!(identify_func_call("SELECT dw.F()").is_ok());
        assert!(identify_func_call("select dw.f();").is_ok());
    }

    #[test]
    fn rejects_plain_select_from_table() {
        assert_eq!(
            identify_func_call("select * from orders"),
            Err(ResolveError::NotAFunctionCall)
        );
    }

    #[test]
    fn system_schema_is_flagged_for_recursion_refusal() {
        let call = FunctionCall {
            schema: "pg_catalog".into(),
            name: "now".into(),
        };
        assert!(call.is_system_schema());
        let call2 = FunctionCall {
            schema: "dw".into(),
            name: "f".into(),
        };
        assert!(!call2.is_system_schema());
    }
}
