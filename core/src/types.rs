//! Small shared value types used across the graph, lineage, and join
//! extractors: column references, join-type tags, and the identifier
//! splitting helpers every component needs to turn a `schema.table`
//! string (as produced by `sqlparser`'s `ObjectName::to_string`) back
//! into its parts without losing quoting.

use serde::{Deserialize, Serialize};

/// A reference to a single column of a single relation, as it appeared
/// in the source SQL (schema may be empty for CTEs/subquery aliases).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub schema: String,
    pub relation: String,
    pub field: String,
}

impl ColumnRef {
    pub fn new(schema: impl Into<String>, relation: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            relation: relation.into(),
            field: field.into(),
        }
    }

    /// Display form used for diagnostics and for the canonical serialization
    /// a [`crate::join::JoinRelationship`] hashes.
    pub fn qualified(&self) -> String {
        if self.schema.is_empty() {
            format!("{}.{}", self.relation, self.field)
        } else {
            format!("{}.{}.{}", self.schema, self.relation, self.field)
        }
    }
}

/// The kind of SQL join a [`crate::join::JoinRelationship`] was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    /// Assigned to `col IN (SELECT col FROM tbl)` relationships (spec §4.6).
    Semi,
}

impl JoinType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::Full => "FULL",
            JoinType::Semi => "SEMI",
        }
    }
}

/// Splits a possibly-qualified, possibly-quoted identifier string (as
/// returned by `ObjectName::to_string()`) into its dot-separated parts,
/// without splitting inside quoted segments. Mirrors the identifier
/// splitting every other qualified-name handling component in the
/// PostgreSQL ecosystem needs, since `sqlparser`'s `Display` impl just
/// joins parts with `.` and re-quotes them.
pub fn split_qualified_identifiers(name: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = name.chars().peekable();
    let mut active_quote: Option<char> = None;

    while let Some(ch) = chars.next() {
        if let Some(q) = active_quote {
            current.push(ch);
            if ch == q {
                if let Some(next) = chars.peek() {
                    if *next == q {
                        current.push(chars.next().unwrap());
                        continue;
                    }
                }
                active_quote = None;
            }
            continue;
        }

        match ch {
            '"' => {
                active_quote = Some('"');
                current.push(ch);
            }
            '.' => {
                if !current.is_empty() {
                    parts.push(current.clone());
                    current.clear();
                }
            }
            _ => current.push(ch),
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }

    if parts.is_empty() && !name.is_empty() {
        vec![name.to_string()]
    } else {
        parts
    }
}

/// Strips surrounding double quotes from a single identifier part.
pub fn unquote_identifier(part: &str) -> String {
    let trimmed = part.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].replace("\"\"", "\"")
    } else {
        trimmed.to_string()
    }
}

/// Splits a qualified name into `(schema, name)`, where `schema` is empty
/// for a bare (unqualified) identifier. Three-or-more-part names (e.g.
/// `catalog.schema.table`) fold everything but the last part into the
/// schema slot, joined back with `.`, since this analyzer has no notion
/// of a catalog distinct from schema (spec §3).
pub fn split_schema_and_name(qualified: &str) -> (String, String) {
    let parts = split_qualified_identifiers(qualified);
    match parts.len() {
        0 => (String::new(), String::new()),
        1 => (String::new(), unquote_identifier(&parts[0])),
        _ => {
            let name = unquote_identifier(parts.last().unwrap());
            let schema = parts[..parts.len() - 1]
                .iter()
                .map(|p| unquote_identifier(p))
                .collect::<Vec<_>>()
                .join(".");
            (schema, name)
        }
    }
}
