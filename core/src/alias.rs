//! The alias environment (C7): a per-statement scoped mapping from an
//! alias string to the relation it names, shared read/write by the
//! lineage extractor and the join extractor while they walk the same
//! statement tree.
//!
//! Grounded in `internal/erd/sqlparser.go`'s `aliasMap` threading: a
//! single mutable map is passed down through `parseFromClause` /
//! `parseJoinClause` / `parseWithClause` and consulted later by
//! `parseWhereClause`, so that a `WHERE` clause sees every alias
//! registered by the `FROM` clause that precedes it in the same
//! statement. Bindings never cross into a sibling statement (invariant
//! 5, spec §3): each top-level statement (and each UDF sub-statement)
//! gets its own fresh `AliasEnvironment`.

use std::collections::HashMap;

/// A relation an alias resolves to: schema may be empty for CTEs and
/// subqueries, which are opaque for lineage purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTarget {
    pub schema: String,
    pub relation: String,
    /// The alias string itself, kept alongside the target since a few
    /// callers (diagnostics) want to report the original spelling.
    pub alias: String,
}

/// Single-writer alias table scoped to one statement.
#[derive(Debug, Clone, Default)]
pub struct AliasEnvironment {
    bindings: HashMap<String, AliasTarget>,
}

impl AliasEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a real table/view reference. `alias` should be the
    /// explicit `AS` alias when present, otherwise the bare relation name,
    /// matching `parseRangeVar`'s `alias = aliasname OR relname` fallback.
    pub fn bind_table(&mut self, alias: &str, schema: &str, relation: &str) {
        self.bindings.insert(
            alias.to_string(),
            AliasTarget {
                schema: schema.to_string(),
                relation: relation.to_string(),
                alias: alias.to_string(),
            },
        );
    }

    /// Registers a CTE or subquery alias as an opaque relation (empty
    /// schema): the alias resolves to itself as a bare name, since its
    /// underlying columns are not known without re-deriving the CTE's
    /// own projection.
    pub fn bind_opaque(&mut self, alias: &str) {
        self.bindings.insert(
            alias.to_string(),
            AliasTarget {
                schema: String::new(),
                relation: alias.to_string(),
                alias: alias.to_string(),
            },
        );
    }

    pub fn resolve(&self, alias: &str) -> Option<&AliasTarget> {
        self.bindings.get(alias)
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.bindings.contains_key(alias)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
