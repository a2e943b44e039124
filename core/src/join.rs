//! The join-relationship extractor (C6): walks a statement tree looking
//! for equality predicates between two qualified columns — in a JOIN's
//! `ON` clause or a plain `WHERE` conjunct/disjunct — plus `col IN
//! (SELECT col FROM tbl)` semi-join predicates, and reports each as a
//! [`JoinRelationship`].
//!
//! Grounded in `internal/erd/sqlparser.go`'s `parseJoinClause` /
//! `parseQuals` / `parseBoolExpr` / `parseAExpr` / `parseAnySubLink`.
//! Two deliberate departures from that source, both recorded in
//! `DESIGN.md`: a relationship is dropped outright (never emitted with
//! one side unset) when either column fails to resolve through the
//! alias environment, and a bare top-level `WHERE a.x = b.y` (not
//! wrapped in an `AND`/`OR`) is recognized rather than silently missed.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use sqlparser::ast::{
    BinaryOperator, Expr, Join, JoinConstraint, JoinOperator, Query, Select, SelectItem, SetExpr,
    Statement, TableFactor, TableWithJoins,
};

use crate::alias::AliasEnvironment;
use crate::error::ParseError;
use crate::parser::parse_sql;
use crate::types::{split_schema_and_name, ColumnRef, JoinType};

/// A single discovered relationship between two columns, as implied by
/// an equality predicate or an `IN (SELECT ...)` semi-join.
///
/// The component stays pure and does not filter on `schema` emptiness;
/// whether an opaque (CTE/subquery) endpoint is worth keeping is a
/// consumer-level policy decision (spec §4.6).
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct JoinRelationship {
    pub source: ColumnRef,
    pub target: ColumnRef,
    pub join_type: JoinType,
}

impl JoinRelationship {
    /// A stable identity for this relationship, used to de-duplicate
    /// relationships discovered more than once (e.g. the same join
    /// appearing in two statements). Grounded in the teacher's
    /// `helpers/id.rs::generate_edge_id` pattern: a `DefaultHasher` over
    /// the canonical serialization, not Go's MD5-of-JSON.
    pub fn canonical_id(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.source.qualified().hash(&mut hasher);
        self.target.qualified().hash(&mut hasher);
        self.join_type.hash(&mut hasher);
        hasher.finish()
    }
}

/// Walks statement trees collecting [`JoinRelationship`]s.
pub struct JoinExtractor;

impl JoinExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Parses `sql_text` and extracts relationships from every top-level
    /// statement, keyed by [`JoinRelationship::canonical_id`] so repeats
    /// collapse. A parse failure on the text is fatal, matching the
    /// lineage extractor's top-level behavior (spec §4.4/§7).
    pub fn extract(&self, sql_text: &str) -> Result<HashMap<u64, JoinRelationship>, ParseError> {
        let statements = parse_sql(sql_text)?;
        let mut found = HashMap::new();
        for stmt in &statements {
            for rel in self.extract_from_statement(stmt) {
                found.insert(rel.canonical_id(), rel);
            }
        }
        Ok(found)
    }

    /// Lower-level primitive over an already-parsed statement list, so a
    /// caller that fetched a UDF body independently (C5) can run the
    /// same extraction over it without re-parsing through [`Self::extract`],
    /// mirroring the Go original's separate `Parse`/`ParseUDF` entry points.
    pub fn extract_from_statements(&self, statements: &[Statement]) -> Vec<JoinRelationship> {
        statements.iter().flat_map(|s| self.extract_from_statement(s)).collect()
    }

    fn extract_from_statement(&self, stmt: &Statement) -> Vec<JoinRelationship> {
        // Scope matches Go's `erd.Parse`: DELETE/UPDATE bodies are not
        // walked for join relationships, only query-shaped statements.
        match stmt {
            Statement::Query(query) => self.extract_from_query(query),
            Statement::CreateTable(create) => create
                .query
                .as_ref()
                .map(|q| self.extract_from_query(q))
                .unwrap_or_default(),
            Statement::Insert(insert) => insert
                .source
                .as_ref()
                .map(|q| self.extract_from_query(q))
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    fn extract_from_query(&self, query: &Query) -> Vec<JoinRelationship> {
        let mut alias_env = AliasEnvironment::new();
        self.extract_from_query_into(query, &mut alias_env)
    }

    fn extract_from_query_into(&self, query: &Query, alias_env: &mut AliasEnvironment) -> Vec<JoinRelationship> {
        let mut found = Vec::new();

        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                // The CTE's own body is an independent scope; its alias is
                // registered into the outer environment only afterward,
                // matching `parseWithClause`'s timing.
                found.extend(self.extract_from_query(&cte.query));
                alias_env.bind_opaque(&cte.alias.name.value);
            }
        }

        found.extend(self.extract_from_set_expr(&query.body, alias_env));
        found
    }

    fn extract_from_set_expr(&self, expr: &SetExpr, alias_env: &mut AliasEnvironment) -> Vec<JoinRelationship> {
        match expr {
            SetExpr::Select(select) => self.extract_from_select(select, alias_env),
            SetExpr::Query(query) => self.extract_from_query(query),
            SetExpr::SetOperation { left, right, .. } => {
                let mut found = self.extract_from_set_expr(left, alias_env);
                found.extend(self.extract_from_set_expr(right, alias_env));
                found
            }
            _ => Vec::new(),
        }
    }

    fn extract_from_select(&self, select: &Select, alias_env: &mut AliasEnvironment) -> Vec<JoinRelationship> {
        let mut found = Vec::new();
        for twj in &select.from {
            found.extend(self.extract_from_table_with_joins(twj, alias_env));
        }
        if let Some(selection) = &select.selection {
            found.extend(collect_equalities(selection, JoinType::Inner, alias_env));
        }
        found
    }

    fn extract_from_table_with_joins(
        &self,
        twj: &TableWithJoins,
        alias_env: &mut AliasEnvironment,
    ) -> Vec<JoinRelationship> {
        let mut found = self.register_and_recurse_table_factor(&twj.relation, alias_env);
        for join in &twj.joins {
            found.extend(self.register_and_recurse_table_factor(&join.relation, alias_env));
            found.extend(self.extract_from_join_constraint(join, alias_env));
        }
        found
    }

    fn register_and_recurse_table_factor(
        &self,
        tf: &TableFactor,
        alias_env: &mut AliasEnvironment,
    ) -> Vec<JoinRelationship> {
        match tf {
            TableFactor::Table { name, alias, .. } => {
                let (schema, rel_name) = split_schema_and_name(&name.to_string());
                let alias_str = alias
                    .as_ref()
                    .map(|a| a.name.value.clone())
                    .unwrap_or_else(|| rel_name.clone());
                alias_env.bind_table(&alias_str, &schema, &rel_name);
                Vec::new()
            }
            TableFactor::Derived { subquery, alias, .. } => {
                let found = self.extract_from_query(subquery);
                if let Some(alias) = alias {
                    alias_env.bind_opaque(&alias.name.value);
                }
                found
            }
            TableFactor::NestedJoin { table_with_joins, .. } => {
                self.extract_from_table_with_joins(table_with_joins, alias_env)
            }
            _ => Vec::new(),
        }
    }

    fn extract_from_join_constraint(&self, join: &Join, alias_env: &AliasEnvironment) -> Vec<JoinRelationship> {
        let Some(join_type) = join_operator_type(&join.join_operator) else {
            return Vec::new();
        };
        let Some(constraint) = join_constraint_of(&join.join_operator) else {
            return Vec::new();
        };
        match constraint {
            // `USING`/`NATURAL` name columns implicitly rather than via an
            // equality expression; extracting them would need the source
            // relations' column lists, which this component does not
            // resolve (matches `parseJoinClause`'s ON-only handling).
            JoinConstraint::Using(_) | JoinConstraint::Natural | JoinConstraint::None => Vec::new(),
            JoinConstraint::On(expr) => collect_equalities(expr, join_type, alias_env),
        }
    }
}

impl Default for JoinExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn join_operator_type(op: &JoinOperator) -> Option<JoinType> {
    use JoinOperator::*;
    match op {
        Join(_) | Inner(_) => Some(JoinType::Inner),
        Left(_) | LeftOuter(_) => Some(JoinType::Left),
        Right(_) | RightOuter(_) => Some(JoinType::Right),
        FullOuter(_) => Some(JoinType::Full),
        // CROSS/SEMI/ANTI/AS OF/APPLY joins either carry no predicate or
        // fall outside the equality-predicate model this component covers.
        _ => None,
    }
}

fn join_constraint_of(op: &JoinOperator) -> Option<&JoinConstraint> {
    use JoinOperator::*;
    match op {
        Join(c) | Inner(c) | Left(c) | LeftOuter(c) | Right(c) | RightOuter(c) | FullOuter(c) => Some(c),
        _ => None,
    }
}

/// Descends through `AND`/`OR`/parens collecting each equality conjunct
/// or disjunct as an independent relationship (spec §4.6: boolean
/// structure is not preserved), and surfaces `IN (SELECT ...)` semi-join
/// predicates found along the way. Shared between ON-clause and WHERE
/// handling, since both call sites apply the same descent rule.
fn collect_equalities(expr: &Expr, default_join_type: JoinType, alias_env: &AliasEnvironment) -> Vec<JoinRelationship> {
    match expr {
        Expr::Nested(inner) => collect_equalities(inner, default_join_type, alias_env),
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And | BinaryOperator::Or,
            right,
        } => {
            let mut found = collect_equalities(left, default_join_type, alias_env);
            found.extend(collect_equalities(right, default_join_type, alias_env));
            found
        }
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Eq,
            right,
        } => build_equality(left, right, default_join_type, alias_env).into_iter().collect(),
        Expr::InSubquery {
            expr: lhs,
            subquery,
            negated: false,
        } => build_semi_join(lhs, subquery, alias_env).into_iter().collect(),
        _ => Vec::new(),
    }
}

/// Resolves both sides of `left = right` to qualified columns through
/// `alias_env`. Drops the whole relationship — rather than Go's
/// `parseAExpr`, which can emit one with a `nil` side — if either side
/// is not a two-(or more-)part column reference on a registered alias,
/// or if either side is a literal, list, function call, or other
/// expression (spec §4.6's "dropped, not fatal" rule).
fn build_equality(left: &Expr, right: &Expr, join_type: JoinType, alias_env: &AliasEnvironment) -> Option<JoinRelationship> {
    let source = resolve_column_ref(left, alias_env)?;
    let target = resolve_column_ref(right, alias_env)?;
    Some(JoinRelationship { source, target, join_type })
}

fn resolve_column_ref(expr: &Expr, alias_env: &AliasEnvironment) -> Option<ColumnRef> {
    let Expr::CompoundIdentifier(parts) = expr else {
        // A bare unqualified `Identifier`, a literal, a function call, or
        // any other expression shape cannot be attributed to a relation.
        return None;
    };
    if parts.len() < 2 {
        return None;
    }
    // The part immediately before the final field is the table/alias key
    // registered in `alias_env` — for a plain `a.id` that's `a`; for a
    // fully schema-qualified `public.t2.id` it's `t2` (the table's bare
    // name, since an unaliased table is registered under its own name).
    // This resolves a 3-part reference Go's `parseAExpr` would reject
    // outright (it only matches exactly 2 `ColumnRef` fields); noted in
    // DESIGN.md as a deliberate divergence.
    let alias = parts[parts.len() - 2].value.as_str();
    let field = parts.last()?.value.clone();
    let target = alias_env.resolve(alias)?;
    Some(ColumnRef::new(target.schema.clone(), target.relation.clone(), field))
}

/// `col IN (SELECT col FROM tbl)`: a conservative SEMI relationship,
/// grounded in `parseAnySubLink`. Requires the subquery to select from
/// exactly one table with no joins and project exactly one plain column
/// (no function wrapping on either side); anything else is dropped.
fn build_semi_join(lhs: &Expr, subquery: &Query, alias_env: &AliasEnvironment) -> Option<JoinRelationship> {
    let source = resolve_column_ref(lhs, alias_env)?;

    if subquery.with.is_some() {
        return None;
    }
    let SetExpr::Select(select) = subquery.body.as_ref() else {
        return None;
    };
    if select.from.len() != 1 {
        return None;
    }
    let twj = &select.from[0];
    if !twj.joins.is_empty() {
        return None;
    }
    let TableFactor::Table { name, .. } = &twj.relation else {
        return None;
    };
    let (schema, relation) = split_schema_and_name(&name.to_string());

    if select.projection.len() != 1 {
        return None;
    }
    let proj_expr = match &select.projection[0] {
        SelectItem::UnnamedExpr(e) | SelectItem::ExprWithAlias { expr: e, .. } => e,
        _ => return None,
    };
    let field = match proj_expr {
        Expr::CompoundIdentifier(parts) => parts.last()?.value.clone(),
        Expr::Identifier(ident) => ident.value.clone(),
        _ => return None,
    };

    Some(JoinRelationship {
        source,
        target: ColumnRef::new(schema, relation, field),
        join_type: JoinType::Semi,
    })
}
