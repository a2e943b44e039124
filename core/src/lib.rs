//! `lineage-core`: SQL lineage and join-relationship analysis for
//! PostgreSQL/Greenplum.
//!
//! This crate is the parsing/graph/extraction engine (components C1–C7
//! of the design notes). It has no notion of an output format, a CLI, or
//! a specific catalog connection — callers drive [`lineage::LineageExtractor`]
//! and [`join::JoinExtractor`] against a SQL text, optionally supplying a
//! [`udf::CatalogProvider`] for UDF-body recursion, and read the result
//! back out of a [`graph::Graph`] or a relationship map.

pub mod alias;
pub mod error;
pub mod function_call;
pub mod graph;
pub mod join;
pub mod lineage;
pub mod parser;
pub mod types;
pub mod udf;

pub use alias::{AliasEnvironment, AliasTarget};
pub use error::{GraphError, ParseError, ResolveError};
pub use function_call::{identify_func_call, FunctionCall};
pub use graph::{Graph, NodeId, Persistence, RelationNode};
pub use join::{JoinExtractor, JoinRelationship};
pub use lineage::LineageExtractor;
pub use types::{ColumnRef, JoinType};
pub use udf::{CatalogProvider, NullCatalogProvider};
