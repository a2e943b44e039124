//! The dependency graph (C3): a set of relation nodes plus directed
//! "depends on" edges, with cycle rejection, topological layering, and
//! a contraction operation that elides temporary nodes while preserving
//! reachability between the permanent ones that remain.
//!
//! Grounded directly in the original system's `depgraph` package: nodes
//! are identified by a string id, edges are tracked in both directions
//! (`dependencies`: child -> parents it depends on, `dependents`: parent
//! -> children that depend on it) so that both `Leaves()`-style queries
//! and transitive-closure queries are O(1) lookups rather than full
//! graph walks.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::types::split_schema_and_name;

/// Stable identifier for a node: `<namespace>.<schema>.<relation>` per
/// spec §6, or just `<schema>.<relation>` when no namespace is given.
pub type NodeId = String;

/// Whether a node is a permanent relation (survives graph contraction)
/// or a temporary one (CTE / subquery alias, elided by `contract()`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Persistence {
    Permanent,
    Temporary,
}

/// A single relation (table, view, CTE, or subquery) tracked by the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationNode {
    pub id: NodeId,
    pub schema: String,
    pub name: String,
    pub persistence: Persistence,
}

impl RelationNode {
    /// A node with an empty schema is always temporary regardless of the
    /// persistence the caller passes in, matching spec §3's definition
    /// ("temporary if its schema is empty OR ..."): CTE names and
    /// subquery aliases are never assigned a real schema, so this single
    /// rule is what makes a FROM-clause reference to a CTE name collapse
    /// onto the same temporary node the WITH clause created, without
    /// either caller needing to consult the alias environment first.
    pub fn new(namespace: &str, schema: &str, name: &str, persistence: Persistence) -> Self {
        let persistence = if schema.is_empty() {
            Persistence::Temporary
        } else {
            persistence
        };
        Self {
            id: Self::identity_key_parts(namespace, schema, name),
            schema: schema.to_string(),
            name: name.to_string(),
            persistence,
        }
    }

    /// Builds a node from a possibly-qualified identifier string, splitting
    /// schema/name via the shared quoting-aware splitter.
    pub fn from_qualified(namespace: &str, qualified: &str, persistence: Persistence) -> Self {
        let (schema, name) = split_schema_and_name(qualified);
        Self::new(namespace, &schema, &name, persistence)
    }

    /// `<namespace>.<schema>.<relation>` per spec §6, omitting empty segments.
    pub fn identity_key_parts(namespace: &str, schema: &str, name: &str) -> NodeId {
        let mut parts = Vec::with_capacity(3);
        if !namespace.is_empty() {
            parts.push(namespace);
        }
        if !schema.is_empty() {
            parts.push(schema);
        }
        parts.push(name);
        parts.join(".")
    }

    pub fn is_temp(&self) -> bool {
        matches!(self.persistence, Persistence::Temporary)
    }
}

type NodeSet = HashSet<NodeId>;
type DepMap = HashMap<NodeId, NodeSet>;

/// A directed acyclic graph of [`RelationNode`]s.
///
/// `dependencies[a]` is the set of nodes `a` depends on (its parents in
/// lineage terms: the tables `a` was derived from). `dependents[a]` is the
/// reverse: the set of nodes that depend on `a`. Both maps only ever hold
/// a key for a node that has at least one edge; a node with zero edges in
/// a given direction has no key there at all (this key-absence-means-empty
/// convention is load-bearing for `leaves()`, mirroring the source
/// system's map semantics where a fully-disconnected node is simply
/// absent from both maps after removal).
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: HashMap<NodeId, RelationNode>,
    dependencies: DepMap,
    dependents: DepMap,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: &str) -> Option<&RelationNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &RelationNode> {
        self.nodes.values()
    }

    /// Inserts a node if absent. Re-inserting an existing id is a no-op
    /// (the first persistence assignment for a node wins, matching the
    /// lineage extractor's "first mention decides temp-vs-permanent" rule
    /// for CTE names that shadow real tables).
    pub fn add_node(&mut self, node: RelationNode) -> NodeId {
        let id = node.id.clone();
        self.nodes.entry(id.clone()).or_insert(node);
        id
    }

    /// Returns true if `descendant` transitively depends on `ancestor`,
    /// i.e. whether there is a directed path `descendant -> ... -> ancestor`
    /// in the dependency direction. Used by `depend_on` to reject edges
    /// that would close a cycle, the same reverse-reachability check the
    /// source graph performs before accepting a new edge.
    pub fn depends_on(&self, descendant: &str, ancestor: &str) -> bool {
        let mut visited: NodeSet = HashSet::new();
        let mut stack = vec![descendant.to_string()];
        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Some(parents) = self.dependencies.get(&current) {
                if parents.contains(ancestor) {
                    return true;
                }
                stack.extend(parents.iter().cloned());
            }
        }
        false
    }

    /// Records that `child` depends on `parent` (child was derived from
    /// parent). Both nodes must already exist via `add_node`. Rejects
    /// self-edges and edges that would create a cycle; both rejections are
    /// plain [`GraphError`] values, never panics, since a caller analyzing
    /// untrusted SQL must be able to tolerate and log a malformed edge
    /// without aborting the whole run.
    pub fn depend_on(&mut self, child: &str, parent: &str) -> Result<(), GraphError> {
        if child == parent {
            return Err(GraphError::SelfDependency);
        }
        if self.depends_on(parent, child) {
            return Err(GraphError::CircularDependency);
        }
        self.dependencies
            .entry(child.to_string())
            .or_default()
            .insert(parent.to_string());
        self.dependents
            .entry(parent.to_string())
            .or_default()
            .insert(child.to_string());
        Ok(())
    }

    /// Direct parents of `id` (nodes it depends on).
    pub fn dependencies_of(&self, id: &str) -> NodeSet {
        self.dependencies.get(id).cloned().unwrap_or_default()
    }

    /// Direct children of `id` (nodes that depend on it).
    pub fn dependents_of(&self, id: &str) -> NodeSet {
        self.dependents.get(id).cloned().unwrap_or_default()
    }

    /// Nodes with no outstanding dependencies: absent (or emptied) from
    /// the `dependencies` map. A node that has never had an edge added and
    /// a node whose last parent was contracted away are indistinguishable
    /// here, both are leaves, which is exactly the property `contract()`
    /// relies on to terminate.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.nodes
            .keys()
            .filter(|id| {
                self.dependencies
                    .get(*id)
                    .map(|parents| parents.is_empty())
                    .unwrap_or(true)
            })
            .cloned()
            .collect()
    }

    /// Topologically sorted layers: layer 0 is the current leaves, layer 1
    /// is the leaves once layer 0 is removed, and so on. Built by
    /// repeatedly peeling leaves off a scratch copy of the graph, the same
    /// algorithm the source system's `TopoSortedLayers` uses.
    pub fn topo_sorted_layers(&self) -> Vec<Vec<NodeId>> {
        let mut scratch = self.clone();
        let mut layers = Vec::new();
        while !scratch.is_empty() {
            let mut layer = scratch.leaves();
            if layer.is_empty() {
                // Every remaining node has at least one dependency, but none
                // of those dependencies exist as a node with recorded edges:
                // this can only happen if `depend_on` was bypassed. Break
                // rather than loop forever.
                layer = scratch.nodes.keys().cloned().collect();
            }
            layer.sort();
            for id in &layer {
                scratch.remove(id);
            }
            layers.push(layer);
        }
        layers
    }

    /// Flattened topological order (concatenation of `topo_sorted_layers`).
    pub fn topo_sorted(&self) -> Vec<NodeId> {
        self.topo_sorted_layers().into_iter().flatten().collect()
    }

    /// Removes a node and all edges touching it. When a node's last edge
    /// in a given map is removed, the map entry is dropped entirely rather
    /// than left as an empty set, preserving the key-absence-means-no-edges
    /// convention `leaves()` depends on.
    pub fn remove(&mut self, id: &str) {
        self.nodes.remove(id);

        if let Some(parents) = self.dependencies.remove(id) {
            for parent in parents {
                if let Some(children) = self.dependents.get_mut(&parent) {
                    children.remove(id);
                    if children.is_empty() {
                        self.dependents.remove(&parent);
                    }
                }
            }
        }

        if let Some(children) = self.dependents.remove(id) {
            for child in children {
                if let Some(parents) = self.dependencies.get_mut(&child) {
                    parents.remove(id);
                    if parents.is_empty() {
                        self.dependencies.remove(&child);
                    }
                }
            }
        }
    }

    /// Elides every temporary node (CTEs, subquery aliases) by connecting
    /// each temporary node's parents directly to its children, then
    /// removing it, repeating until a full pass removes nothing. Permanent
    /// nodes and the transitive closure between them are preserved exactly;
    /// this is the `ShrinkGraph` operation from the source system, renamed
    /// per the design glossary.
    pub fn contract(&mut self) {
        loop {
            let temp_ids: Vec<NodeId> = self
                .nodes
                .values()
                .filter(|n| n.is_temp())
                .map(|n| n.id.clone())
                .collect();

            if temp_ids.is_empty() {
                break;
            }

            for id in &temp_ids {
                let parents = self.dependencies_of(id);
                let children = self.dependents_of(id);
                for child in &children {
                    for parent in &parents {
                        // A re-derived edge that already exists in the
                        // opposite direction, or a self-edge produced when a
                        // temp node's parent and child coincide, is expected
                        // here and simply dropped.
                        let _ = self.depend_on(child, parent);
                    }
                }
                self.remove(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perm(ns: &str, schema: &str, name: &str) -> RelationNode {
        RelationNode::new(ns, schema, name, Persistence::Permanent)
    }

    fn temp(ns: &str, schema: &str, name: &str) -> RelationNode {
        RelationNode::new(ns, schema, name, Persistence::Temporary)
    }

    #[test]
    fn add_node_is_idempotent_by_id() {
        let mut g = Graph::new();
        let id1 = g.add_node(perm("", "public", "a"));
        let id2 = g.add_node(perm("", "public", "a"));
        assert_eq!(id1, id2);
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn depend_on_rejects_self_edge() {
        let mut g = Graph::new();
        let a = g.add_node(perm("", "public", "a"));
        assert_eq!(g.depend_on(&a, &a), Err(GraphError::SelfDependency));
    }

    #[test]
    fn depend_on_rejects_cycle() {
        let mut g = Graph::new();
        let a = g.add_node(perm("", "public", "a"));
        let b = g.add_node(perm("", "public", "b"));
        g.depend_on(&b, &a).unwrap();
        assert_eq!(g.depend_on(&a, &b), Err(GraphError::CircularDependency));
    }

    #[test]
    fn leaves_are_nodes_with_no_dependencies() {
        let mut g = Graph::new();
        let a = g.add_node(perm("", "public", "a"));
        let b = g.add_node(perm("", "public", "b"));
        g.depend_on(&b, &a).unwrap();
        assert_eq!(g.leaves(), vec![a]);
    }

    #[test]
    fn topo_sorted_layers_orders_leaves_first() {
        let mut g = Graph::new();
        let a = g.add_node(perm("", "public", "a"));
        let b = g.add_node(perm("", "public", "b"));
        let c = g.add_node(perm("", "public", "c"));
        g.depend_on(&b, &a).unwrap();
        g.depend_on(&c, &b).unwrap();
        let layers = g.topo_sorted_layers();
        assert_eq!(layers, vec![vec![a], vec![b], vec![c]]);
    }

    #[test]
    fn contract_elides_temp_node_preserving_closure() {
        let mut g = Graph::new();
        let base = g.add_node(perm("", "public", "base"));
        let cte = g.add_node(temp("", "", "cte1"));
        let target = g.add_node(perm("", "public", "target"));
        g.depend_on(&cte, &base).unwrap();
        g.depend_on(&target, &cte).unwrap();

        g.contract();

        assert!(!g.contains(&cte));
        assert!(g.contains(&base));
        assert!(g.contains(&target));
        assert!(g.depends_on(&target, &base));
    }

    #[test]
    fn contract_handles_diamond_through_temp_node() {
        let mut g = Graph::new();
        let a = g.add_node(perm("", "public", "a"));
        let b = g.add_node(perm("", "public", "b"));
        let cte = g.add_node(temp("", "", "cte1"));
        let target = g.add_node(perm("", "public", "target"));
        g.depend_on(&cte, &a).unwrap();
        g.depend_on(&cte, &b).unwrap();
        g.depend_on(&target, &cte).unwrap();
        g.depend_on(&target, &a).unwrap();

        g.contract();

        assert_eq!(g.len(), 3);
        assert!(g.depends_on(&target, &a));
        assert!(g.depends_on(&target, &b));
    }

    #[test]
    fn remove_drops_empty_map_entries() {
        let mut g = Graph::new();
        let a = g.add_node(perm("", "public", "a"));
        let b = g.add_node(perm("", "public", "b"));
        g.depend_on(&b, &a).unwrap();
        g.remove(&a);
        assert!(g.leaves().contains(&b));
        assert!(!g.dependencies.contains_key(&b));
    }

    #[test]
    fn identity_key_omits_empty_segments() {
        assert_eq!(RelationNode::identity_key_parts("", "", "t"), "t");
        assert_eq!(RelationNode::identity_key_parts("", "public", "t"), "public.t");
        assert_eq!(RelationNode::identity_key_parts("db", "public", "t"), "db.public.t");
    }
}
