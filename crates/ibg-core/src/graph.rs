//! # The Index Benefit Graph
//!
//! The graph is a DAG over index configurations. Each node records what the optimizer
//! said about one configuration: the plan's cost and which indexes the plan used. For
//! every used index the node has an outgoing edge to the configuration with that index
//! removed. Indexes the plan ignored get no edge, because dropping them cannot change
//! the plan.
//!
//! ## Storage
//!
//! Nodes live in a single arena (`Vec<Node>`) and refer to each other by [`NodeId`].
//! A hash map from configuration to node id deduplicates configurations: when two
//! parents remove different indexes and land on the same configuration, they share one
//! child node. The root is always node 0 and holds the full universe.
//!
//! ## Growth
//!
//! The graph only grows. Nodes are never removed or modified after creation, except
//! that edges start out [`Child::Pending`] and are later pointed at their child by the
//! constructor. A graph with no pending edges is complete. Once complete, it is plain
//! read-only data and can be shared across threads for concurrent queries.

use crate::bitset::IndexBitSet;
use crate::cost::Cost;
use crate::universe::{Statement, Universe};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Unique identifier for a node within one graph.
pub type NodeId = u32;

/// Target of a removal edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Child {
    Node(NodeId),
    /// Not expanded yet. Only present in incomplete graphs.
    Pending,
}

/// "What if index `removed` were dropped from this node's configuration."
#[derive(Debug, Clone, Serialize)]
pub struct Edge {
    pub removed: usize,
    pub child: Child,
}

/// One explored configuration.
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub id: NodeId,
    pub configuration: IndexBitSet,
    pub cost: Cost,
    /// Indexes used by the optimizer's plan; always a subset of `configuration`.
    pub used: IndexBitSet,
    /// One edge per used index, ascending by removed position.
    pub edges: Vec<Edge>,
}

impl Node {
    /// The edge removing `pos`, if `pos` is a used index of this node.
    pub fn edge(&self, pos: usize) -> Option<&Edge> {
        self.edges
            .binary_search_by_key(&pos, |e| e.removed)
            .ok()
            .map(|i| &self.edges[i])
    }

    pub fn is_expanded(&self) -> bool {
        self.edges.iter().all(|e| e.child != Child::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Counters collected while a graph is built.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConstructionStats {
    /// What-if calls issued on behalf of this graph, including the empty-cost call.
    pub whatif_calls: usize,
    pub nodes: usize,
    pub edges: usize,
    pub pending_edges: usize,
    /// Wall-clock time spent in construction and expansion.
    pub elapsed: Duration,
}

/// Memoized DAG of what-if results for one statement.
#[derive(Debug, Clone)]
pub struct IndexBenefitGraph {
    statement: Statement,
    universe: Universe,
    nodes: Vec<Node>,
    by_configuration: HashMap<IndexBitSet, NodeId>,
    empty_cost: Option<Cost>,
    used_union: IndexBitSet,
    pub(crate) stats: ConstructionStats,
}

impl IndexBenefitGraph {
    /// A graph holding only its root. Used by the constructor.
    pub(crate) fn with_root(
        statement: Statement,
        universe: Universe,
        root_cost: Cost,
        root_used: IndexBitSet,
    ) -> Self {
        let used_union = universe.empty_configuration();
        let mut graph = Self {
            statement,
            universe,
            nodes: Vec::new(),
            by_configuration: HashMap::new(),
            empty_cost: None,
            used_union,
            stats: ConstructionStats::default(),
        };
        let full = graph.universe.full_configuration();
        graph.add_node(full, root_cost, root_used);
        graph
    }

    /// Insert a node for a configuration not yet in the graph. All of its edges
    /// start out pending.
    pub(crate) fn add_node(
        &mut self,
        configuration: IndexBitSet,
        cost: Cost,
        used: IndexBitSet,
    ) -> NodeId {
        debug_assert!(!self.by_configuration.contains_key(&configuration));
        let id = self.nodes.len() as NodeId;
        let edges: Vec<Edge> = used
            .iter()
            .map(|removed| Edge {
                removed,
                child: Child::Pending,
            })
            .collect();
        self.stats.nodes += 1;
        self.stats.edges += edges.len();
        self.stats.pending_edges += edges.len();
        self.used_union.union_with(&used);
        self.by_configuration.insert(configuration.clone(), id);
        self.nodes.push(Node {
            id,
            configuration,
            cost,
            used,
            edges,
        });
        id
    }

    /// Point a pending edge at its child.
    pub(crate) fn link(&mut self, parent: NodeId, removed: usize, child: NodeId) {
        let node = &mut self.nodes[parent as usize];
        if let Ok(i) = node.edges.binary_search_by_key(&removed, |e| e.removed) {
            if node.edges[i].child == Child::Pending {
                self.stats.pending_edges -= 1;
            }
            node.edges[i].child = Child::Node(child);
        }
    }

    pub(crate) fn set_empty_cost(&mut self, cost: Cost) {
        self.empty_cost = Some(cost);
    }

    /// The empty-configuration cost, once it has been recorded.
    pub(crate) fn recorded_empty_cost(&self) -> Option<Cost> {
        self.empty_cost
    }

    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    /// The node for the full universe.
    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The node built for exactly this configuration, if any.
    pub fn node_for(&self, configuration: &IndexBitSet) -> Option<&Node> {
        self.by_configuration
            .get(configuration)
            .map(|&id| self.node(id))
    }

    /// Cost of the statement with no indexes at all. Every constructor entry point
    /// records it before handing the graph out.
    pub fn empty_cost(&self) -> Cost {
        self.empty_cost.unwrap_or_else(Cost::zero)
    }

    /// True if the index at `pos` is used by the plan of at least one node.
    pub fn is_used(&self, pos: usize) -> bool {
        self.used_union.get(pos)
    }

    /// Union of the used sets of all nodes.
    pub fn used_indexes(&self) -> &IndexBitSet {
        &self.used_union
    }

    pub fn is_complete(&self) -> bool {
        self.stats.pending_edges == 0
    }

    pub fn stats(&self) -> &ConstructionStats {
        &self.stats
    }

    pub fn whatif_calls(&self) -> usize {
        self.stats.whatif_calls
    }

    /// Nodes that still have pending edges, in id order.
    pub fn frontier(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| !n.is_expanded())
    }
}

/// Renders the graph breadth-first, one line per node.
///
/// ```text
/// node 0 {idx_a, idx_b} cost=10.00 used={idx_a}
///   -idx_a -> node 1
/// ```
impl fmt::Display for IndexBenefitGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            writeln!(
                f,
                "node {} {} cost={} used={}",
                node.id,
                self.universe.describe(&node.configuration),
                node.cost,
                self.universe.describe(&node.used)
            )?;
            for edge in &node.edges {
                let name = self
                    .universe
                    .index(edge.removed)
                    .map_or("?", |i| i.name.as_str());
                match edge.child {
                    Child::Node(child) => writeln!(f, "  -{name} -> node {child}")?,
                    Child::Pending => writeln!(f, "  -{name} -> pending")?,
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::Index;

    fn graph() -> IndexBenefitGraph {
        let universe = Universe::new(vec![
            Index::new("idx_a", "t", ["a"]),
            Index::new("idx_b", "t", ["b"]),
        ])
        .unwrap();
        IndexBenefitGraph::with_root(
            Statement::new("SELECT a FROM t WHERE b = 1"),
            universe,
            Cost::new(10.0),
            IndexBitSet::from_positions(2, [0]),
        )
    }

    #[test]
    fn test_root_starts_pending() {
        let g = graph();
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.root().id, 0);
        assert_eq!(g.root().edges.len(), 1);
        assert!(!g.is_complete());
        assert!(g.is_used(0));
        assert!(!g.is_used(1));
        assert_eq!(g.frontier().count(), 1);
    }

    #[test]
    fn test_link_completes_graph() {
        let mut g = graph();
        let child = g.add_node(
            IndexBitSet::from_positions(2, [1]),
            Cost::new(20.0),
            IndexBitSet::with_capacity(2),
        );
        g.link(0, 0, child);
        assert!(g.is_complete());
        assert_eq!(g.root().edge(0).unwrap().child, Child::Node(child));
        assert!(g.root().edge(1).is_none());
        assert!(g.node(child).is_terminal());
        assert_eq!(
            g.node_for(&IndexBitSet::from_positions(2, [1])).map(|n| n.id),
            Some(child)
        );
        assert_eq!(g.stats().edges, 1);
        assert_eq!(g.stats().pending_edges, 0);
    }

    #[test]
    fn test_display() {
        let g = graph();
        let text = g.to_string();
        assert!(text.contains("node 0 {idx_a, idx_b} cost=10.00 used={idx_a}"));
        assert!(text.contains("-idx_a -> pending"));
    }
}
