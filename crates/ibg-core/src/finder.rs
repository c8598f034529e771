//! # Covering Node Search
//!
//! Answers "what would the statement cost under configuration `C`?" from the graph
//! alone, without calling the optimizer.
//!
//! ## Covering
//!
//! A node `n` covers `C` when `used(n) ⊆ C ⊆ configuration(n)`. The optimizer chose
//! a plan for `configuration(n)` that only needs `used(n)`; that plan is still
//! available under `C`, and `C` offers nothing `configuration(n)` did not. Under the
//! monotonicity assumption the optimizer picks the same plan for `C`, so
//! `cost(C) = cost(n)` exactly.
//!
//! ## Descent
//!
//! Positions of `C` outside the universe are ignored. The search starts at the root,
//! whose configuration is the whole universe and therefore contains `C`. At each node,
//! if every used index is in `C` the node covers `C`. Otherwise some used index `i`
//! is missing from `C`; following the edge that removes `i` keeps `C` inside the
//! configuration and gets one index closer to a cover. The lowest such position is
//! taken, which makes the walk deterministic. Each step removes one index, so the walk
//! is at most `|universe|` steps long.

use crate::bitset::IndexBitSet;
use crate::cost::Cost;
use crate::error::{IbgError, Result};
use crate::graph::{Child, IndexBenefitGraph, NodeId};
use serde::Serialize;
use tracing::trace;

/// The covering node found for a queried configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FindResult {
    pub node: NodeId,
    pub cost: Cost,
    /// Used indexes of the covering node; a subset of the queried configuration.
    pub used: IndexBitSet,
}

/// Outcome of one step of the descent.
pub(crate) enum Step {
    Covered(NodeId),
    Next(NodeId),
    /// The edge that removes `removed` from `node` has not been expanded.
    Pending { node: NodeId, removed: usize },
    /// The node has no edge for a used index. Not produced by the constructor.
    Missing,
}

/// Restrict `configuration` to the positions of the graph's universe.
pub(crate) fn restrict(
    ibg: &IndexBenefitGraph,
    configuration: &IndexBitSet,
) -> IndexBitSet {
    let mut restricted = configuration.clone();
    restricted.intersect_with(&ibg.root().configuration);
    restricted
}

pub(crate) fn step(ibg: &IndexBenefitGraph, at: NodeId, target: &IndexBitSet) -> Step {
    let node = ibg.node(at);
    let Some(missing) = node.used.iter().find(|&p| !target.get(p)) else {
        return Step::Covered(at);
    };
    match node.edge(missing).map(|e| e.child) {
        Some(Child::Node(child)) => Step::Next(child),
        Some(Child::Pending) => Step::Pending {
            node: at,
            removed: missing,
        },
        None => Step::Missing,
    }
}

/// Find the node covering `configuration`.
///
/// Returns `Err(IncompleteGraph)` when the walk needs an edge that has not been
/// expanded, and `Ok(None)` when the graph has no edge to follow at all.
pub fn find(ibg: &IndexBenefitGraph, configuration: &IndexBitSet) -> Result<Option<FindResult>> {
    let target = restrict(ibg, configuration);
    let mut at = ibg.root().id;
    loop {
        match step(ibg, at, &target) {
            Step::Covered(id) => {
                let node = ibg.node(id);
                trace!("Configuration {} covered by node {}", target, id);
                return Ok(Some(FindResult {
                    node: id,
                    cost: node.cost,
                    used: node.used.clone(),
                }));
            }
            Step::Next(child) => at = child,
            Step::Pending { node, removed } => {
                return Err(IbgError::IncompleteGraph { node, removed });
            }
            Step::Missing => return Ok(None),
        }
    }
}

/// Cost of `configuration` read from the graph.
pub fn find_cost(ibg: &IndexBenefitGraph, configuration: &IndexBitSet) -> Result<Option<Cost>> {
    Ok(find(ibg, configuration)?.map(|r| r.cost))
}

/// Benefit of index `pos` relative to `configuration`: how much cheaper the statement
/// gets when `pos` is added, `cost(C \ {pos}) - cost(C ∪ {pos})`. Never negative under
/// the monotonicity assumption.
///
/// On a complete graph, indexes no node uses have zero benefit. On an incomplete graph
/// the unexplored region may still use them, so both costs are looked up and a pending
/// edge on either path is reported as `IncompleteGraph`.
pub fn benefit(
    ibg: &IndexBenefitGraph,
    pos: usize,
    configuration: &IndexBitSet,
) -> Result<Option<f64>> {
    if ibg.is_complete() && !ibg.is_used(pos) {
        return Ok(Some(0.0));
    }
    let without = configuration.without(pos);
    let mut with = ibg.universe().empty_configuration();
    with.union_with(&restrict(ibg, configuration));
    with.set(pos);

    let cost_without = find_cost(ibg, &without)?;
    let cost_with = find_cost(ibg, &with)?;
    let (Some(cost_without), Some(cost_with)) = (cost_without, cost_with) else {
        return Ok(None);
    };
    Ok(Some(cost_without.savings_to(cost_with)))
}
