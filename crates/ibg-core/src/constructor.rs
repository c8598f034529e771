//! # Graph Construction
//!
//! Builds an [`IndexBenefitGraph`] for one statement with as few what-if calls as
//! possible.
//!
//! ## Algorithm
//!
//! 1. Explain the full universe. This is the root.
//! 2. Keep a FIFO queue of nodes with unexpanded edges. For each edge (one per index
//!    the node's plan used), look up the configuration with that index removed. If a
//!    node already exists for it, link it; this is how the DAG shares children between
//!    parents. Otherwise explain it, add the node, link it and queue it.
//! 3. Stop when the queue is empty. Nodes whose plan uses no index have no edges.
//! 4. Record the empty-configuration cost, reusing the empty node if the traversal
//!    reached it. If a later `expand` or `cost_for` reaches the empty configuration,
//!    its node is built from the recorded cost without another call.
//!
//! Indexes a plan ignores never get an edge, so the graph grows with the number of
//! indexes the optimizer actually uses, not with the size of the universe. Every call
//! produces a node for a configuration not seen before, so the number of what-if calls
//! equals the number of distinct configurations explored (plus at most one for the
//! empty cost).
//!
//! ## Failure
//!
//! An optimizer error aborts construction and the partial graph is dropped. Used sets
//! that are not subsets of their configuration, and (when checking is on) children
//! that are cheaper than their parent, abort construction as assumption violations.
//!
//! ## Budgets and Incremental Growth
//!
//! `ConstructionConfig` caps the graph's node count and the what-if calls of one
//! construction pass. When a cap is hit the remaining edges stay pending and the graph
//! reports itself incomplete. [`IbgConstructor::expand`] resumes construction, and
//! [`IbgConstructor::cost_for`] answers a single query by expanding only the edges on
//! its own search path.
//!
//! ## Parallel Construction
//!
//! [`IbgConstructor::construct_parallel`] proceeds level by level. The new distinct
//! configurations of one level are explained concurrently on the rayon pool; nodes are
//! then inserted and linked on the calling thread, so deduplication needs no locking
//! and the resulting graph has the same configurations and call count as the
//! sequential build.

use crate::bitset::IndexBitSet;
use crate::error::{IbgError, Result};
use crate::finder::{self, FindResult, Step};
use crate::graph::{Child, IndexBenefitGraph, NodeId};
use crate::optimizer::{WhatIfOptimizer, WhatIfPlan};
use crate::universe::{Statement, Universe};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Limits and checks applied while building a graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstructionConfig {
    /// Upper bound on the number of nodes a graph may hold.
    pub max_nodes: usize,
    /// Upper bound on the what-if calls of one construction pass (`construct`,
    /// `construct_parallel` or `expand`). The empty-cost call is not counted.
    pub max_whatif_calls: usize,
    /// Reject optimizers that report a child cheaper than its parent.
    pub check_monotonicity: bool,
    /// Slack allowed before a cheaper child counts as a violation.
    pub monotonicity_tolerance: f64,
}

impl Default for ConstructionConfig {
    fn default() -> Self {
        Self {
            max_nodes: 100_000,
            max_whatif_calls: 1_000_000,
            check_monotonicity: true,
            monotonicity_tolerance: 1e-6,
        }
    }
}

/// Builds and grows index benefit graphs against one what-if optimizer.
pub struct IbgConstructor {
    pub optimizer: Arc<dyn WhatIfOptimizer>,
    pub config: ConstructionConfig,
}

/// Calls issued during one construction pass, checked against the budget.
struct Budget {
    calls: usize,
}

impl IbgConstructor {
    pub fn new(optimizer: Arc<dyn WhatIfOptimizer>, config: ConstructionConfig) -> Self {
        Self { optimizer, config }
    }

    /// Build the complete graph for `statement` (unless a budget cuts it short).
    pub fn construct(
        &self,
        statement: Statement,
        universe: Universe,
    ) -> Result<IndexBenefitGraph> {
        let started = Instant::now();
        let mut graph = self.root_graph(statement, universe)?;
        let mut budget = Budget { calls: 1 };
        self.expand_with(&mut graph, &mut budget)?;
        self.record_empty_cost(&mut graph)?;
        graph.stats.elapsed += started.elapsed();

        debug!(
            "IBG construction finished: nodes={}, whatif_calls={}, complete={}",
            graph.node_count(),
            graph.whatif_calls(),
            graph.is_complete()
        );
        Ok(graph)
    }

    /// A graph holding only the root, with every edge pending, plus the empty cost.
    /// Starting point for lazy growth through [`cost_for`](Self::cost_for).
    pub fn construct_root(
        &self,
        statement: Statement,
        universe: Universe,
    ) -> Result<IndexBenefitGraph> {
        let started = Instant::now();
        let mut graph = self.root_graph(statement, universe)?;
        self.record_empty_cost(&mut graph)?;
        graph.stats.elapsed += started.elapsed();
        Ok(graph)
    }

    /// Resume construction of an incomplete graph with a fresh call budget.
    ///
    /// On error the graph keeps every node added so far and stays incomplete.
    pub fn expand(&self, graph: &mut IndexBenefitGraph) -> Result<()> {
        let started = Instant::now();
        let mut budget = Budget { calls: 0 };
        let result = self.expand_with(graph, &mut budget);
        graph.stats.elapsed += started.elapsed();
        result?;

        debug!(
            "IBG expansion finished: nodes={}, calls={}, complete={}",
            graph.node_count(),
            budget.calls,
            graph.is_complete()
        );
        Ok(())
    }

    /// Build the complete graph, explaining each level's new configurations in parallel.
    pub fn construct_parallel(
        &self,
        statement: Statement,
        universe: Universe,
    ) -> Result<IndexBenefitGraph> {
        let started = Instant::now();
        let mut graph = self.root_graph(statement, universe)?;
        let mut calls = 1;
        let mut level: Vec<NodeId> = vec![graph.root().id];

        while !level.is_empty() {
            // Every pending edge of this level, with its child configuration.
            let wanted: Vec<(NodeId, usize, IndexBitSet)> = level
                .iter()
                .flat_map(|&id| {
                    let node = graph.node(id);
                    node.edges
                        .iter()
                        .filter(|e| e.child == Child::Pending)
                        .map(move |e| (id, e.removed, node.configuration.without(e.removed)))
                })
                .collect();

            let mut seen = HashSet::new();
            let mut fresh: Vec<IndexBitSet> = wanted
                .iter()
                .filter(|(_, _, config)| graph.node_for(config).is_none())
                .filter(|(_, _, config)| seen.insert(config.clone()))
                .map(|(_, _, config)| config.clone())
                .collect();

            let allowed = self
                .config
                .max_whatif_calls
                .saturating_sub(calls)
                .min(self.config.max_nodes.saturating_sub(graph.node_count()));
            let truncated = fresh.len() > allowed;
            fresh.truncate(allowed);

            trace!(
                "Explaining {} configurations for a level of {} nodes",
                fresh.len(),
                level.len()
            );
            let plans: Vec<_> = fresh
                .par_iter()
                .map(|config| {
                    self.optimizer
                        .explain(graph.statement(), graph.universe(), config)
                })
                .collect();
            calls += plans.len();
            graph.stats.whatif_calls += plans.len();

            let mut next = Vec::with_capacity(fresh.len());
            for (config, plan) in fresh.into_iter().zip(plans) {
                let plan = plan.map_err(|e| IbgError::oracle(&config, e))?;
                check_used_subset(&config, &plan)?;
                next.push(graph.add_node(config, plan.cost, plan.used));
            }

            for (parent, removed, config) in wanted {
                if let Some(child) = graph.node_for(&config).map(|n| n.id) {
                    self.check_monotonic(&graph, parent, child)?;
                    graph.link(parent, removed, child);
                }
            }

            if truncated {
                warn!(
                    "IBG construction budget exhausted: nodes={}, calls={}",
                    graph.node_count(),
                    calls
                );
                break;
            }
            level = next;
        }

        self.record_empty_cost(&mut graph)?;
        graph.stats.elapsed += started.elapsed();
        debug!(
            "Parallel IBG construction finished: nodes={}, whatif_calls={}, complete={}",
            graph.node_count(),
            graph.whatif_calls(),
            graph.is_complete()
        );
        Ok(graph)
    }

    /// Cost of `configuration`, expanding exactly the pending edges on the covering
    /// search path. Each expansion costs at most one what-if call.
    pub fn cost_for(
        &self,
        graph: &mut IndexBenefitGraph,
        configuration: &IndexBitSet,
    ) -> Result<Option<FindResult>> {
        let started = Instant::now();
        let target = finder::restrict(graph, configuration);
        let mut at = graph.root().id;
        let result = loop {
            match finder::step(graph, at, &target) {
                Step::Covered(id) => {
                    let node = graph.node(id);
                    break Ok(Some(FindResult {
                        node: id,
                        cost: node.cost,
                        used: node.used.clone(),
                    }));
                }
                Step::Next(child) => at = child,
                Step::Pending { node, removed } => {
                    if let Err(e) = self.expand_edge(graph, node, removed) {
                        break Err(e);
                    }
                }
                Step::Missing => break Ok(None),
            }
        };
        graph.stats.elapsed += started.elapsed();
        result
    }

    fn root_graph(
        &self,
        statement: Statement,
        universe: Universe,
    ) -> Result<IndexBenefitGraph> {
        if universe.is_empty() {
            return Err(IbgError::EmptyUniverse);
        }
        debug!(
            "Starting IBG construction: universe={}, statement={}",
            universe.len(),
            statement
        );
        let full = universe.full_configuration();
        let plan = self
            .optimizer
            .explain(&statement, &universe, &full)
            .map_err(|e| IbgError::oracle(&full, e))?;
        check_used_subset(&full, &plan)?;

        let mut graph = IndexBenefitGraph::with_root(statement, universe, plan.cost, plan.used);
        graph.stats.whatif_calls = 1;
        Ok(graph)
    }

    /// Breadth-first expansion of every pending edge, within the budget.
    fn expand_with(&self, graph: &mut IndexBenefitGraph, budget: &mut Budget) -> Result<()> {
        let mut queue: VecDeque<NodeId> = graph.frontier().map(|n| n.id).collect();

        while let Some(id) = queue.pop_front() {
            let pending: Vec<usize> = graph
                .node(id)
                .edges
                .iter()
                .filter(|e| e.child == Child::Pending)
                .map(|e| e.removed)
                .collect();

            for removed in pending {
                let child_config = graph.node(id).configuration.without(removed);
                if let Some(existing) = graph.node_for(&child_config).map(|n| n.id) {
                    self.check_monotonic(graph, id, existing)?;
                    graph.link(id, removed, existing);
                    continue;
                }

                let reusable = child_config.is_empty() && graph.recorded_empty_cost().is_some();
                if graph.node_count() >= self.config.max_nodes
                    || (budget.calls >= self.config.max_whatif_calls && !reusable)
                {
                    warn!(
                        "IBG construction budget exhausted: nodes={}, calls={}, pending_edges={}",
                        graph.node_count(),
                        budget.calls,
                        graph.stats().pending_edges
                    );
                    return Ok(());
                }

                let child = match reuse_empty_cost(graph, &child_config) {
                    Some(child) => child,
                    None => {
                        budget.calls += 1;
                        self.explain_node(graph, child_config)?
                    }
                };
                self.check_monotonic(graph, id, child)?;
                graph.link(id, removed, child);
                queue.push_back(child);
            }
        }
        Ok(())
    }

    /// Resolve one pending edge: link the existing node or explain a new one.
    fn expand_edge(
        &self,
        graph: &mut IndexBenefitGraph,
        parent: NodeId,
        removed: usize,
    ) -> Result<()> {
        let child_config = graph.node(parent).configuration.without(removed);
        let child = match graph.node_for(&child_config) {
            Some(node) => node.id,
            None => match reuse_empty_cost(graph, &child_config) {
                Some(child) => child,
                None => self.explain_node(graph, child_config)?,
            },
        };
        self.check_monotonic(graph, parent, child)?;
        graph.link(parent, removed, child);
        Ok(())
    }

    fn explain_node(
        &self,
        graph: &mut IndexBenefitGraph,
        configuration: IndexBitSet,
    ) -> Result<NodeId> {
        graph.stats.whatif_calls += 1;
        let plan = self
            .optimizer
            .explain(graph.statement(), graph.universe(), &configuration)
            .map_err(|e| IbgError::oracle(&configuration, e))?;
        check_used_subset(&configuration, &plan)?;
        trace!(
            "Explained {}: cost={}, used={}",
            configuration,
            plan.cost,
            plan.used
        );
        Ok(graph.add_node(configuration, plan.cost, plan.used))
    }

    fn record_empty_cost(&self, graph: &mut IndexBenefitGraph) -> Result<()> {
        let empty = graph.universe().empty_configuration();
        let cost = match graph.node_for(&empty) {
            Some(node) => node.cost,
            None => {
                graph.stats.whatif_calls += 1;
                self.optimizer
                    .explain_cost(graph.statement(), graph.universe(), &empty)
                    .map_err(|e| IbgError::oracle(&empty, e))?
            }
        };
        graph.set_empty_cost(cost);
        Ok(())
    }

    fn check_monotonic(
        &self,
        graph: &IndexBenefitGraph,
        parent: NodeId,
        child: NodeId,
    ) -> Result<()> {
        let parent_cost = graph.node(parent).cost;
        let child_cost = graph.node(child).cost;
        if !child_cost.undercuts(parent_cost, self.config.monotonicity_tolerance) {
            return Ok(());
        }
        if self.config.check_monotonicity {
            return Err(IbgError::NonMonotonic {
                parent,
                child,
                parent_cost,
                child_cost,
            });
        }
        warn!(
            "Non-monotonic optimizer cost: node {} ({}) cheaper than parent {} ({})",
            child, child_cost, parent, parent_cost
        );
        Ok(())
    }
}

/// Node for the empty configuration built from the cost `record_empty_cost` already
/// paid for. A plan under no indexes uses none, so the cost is all the node needs.
fn reuse_empty_cost(
    graph: &mut IndexBenefitGraph,
    configuration: &IndexBitSet,
) -> Option<NodeId> {
    if !configuration.is_empty() {
        return None;
    }
    let cost = graph.recorded_empty_cost()?;
    trace!("Reusing recorded empty-configuration cost {}", cost);
    Some(graph.add_node(configuration.clone(), cost, configuration.clone()))
}

fn check_used_subset(configuration: &IndexBitSet, plan: &WhatIfPlan) -> Result<()> {
    if plan.used.is_subset_of(configuration) {
        Ok(())
    } else {
        Err(IbgError::UsedNotSubset {
            configuration: configuration.clone(),
            used: plan.used.clone(),
        })
    }
}

/// Build the graph for `statement` with the default configuration.
pub fn construct(
    optimizer: Arc<dyn WhatIfOptimizer>,
    statement: Statement,
    universe: Universe,
) -> Result<IndexBenefitGraph> {
    IbgConstructor::new(optimizer, ConstructionConfig::default())
        .construct(statement, universe)
}
