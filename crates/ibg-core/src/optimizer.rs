//! # What-If Optimizer Interface
//!
//! The graph never talks to a database itself. Everything it knows about cost comes
//! through [`WhatIfOptimizer::explain`]: given a statement and a hypothetical index
//! configuration, return the plan's total cost and which of the configuration's
//! indexes the plan actually uses.
//!
//! ## Trait Design
//!
//! The trait is object safe and `Send + Sync` so that one adapter instance can serve
//! several constructions, including [`construct_parallel`], which issues the calls of
//! one graph level concurrently. Adapters own their connection handling and any
//! retry policy; the graph treats every error as final.
//!
//! ## In-Memory Optimizer
//!
//! [`InMemoryOptimizer`] is a small model optimizer for tests and simulations. It
//! knows a list of candidate plans per statement, each requiring some set of indexes,
//! and picks the cheapest plan whose indexes are all present. That model is monotone
//! and its answers depend only on the indexes a plan uses, which are exactly the
//! assumptions the graph's covering search relies on.
//!
//! [`construct_parallel`]: crate::constructor::IbgConstructor::construct_parallel

use crate::bitset::IndexBitSet;
use crate::cost::Cost;
use crate::error::OptimizerError;
use crate::universe::{Statement, Universe};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The optimizer's answer for one statement under one configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhatIfPlan {
    pub cost: Cost,
    /// Indexes referenced by the chosen plan. Must be a subset of the configuration.
    pub used: IndexBitSet,
}

/// A cost oracle backed by a DBMS what-if facility.
pub trait WhatIfOptimizer: Send + Sync {
    fn explain(
        &self,
        statement: &Statement,
        universe: &Universe,
        configuration: &IndexBitSet,
    ) -> Result<WhatIfPlan, OptimizerError>;

    /// Cost only. Adapters with a cheaper cost-only path can override this.
    fn explain_cost(
        &self,
        statement: &Statement,
        universe: &Universe,
        configuration: &IndexBitSet,
    ) -> Result<Cost, OptimizerError> {
        self.explain(statement, universe, configuration)
            .map(|plan| plan.cost)
    }
}

impl<T: WhatIfOptimizer + ?Sized> WhatIfOptimizer for &T {
    fn explain(
        &self,
        statement: &Statement,
        universe: &Universe,
        configuration: &IndexBitSet,
    ) -> Result<WhatIfPlan, OptimizerError> {
        (**self).explain(statement, universe, configuration)
    }

    fn explain_cost(
        &self,
        statement: &Statement,
        universe: &Universe,
        configuration: &IndexBitSet,
    ) -> Result<Cost, OptimizerError> {
        (**self).explain_cost(statement, universe, configuration)
    }
}

/// A candidate plan of the in-memory optimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidatePlan {
    /// Index names the plan needs.
    pub requires: Vec<String>,
    pub cost: f64,
}

/// Plan-list model optimizer, keyed by statement text.
///
/// Every statement has a base plan that needs no index. A statement with no
/// registered plans is rejected as invalid.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOptimizer {
    pub plans: HashMap<String, StatementPlans>,
}

/// Registered plans for one statement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatementPlans {
    pub base_cost: f64,
    pub candidates: Vec<CandidatePlan>,
}

impl InMemoryOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the index-free plan cost for a statement.
    pub fn add_statement(&mut self, statement: &Statement, base_cost: f64) {
        let plans = self.plans.entry(statement.sql.clone()).or_default();
        plans.base_cost = base_cost;
    }

    /// Register a plan that is available when every named index is in the
    /// configuration. Ties between equally cheap plans go to the one added first.
    pub fn add_plan<S: Into<String>>(
        &mut self,
        statement: &Statement,
        requires: impl IntoIterator<Item = S>,
        cost: f64,
    ) {
        self.plans
            .entry(statement.sql.clone())
            .or_default()
            .candidates
            .push(CandidatePlan {
                requires: requires.into_iter().map(Into::into).collect(),
                cost,
            });
    }
}

impl WhatIfOptimizer for InMemoryOptimizer {
    fn explain(
        &self,
        statement: &Statement,
        universe: &Universe,
        configuration: &IndexBitSet,
    ) -> Result<WhatIfPlan, OptimizerError> {
        let plans = self
            .plans
            .get(&statement.sql)
            .ok_or_else(|| OptimizerError::InvalidStatement(statement.sql.clone()))?;

        let mut best = WhatIfPlan {
            cost: Cost::new(plans.base_cost),
            used: universe.empty_configuration(),
        };

        for candidate in &plans.candidates {
            if candidate.cost >= best.cost.total {
                continue;
            }
            // A plan naming an index outside the universe can never be chosen.
            let positions: Option<Vec<usize>> = candidate
                .requires
                .iter()
                .map(|name| universe.position_by_name(name))
                .collect();
            let Some(positions) = positions else {
                continue;
            };
            if positions.iter().all(|&p| configuration.get(p)) {
                best = WhatIfPlan {
                    cost: Cost::new(candidate.cost),
                    used: IndexBitSet::from_positions(universe.len(), positions),
                };
            }
        }

        Ok(best)
    }
}
