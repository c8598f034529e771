//! # Errors
//!
//! Two layers of failure meet in this crate. [`OptimizerError`] is what a what-if
//! adapter reports when it cannot produce a cost at all; the core never retries it.
//! [`IbgError`] is what graph construction and graph queries report to callers.
//!
//! A query that lands in a region the constructor never explored is reported as
//! [`IbgError::IncompleteGraph`], which is distinct from a covering search that simply
//! finds nothing (`Ok(None)` from the finder). Callers treat the former as "expand the
//! graph and ask again" and the latter as "fall back to a direct optimizer call".

use crate::bitset::IndexBitSet;
use crate::cost::Cost;
use crate::graph::NodeId;

/// Failure reported by a what-if optimizer adapter.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OptimizerError {
    /// The adapter could not reach the DBMS.
    #[error("connection failure: {0}")]
    Connection(String),
    /// The DBMS rejected the statement.
    #[error("invalid statement: {0}")]
    InvalidStatement(String),
    /// The vendor what-if facility failed.
    #[error("what-if tool failure: {0}")]
    Tool(String),
    /// The adapter has no answer for this configuration (replay adapters).
    #[error("no recorded plan for configuration {0}")]
    UnknownConfiguration(String),
}

/// Errors raised by graph construction and graph queries.
#[derive(Debug, thiserror::Error)]
pub enum IbgError {
    /// The optimizer failed while a configuration was being explained. Construction
    /// is abandoned as a whole.
    #[error("optimizer failed for configuration {configuration}: {source}")]
    OracleFailure {
        configuration: IndexBitSet,
        #[source]
        source: OptimizerError,
    },
    /// The query needs an edge that construction has not expanded yet.
    #[error("IBG construction has not completed yet: node {node} has no child for removed index {removed}")]
    IncompleteGraph { node: NodeId, removed: usize },
    /// The optimizer reported using indexes that were not in the configuration.
    #[error("used indexes {used} are not a subset of configuration {configuration}")]
    UsedNotSubset {
        configuration: IndexBitSet,
        used: IndexBitSet,
    },
    /// Removing an index made the plan cheaper, breaking the monotonicity assumption.
    #[error("non-monotonic cost: node {child} ({child_cost}) is cheaper than its parent {parent} ({parent_cost})")]
    NonMonotonic {
        parent: NodeId,
        child: NodeId,
        parent_cost: Cost,
        child_cost: Cost,
    },
    /// The same index appears twice in a universe.
    #[error("duplicate index in universe: {0}")]
    DuplicateIndex(String),
    /// A graph needs at least one candidate index.
    #[error("index universe is empty")]
    EmptyUniverse,
}

impl IbgError {
    pub(crate) fn oracle(configuration: &IndexBitSet, source: OptimizerError) -> Self {
        IbgError::OracleFailure {
            configuration: configuration.clone(),
            source,
        }
    }

    /// True for violations of the assumptions the graph relies on, as opposed to
    /// adapter failures or unexplored regions.
    pub fn is_assumption_violated(&self) -> bool {
        matches!(
            self,
            IbgError::UsedNotSubset { .. } | IbgError::NonMonotonic { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, IbgError>;
