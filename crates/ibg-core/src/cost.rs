//! # What-If Cost
//!
//! Every node in the graph carries the optimizer's estimated cost for its statement
//! under the node's configuration. Costs come from an external optimizer and are only
//! ever compared with each other, so the units are whatever the optimizer reports
//! (timerons, page fetches, abstract planner units).
//!
//! ## Comparison
//!
//! Equality is epsilon-based to absorb floating-point noise in optimizer output; the
//! graph relies on this when it checks that removing an index never makes a plan
//! cheaper.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Optimizer cost of a statement under one configuration. Lower is better.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Cost {
    pub total: f64,
}

impl Cost {
    pub fn zero() -> Self {
        Self { total: 0.0 }
    }

    pub fn new(total: f64) -> Self {
        Self { total }
    }

    /// Cost saved by going from `self` to the cheaper `other`. Negative if `other`
    /// is more expensive.
    pub fn savings_to(&self, other: Cost) -> f64 {
        self.total - other.total
    }

    /// True if `self` is cheaper than `other` by more than `tolerance`.
    pub fn undercuts(&self, other: Cost, tolerance: f64) -> bool {
        self.total < other.total - tolerance
    }
}

impl PartialEq for Cost {
    fn eq(&self, other: &Self) -> bool {
        (self.total - other.total).abs() < f64::EPSILON
    }
}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.total.partial_cmp(&other.total)
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.total)
    }
}
