//! # Call Counting
//!
//! What-if calls are the expensive resource an IBG exists to save, so callers often
//! want to know exactly how many a piece of work issued. `CountingOptimizer` wraps any
//! optimizer and counts the calls that pass through it. The counter is owned by the
//! wrapper instance, not global, and is safe to bump from the rayon pool during
//! parallel construction.

use ibg_core::{Cost, IndexBitSet, OptimizerError, Statement, Universe, WhatIfOptimizer, WhatIfPlan};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::trace;

#[derive(Debug, Default)]
pub struct CountingOptimizer<O> {
    inner: O,
    calls: AtomicUsize,
}

impl<O: WhatIfOptimizer> CountingOptimizer<O> {
    pub fn new(inner: O) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    /// Calls issued so far, successful or not.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn reset(&self) -> usize {
        self.calls.swap(0, Ordering::Relaxed)
    }

    pub fn inner(&self) -> &O {
        &self.inner
    }
}

impl<O: WhatIfOptimizer> WhatIfOptimizer for CountingOptimizer<O> {
    fn explain(
        &self,
        statement: &Statement,
        universe: &Universe,
        configuration: &IndexBitSet,
    ) -> Result<WhatIfPlan, OptimizerError> {
        let n = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        trace!("what-if call {} for {}", n, universe.describe(configuration));
        self.inner.explain(statement, universe, configuration)
    }

    fn explain_cost(
        &self,
        statement: &Statement,
        universe: &Universe,
        configuration: &IndexBitSet,
    ) -> Result<Cost, OptimizerError> {
        let n = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        trace!("what-if cost call {} for {}", n, universe.describe(configuration));
        self.inner.explain_cost(statement, universe, configuration)
    }
}
