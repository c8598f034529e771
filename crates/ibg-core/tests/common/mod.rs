//! Shared helpers for the integration tests.

#![allow(dead_code)]

use ibg_core::{Index, InMemoryOptimizer, Statement, Universe};
use tracing_subscriber::EnvFilter;

/// Install a test-friendly subscriber. Set `RUST_LOG=ibg_core=trace` to see the
/// construction trace of a failing test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// `n` single-column indexes named `i0..i{n-1}` on `lineitem`.
pub fn universe(n: usize) -> Universe {
    Universe::new(
        (0..n)
            .map(|i| Index::new(format!("i{i}"), "lineitem", [format!("l_col{i}")]))
            .collect(),
    )
    .unwrap()
}

/// In-memory optimizer with plans given as (index positions, cost).
pub fn plan_list(stmt: &Statement, base_cost: f64, plans: &[(&[usize], f64)]) -> InMemoryOptimizer {
    let mut opt = InMemoryOptimizer::new();
    opt.add_statement(stmt, base_cost);
    for (positions, cost) in plans {
        opt.add_plan(stmt, positions.iter().map(|p| format!("i{p}")), *cost);
    }
    opt
}
