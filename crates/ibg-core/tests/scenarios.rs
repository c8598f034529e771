//! End-to-end construction scenarios against scripted optimizers.
//!
//! Each test records the exact what-if answers a statement would get, builds the
//! graph through a call-counting wrapper, and checks both the resulting graph and the
//! number of optimizer calls it took.

mod common;

use ibg_core::*;
use ibg_oracle::{CountingOptimizer, ScriptedOptimizer};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const SQL: &str =
    "SELECT o_orderkey FROM orders WHERE o_custkey = 42 AND o_orderdate > DATE '1995-01-01'";

fn two_index_universe() -> Universe {
    Universe::new(vec![
        Index::new("IdxA", "orders", ["o_custkey"]),
        Index::new("IdxB", "orders", ["o_orderdate"]),
    ])
    .unwrap()
}

fn three_index_universe() -> Universe {
    Universe::new(vec![
        Index::new("IdxA", "orders", ["o_custkey"]),
        Index::new("IdxB", "orders", ["o_orderdate"]),
        Index::new("IdxC", "orders", ["o_totalprice"]),
    ])
    .unwrap()
}

/// The plan uses IdxA only; without it the statement falls back to a scan.
fn scenario_a_script(stmt: &Statement) -> ScriptedOptimizer {
    let mut opt = ScriptedOptimizer::new();
    opt.record(stmt, &["IdxA", "IdxB"], 10.0, &["IdxA"]);
    opt.record(stmt, &["IdxA"], 10.0, &["IdxA"]);
    opt.record(stmt, &["IdxB"], 20.0, &[]);
    opt.record(stmt, &[], 20.0, &[]);
    opt
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_single_used_index() {
    common::init_tracing();
    let stmt = Statement::new(SQL);
    let opt = Arc::new(CountingOptimizer::new(scenario_a_script(&stmt)));

    let g = construct(opt.clone(), stmt, two_index_universe()).unwrap();
    println!("{g}");

    let root = g.root();
    assert_eq!(root.configuration, IndexBitSet::full(2));
    assert_eq!(root.cost, Cost::new(10.0));
    assert_eq!(root.used, IndexBitSet::from_positions(2, [0]));
    // IdxB is unused, so the only edge removes IdxA.
    assert_eq!(root.edges.len(), 1);
    assert_eq!(root.edges[0].removed, 0);

    let Child::Node(child) = root.edges[0].child else {
        panic!("root edge left pending");
    };
    let child = g.node(child);
    assert_eq!(child.configuration, IndexBitSet::from_positions(2, [1]));
    assert_eq!(child.cost, Cost::new(20.0));
    assert!(child.is_terminal());

    assert_eq!(g.node_count(), 2);
    assert_eq!(g.empty_cost(), Cost::new(20.0));
    // Root, {IdxB}, then the separate empty-configuration call.
    assert_eq!(opt.calls(), 3);
    assert_eq!(g.whatif_calls(), 3);
    assert!(g.is_complete());
}

#[test]
fn test_find_on_superset_uses_root_without_calls() {
    let stmt = Statement::new(SQL);
    let opt = Arc::new(CountingOptimizer::new(scenario_a_script(&stmt)));
    let g = construct(opt.clone(), stmt, two_index_universe()).unwrap();
    let calls = opt.calls();

    // Position 2 is not part of the universe.
    let query = IndexBitSet::from_positions(3, [0, 1, 2]);
    let r = find(&g, &query).unwrap().unwrap();
    assert_eq!(r.node, g.root().id);
    assert_eq!(r.cost, Cost::new(10.0));
    assert_eq!(opt.calls(), calls);
}

#[test]
fn test_oracle_failure_aborts_construction() {
    common::init_tracing();
    let stmt = Statement::new(SQL);
    let mut script = ScriptedOptimizer::new();
    script.record(&stmt, &["IdxA", "IdxB", "IdxC"], 5.0, &["IdxA", "IdxB"]);
    script.record(&stmt, &["IdxB", "IdxC"], 12.0, &["IdxB"]);
    script.record(&stmt, &["IdxA", "IdxC"], 9.0, &["IdxA"]);
    script.fail_on(&stmt, &["IdxC"], "lost connection to server");
    script.record(&stmt, &[], 40.0, &[]);
    let opt = Arc::new(CountingOptimizer::new(script));

    let (configuration, source) = match construct(opt.clone(), stmt, three_index_universe()) {
        Err(IbgError::OracleFailure { configuration, source }) => (configuration, source),
        other => panic!("expected an oracle failure, got {other:?}"),
    };
    assert_eq!(configuration, IndexBitSet::from_positions(3, [2]));
    assert_eq!(source, OptimizerError::Tool("lost connection to server".into()));
    // Root, both first-level children, then the failing call. No empty-cost call.
    assert_eq!(opt.calls(), 4);
}

#[test]
fn test_shared_child_is_one_node() {
    let stmt = Statement::new(SQL);
    let mut script = ScriptedOptimizer::new();
    script.record(&stmt, &["IdxA", "IdxB"], 5.0, &["IdxA", "IdxB"]);
    script.record(&stmt, &["IdxB"], 12.0, &["IdxB"]);
    script.record(&stmt, &["IdxA"], 9.0, &["IdxA"]);
    script.record(&stmt, &[], 40.0, &[]);
    let opt = Arc::new(CountingOptimizer::new(script));

    let g = construct(opt.clone(), stmt, two_index_universe()).unwrap();
    assert_eq!(g.node_count(), 4);

    let empty = g.node_for(&IndexBitSet::with_capacity(2)).unwrap().id;
    let parents: Vec<_> = g
        .nodes()
        .iter()
        .filter(|n| n.edges.iter().any(|e| e.child == Child::Node(empty)))
        .map(|n| n.configuration.cardinality())
        .collect();
    assert_eq!(parents, vec![1, 1]);

    // Every call produced a distinct node; the empty cost reused the empty node.
    assert_eq!(opt.calls(), g.node_count());
    assert_eq!(g.empty_cost(), Cost::new(40.0));
}

// ---------------------------------------------------------------------------
// Misbehaving optimizers
// ---------------------------------------------------------------------------

#[test]
fn test_used_outside_configuration_rejected() {
    let stmt = Statement::new(SQL);
    let mut script = ScriptedOptimizer::new();
    script.record(&stmt, &["IdxA", "IdxB"], 5.0, &["IdxA"]);
    // Misbehaving optimizer: claims to use IdxA after IdxA was removed.
    script.record(&stmt, &["IdxB"], 8.0, &["IdxA"]);

    let err = construct(Arc::new(script), stmt, two_index_universe()).unwrap_err();
    assert!(matches!(err, IbgError::UsedNotSubset { .. }));
    assert!(err.is_assumption_violated());
}

#[test]
fn test_non_monotonic_optimizer() {
    let stmt = Statement::new(SQL);
    let mut script = ScriptedOptimizer::new();
    script.record(&stmt, &["IdxA", "IdxB"], 30.0, &["IdxA"]);
    script.record(&stmt, &["IdxB"], 25.0, &[]);
    script.record(&stmt, &[], 50.0, &[]);
    let script = Arc::new(script);

    let strict = IbgConstructor::new(script.clone(), ConstructionConfig::default());
    let err = strict
        .construct(Statement::new(SQL), two_index_universe())
        .unwrap_err();
    let (parent_cost, child_cost) = match err {
        IbgError::NonMonotonic {
            parent_cost,
            child_cost,
            ..
        } => (parent_cost, child_cost),
        other => panic!("expected a monotonicity violation, got {other:?}"),
    };
    assert_eq!(parent_cost, Cost::new(30.0));
    assert_eq!(child_cost, Cost::new(25.0));

    let lenient = IbgConstructor::new(
        script,
        ConstructionConfig {
            check_monotonicity: false,
            ..ConstructionConfig::default()
        },
    );
    let g = lenient.construct(stmt, two_index_universe()).unwrap();
    assert_eq!(g.node_count(), 2);
}

#[test]
fn test_unknown_statement_is_oracle_failure() {
    let err = construct(
        Arc::new(ScriptedOptimizer::new()),
        Statement::new("SELECT 1"),
        two_index_universe(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        IbgError::OracleFailure {
            source: OptimizerError::InvalidStatement(_),
            ..
        }
    ));
    assert!(!err.is_assumption_violated());
}
