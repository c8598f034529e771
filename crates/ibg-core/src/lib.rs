//! # ibg-core: Index Benefit Graphs
//!
//! This crate builds and queries Index Benefit Graphs (IBGs), the structure an index
//! advisor uses to learn what a statement would cost under any subset of its candidate
//! indexes without asking the optimizer about every subset.
//!
//! An IBG is a DAG of configurations. Each node caches one what-if result (cost and
//! used indexes); each edge removes one used index. Because indexes a plan ignores are
//! never removed, the graph stays proportional to the indexes that matter, and any
//! configuration's cost can be read off the node that covers it.
//!
//! ## Module Overview
//!
//! - **`bitset`**: `IndexBitSet`, the configuration representation.
//! - **`cost`**: The comparable cost value reported by optimizers.
//! - **`universe`**: Candidate indexes, their ordinal positions, and statements.
//! - **`optimizer`**: The `WhatIfOptimizer` trait and an in-memory model optimizer.
//! - **`graph`**: The node arena and the `IndexBenefitGraph` itself.
//! - **`constructor`**: Sequential, parallel, budgeted and lazy graph construction.
//! - **`finder`**: Covering-node search and benefit queries.
//! - **`error`**: Optimizer and graph error types.

pub mod bitset;
pub mod constructor;
pub mod cost;
pub mod error;
pub mod finder;
pub mod graph;
pub mod optimizer;
pub mod universe;

pub use bitset::IndexBitSet;
pub use constructor::{construct, ConstructionConfig, IbgConstructor};
pub use cost::Cost;
pub use error::{IbgError, OptimizerError, Result};
pub use finder::{benefit, find, find_cost, FindResult};
pub use graph::{Child, ConstructionStats, Edge, IndexBenefitGraph, Node, NodeId};
pub use optimizer::{InMemoryOptimizer, WhatIfOptimizer, WhatIfPlan};
pub use universe::{Index, Statement, Universe};
