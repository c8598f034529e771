//! # What-If Optimizer Adapters
//!
//! This crate provides `WhatIfOptimizer` implementations that sit outside the graph
//! engine. The engine only knows the trait; adapters decide where answers come from.
//!
//! - **`ScriptedOptimizer`**: Replays recorded what-if answers, loadable from JSON.
//!   Used to reproduce a construction offline and to inject optimizer failures.
//! - **`CountingOptimizer`**: Wraps any optimizer and counts the calls made through it.

pub mod counting;
pub mod scripted;

pub use counting::CountingOptimizer;
pub use scripted::{ScriptEntry, ScriptError, ScriptedOptimizer, StatementScript};
