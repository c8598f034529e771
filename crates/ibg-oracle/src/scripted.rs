//! # Scripted (Replay) Optimizer
//!
//! Answers what-if calls from a table of recorded results instead of a live DBMS.
//! Each entry maps one statement and one exact configuration (by index name) to the
//! cost and used indexes the optimizer reported, or to a failure. Scripts are written
//! by hand in tests or captured from a real adapter and saved as JSON.
//!
//! ## JSON Format
//!
//! ```json
//! {
//!   "statements": [
//!     {
//!       "sql": "SELECT * FROM orders WHERE o_custkey = 7",
//!       "plans": [
//!         { "configuration": ["i_cust", "i_date"], "cost": 10.0, "used": ["i_cust"] },
//!         { "configuration": ["i_date"], "failure": "connection reset" }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! A configuration with no entry yields `OptimizerError::UnknownConfiguration`.

use ibg_core::{Cost, IndexBitSet, OptimizerError, Statement, Universe, WhatIfOptimizer, WhatIfPlan};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Errors loading or saving a script.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("invalid script: {0}")]
    Json(#[from] serde_json::Error),
}

/// One recorded answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptEntry {
    pub configuration: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub used: Vec<String>,
    /// When set, the call fails with this message instead of returning a plan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// Recorded answers for one statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementScript {
    pub sql: String,
    pub plans: Vec<ScriptEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ScriptFile {
    statements: Vec<StatementScript>,
}

type ConfigKey = BTreeSet<String>;

/// What-if optimizer replaying recorded answers.
#[derive(Debug, Clone, Default)]
pub struct ScriptedOptimizer {
    statements: HashMap<String, HashMap<ConfigKey, ScriptEntry>>,
}

impl ScriptedOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        let file: ScriptFile = serde_json::from_str(json)?;
        let mut optimizer = Self::new();
        for script in file.statements {
            for entry in script.plans {
                optimizer.insert(&script.sql, entry);
            }
        }
        Ok(optimizer)
    }

    /// Serialize the script, statements and entries sorted for stable output.
    pub fn to_json(&self) -> Result<String, ScriptError> {
        let mut statements: Vec<StatementScript> = self
            .statements
            .iter()
            .map(|(sql, entries)| {
                let mut plans: Vec<ScriptEntry> = entries.values().cloned().collect();
                plans.sort_by(|a, b| a.configuration.cmp(&b.configuration));
                StatementScript {
                    sql: sql.clone(),
                    plans,
                }
            })
            .collect();
        statements.sort_by(|a, b| a.sql.cmp(&b.sql));
        Ok(serde_json::to_string_pretty(&ScriptFile { statements })?)
    }

    /// Record the plan reported for `configuration`. Replaces any earlier entry.
    pub fn record(
        &mut self,
        statement: &Statement,
        configuration: &[&str],
        cost: f64,
        used: &[&str],
    ) {
        self.insert(
            &statement.sql,
            ScriptEntry {
                configuration: configuration.iter().map(|s| s.to_string()).collect(),
                cost: Some(cost),
                used: used.iter().map(|s| s.to_string()).collect(),
                failure: None,
            },
        );
    }

    /// Make calls for `configuration` fail with a tool error.
    pub fn fail_on(&mut self, statement: &Statement, configuration: &[&str], message: &str) {
        self.insert(
            &statement.sql,
            ScriptEntry {
                configuration: configuration.iter().map(|s| s.to_string()).collect(),
                cost: None,
                used: Vec::new(),
                failure: Some(message.to_string()),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.statements.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&mut self, sql: &str, entry: ScriptEntry) {
        let key: ConfigKey = entry.configuration.iter().cloned().collect();
        self.statements
            .entry(sql.to_string())
            .or_default()
            .insert(key, entry);
    }
}

impl WhatIfOptimizer for ScriptedOptimizer {
    fn explain(
        &self,
        statement: &Statement,
        universe: &Universe,
        configuration: &IndexBitSet,
    ) -> Result<WhatIfPlan, OptimizerError> {
        let entries = self
            .statements
            .get(&statement.sql)
            .ok_or_else(|| OptimizerError::InvalidStatement(statement.sql.clone()))?;

        let key: ConfigKey = configuration
            .iter()
            .filter_map(|p| universe.index(p))
            .map(|i| i.name.clone())
            .collect();
        let entry = entries
            .get(&key)
            .ok_or_else(|| {
                OptimizerError::UnknownConfiguration(universe.describe(configuration))
            })?;

        if let Some(message) = &entry.failure {
            return Err(OptimizerError::Tool(message.clone()));
        }
        let cost = entry
            .cost
            .ok_or_else(|| OptimizerError::Tool(format!("entry {key:?} records no cost")))?;

        let mut used = universe.empty_configuration();
        for name in &entry.used {
            let pos = universe.position_by_name(name).ok_or_else(|| {
                OptimizerError::Tool(format!("plan uses unknown index {name}"))
            })?;
            used.set(pos);
        }

        Ok(WhatIfPlan {
            cost: Cost::new(cost),
            used,
        })
    }
}
