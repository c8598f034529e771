//! # Candidate Indexes and Statements
//!
//! The metadata model proper (schemas, tables, columns) lives outside this crate.
//! What the graph needs is much smaller: an identity for each candidate index so that
//! it can be given a stable ordinal position, and the text of the statement being
//! costed so that it can be handed back to the optimizer.

use crate::bitset::IndexBitSet;
use crate::error::{IbgError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A candidate index: a column list on a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
}

impl Index {
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ON {}({})", self.name, self.table, self.columns.join(", "))
    }
}

/// One workload statement. The text is opaque to the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Statement {
    pub sql: String,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into() }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)
    }
}

/// The ordered candidate indexes of one statement.
///
/// Position `i` of every [`IndexBitSet`] built against this universe refers to
/// `indexes[i]`. The universe is fixed for the lifetime of a graph. Index names are
/// unique within a universe, since optimizers report used indexes by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<Index>", into = "Vec<Index>")]
pub struct Universe {
    indexes: Vec<Index>,
    by_name: HashMap<String, usize>,
}

impl TryFrom<Vec<Index>> for Universe {
    type Error = IbgError;

    fn try_from(indexes: Vec<Index>) -> Result<Self> {
        Universe::new(indexes)
    }
}

impl From<Universe> for Vec<Index> {
    fn from(universe: Universe) -> Self {
        universe.indexes
    }
}

impl Universe {
    pub fn new(indexes: Vec<Index>) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(indexes.len());
        for (pos, index) in indexes.iter().enumerate() {
            if by_name.insert(index.name.clone(), pos).is_some() {
                return Err(IbgError::DuplicateIndex(index.to_string()));
            }
        }
        Ok(Self { indexes, by_name })
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    pub fn index(&self, pos: usize) -> Option<&Index> {
        self.indexes.get(pos)
    }

    /// Position of `index`. An index sharing only its name with a member is not in
    /// the universe.
    pub fn position(&self, index: &Index) -> Option<usize> {
        self.position_by_name(&index.name)
            .filter(|&pos| self.indexes[pos] == *index)
    }

    pub fn position_by_name(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// The configuration holding every index of the universe.
    pub fn full_configuration(&self) -> IndexBitSet {
        IndexBitSet::full(self.len())
    }

    pub fn empty_configuration(&self) -> IndexBitSet {
        IndexBitSet::with_capacity(self.len())
    }

    /// Build a configuration from index identities. Indexes outside the universe
    /// are skipped.
    pub fn configuration<'a>(
        &self,
        indexes: impl IntoIterator<Item = &'a Index>,
    ) -> IndexBitSet {
        let mut config = self.empty_configuration();
        for pos in indexes.into_iter().filter_map(|i| self.position(i)) {
            config.set(pos);
        }
        config
    }

    /// Render a configuration with index names, e.g. `{idx_a, idx_c}`.
    pub fn describe(&self, configuration: &IndexBitSet) -> String {
        let names: Vec<&str> = configuration
            .iter()
            .map(|p| self.index(p).map_or("?", |i| i.name.as_str()))
            .collect();
        format!("{{{}}}", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx(name: &str, col: &str) -> Index {
        Index::new(name, "orders", [col])
    }

    #[test]
    fn test_positions_follow_order() {
        let u = Universe::new(vec![idx("a", "o_custkey"), idx("b", "o_orderdate")]);
        let u = u.unwrap();
        assert_eq!(u.len(), 2);
        assert_eq!(u.position(&idx("b", "o_orderdate")), Some(1));
        assert_eq!(u.position(&idx("z", "o_comment")), None);
        assert_eq!(u.position_by_name("b"), Some(1));
        // Same name, different columns.
        assert_eq!(u.position(&idx("b", "o_comment")), None);
        assert_eq!(u.full_configuration().cardinality(), 2);
    }

    #[test]
    fn test_duplicate_rejected() {
        let err = Universe::new(vec![idx("a", "x"), idx("a", "x")]).unwrap_err();
        assert!(matches!(err, IbgError::DuplicateIndex(_)));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let err = Universe::new(vec![idx("a", "o_custkey"), idx("a", "o_orderdate")]);
        assert!(matches!(err, Err(IbgError::DuplicateIndex(_))));
    }

    #[test]
    fn test_configuration_and_describe() {
        let a = idx("a", "x");
        let b = idx("b", "y");
        let outside = idx("c", "z");
        let u = Universe::new(vec![a.clone(), b.clone()]).unwrap();
        let config = u.configuration([&b, &outside]);
        assert_eq!(config.iter().collect::<Vec<_>>(), vec![1]);
        assert_eq!(u.describe(&u.full_configuration()), "{a, b}");
        assert_eq!(b.to_string(), "b ON orders(y)");
    }
}
