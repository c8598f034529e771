//! # Index Configurations as Bitsets
//!
//! A configuration is a subset of a statement's candidate-index universe. Every index
//! in the universe has a stable ordinal position, so a configuration is just the set
//! of positions that are "on". The graph keys its node cache by configuration, so
//! equality and hashing must depend only on which positions are set, never on how
//! many words happen to be allocated.
//!
//! ## Capacity
//!
//! A bitset is created with a capacity (normally the universe size). Setting a
//! position at or beyond the capacity is a caller bug and is caught by a debug
//! assertion only; this type sits on the hot path of every graph traversal. Reading a
//! position beyond the capacity answers `false`, and binary operations accept operands
//! of different capacities, which lets callers query with configurations that mention
//! indexes outside the universe.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

const WORD_BITS: usize = 64;

fn words_for(capacity: usize) -> usize {
    capacity.div_ceil(WORD_BITS)
}

/// A set of index positions.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct IndexBitSet {
    words: Vec<u64>,
    capacity: usize,
}

impl IndexBitSet {
    /// An empty configuration able to hold positions `0..capacity`.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            words: vec![0; words_for(capacity)],
            capacity,
        }
    }

    /// The configuration containing every position `0..capacity`.
    pub fn full(capacity: usize) -> Self {
        let mut set = Self::with_capacity(capacity);
        for (w, word) in set.words.iter_mut().enumerate() {
            let remaining = capacity - w * WORD_BITS;
            *word = if remaining >= WORD_BITS {
                u64::MAX
            } else {
                (1u64 << remaining) - 1
            };
        }
        set
    }

    pub fn from_positions(capacity: usize, positions: impl IntoIterator<Item = usize>) -> Self {
        let mut set = Self::with_capacity(capacity);
        for p in positions {
            set.set(p);
        }
        set
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set(&mut self, pos: usize) {
        debug_assert!(
            pos < self.capacity,
            "position {pos} out of range for capacity {}",
            self.capacity
        );
        self.words[pos / WORD_BITS] |= 1u64 << (pos % WORD_BITS);
    }

    pub fn unset(&mut self, pos: usize) {
        if let Some(word) = self.words.get_mut(pos / WORD_BITS) {
            *word &= !(1u64 << (pos % WORD_BITS));
        }
    }

    pub fn get(&self, pos: usize) -> bool {
        self.words
            .get(pos / WORD_BITS)
            .is_some_and(|w| w & (1u64 << (pos % WORD_BITS)) != 0)
    }

    /// Remove every position, keeping the capacity.
    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    pub fn cardinality(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Overwrite this set with the contents and capacity of `other`.
    pub fn copy_from(&mut self, other: &IndexBitSet) {
        self.words.clear();
        self.words.extend_from_slice(&other.words);
        self.capacity = other.capacity;
    }

    /// A copy of this set with `pos` removed.
    pub fn without(&self, pos: usize) -> IndexBitSet {
        let mut copy = self.clone();
        copy.unset(pos);
        copy
    }

    /// In-place union. Grows to the larger of the two capacities.
    pub fn union_with(&mut self, other: &IndexBitSet) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        self.capacity = self.capacity.max(other.capacity);
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a |= b;
        }
    }

    pub fn intersect_with(&mut self, other: &IndexBitSet) {
        for (i, a) in self.words.iter_mut().enumerate() {
            *a &= other.words.get(i).copied().unwrap_or(0);
        }
    }

    pub fn difference_with(&mut self, other: &IndexBitSet) {
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a &= !b;
        }
    }

    pub fn intersects(&self, other: &IndexBitSet) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(a, b)| a & b != 0)
    }

    /// True when every position of `self` is also in `other`.
    pub fn is_subset_of(&self, other: &IndexBitSet) -> bool {
        self.words.iter().enumerate().all(|(i, &a)| {
            let b = other.words.get(i).copied().unwrap_or(0);
            a & !b == 0
        })
    }

    pub fn contains_all(&self, other: &IndexBitSet) -> bool {
        other.is_subset_of(self)
    }

    /// Positions in ascending order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            words: &self.words,
            word_idx: 0,
            current: self.words.first().copied().unwrap_or(0),
        }
    }

    /// Words with trailing zero words stripped, the canonical form for Eq/Hash.
    fn significant_words(&self) -> &[u64] {
        let len = self
            .words
            .iter()
            .rposition(|&w| w != 0)
            .map_or(0, |i| i + 1);
        &self.words[..len]
    }
}

impl PartialEq for IndexBitSet {
    fn eq(&self, other: &Self) -> bool {
        self.significant_words() == other.significant_words()
    }
}

impl Eq for IndexBitSet {}

impl Hash for IndexBitSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant_words().hash(state);
    }
}

impl fmt::Debug for IndexBitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for IndexBitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (n, pos) in self.iter().enumerate() {
            if n > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{pos}")?;
        }
        write!(f, "}}")
    }
}

/// Ascending iterator over the positions of an [`IndexBitSet`].
pub struct Iter<'a> {
    words: &'a [u64],
    word_idx: usize,
    current: u64,
}

impl Iterator for Iter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        loop {
            if self.current != 0 {
                let bit = self.current.trailing_zeros() as usize;
                self.current &= self.current - 1;
                return Some(self.word_idx * WORD_BITS + bit);
            }
            self.word_idx += 1;
            self.current = *self.words.get(self.word_idx)?;
        }
    }
}

impl<'a> IntoIterator for &'a IndexBitSet {
    type Item = usize;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_set_get_unset() {
        let mut s = IndexBitSet::with_capacity(130);
        s.set(0);
        s.set(64);
        s.set(129);
        assert!(s.get(0) && s.get(64) && s.get(129));
        assert!(!s.get(1));
        assert!(!s.get(500));
        assert_eq!(s.cardinality(), 3);
        s.unset(64);
        assert!(!s.get(64));
        assert_eq!(s.iter().collect::<Vec<_>>(), vec![0, 129]);
    }

    #[test]
    fn test_full_has_exact_capacity() {
        let s = IndexBitSet::full(70);
        assert_eq!(s.cardinality(), 70);
        assert!(s.get(69));
        assert!(!s.get(70));
        assert_eq!(IndexBitSet::full(64).cardinality(), 64);
        assert!(IndexBitSet::full(0).is_empty());
    }

    #[test]
    fn test_equality_ignores_capacity() {
        let a = IndexBitSet::from_positions(4, [1, 3]);
        let b = IndexBitSet::from_positions(200, [1, 3]);
        assert_eq!(a, b);

        let mut seen = HashSet::new();
        seen.insert(a);
        assert!(seen.contains(&b));
    }

    #[test]
    fn test_subset_across_capacities() {
        let small = IndexBitSet::from_positions(3, [0, 2]);
        let big = IndexBitSet::from_positions(100, [0, 2, 99]);
        assert!(small.is_subset_of(&big));
        assert!(!big.is_subset_of(&small));
        assert!(big.contains_all(&small));
        assert!(IndexBitSet::with_capacity(5).is_subset_of(&small));
    }

    #[test]
    fn test_set_algebra() {
        let mut a = IndexBitSet::from_positions(8, [0, 1, 2]);
        let b = IndexBitSet::from_positions(8, [2, 3]);
        assert!(a.intersects(&b));

        let mut u = a.clone();
        u.union_with(&b);
        assert_eq!(u.iter().collect::<Vec<_>>(), vec![0, 1, 2, 3]);

        let mut i = a.clone();
        i.intersect_with(&b);
        assert_eq!(i.iter().collect::<Vec<_>>(), vec![2]);

        a.difference_with(&b);
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![0, 1]);
        assert!(!a.intersects(&b));
    }

    #[test]
    fn test_copy_from_replaces_contents() {
        let mut a = IndexBitSet::from_positions(8, [0, 7]);
        let b = IndexBitSet::from_positions(16, [9]);
        a.copy_from(&b);
        assert_eq!(a, b);
        assert_eq!(a.capacity(), 16);
        a.clear();
        assert!(a.is_empty());
        assert_eq!(a.capacity(), 16);
    }

    #[test]
    fn test_display() {
        let s = IndexBitSet::from_positions(10, [4, 1]);
        assert_eq!(s.to_string(), "{1, 4}");
        assert_eq!(s.without(4).to_string(), "{1}");
        assert_eq!(IndexBitSet::with_capacity(3).to_string(), "{}");
    }
}
