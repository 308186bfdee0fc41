//! Stores that answer "which items lie in the central band" queries.
//!
//! Two interchangeable designs implement [`PercentileStore`]:
//!
//! - [`PercentileIndex`] keeps the items in an [`OrderStatTree`] keyed by the
//!   item itself. Insertion, removal and band extraction are O(height).
//!   [`PercentileIndex::try_from_iter`] inserts medians first, so a freshly
//!   built index has logarithmic height whatever the input order.
//! - [`SortedPercentiles`] keeps a sorted vector and finds insertion points by
//!   binary search. Single insertions and removals shift elements and are
//!   O(n), band extraction is a slice.
use std::fmt::Debug;

use itertools::Itertools;

use crate::{
    error::{Error, Result},
    ostree::{central_ranks, OrderStatTree},
};

/// A set of distinct, totally ordered items that can report the items of a
/// contiguous band of ranks.
pub trait PercentileStore<T: Ord> {
    /// Add an item. Fails with [`Error::DuplicateItem`] if it is present.
    fn add(&mut self, item: T) -> Result<()>;

    /// Remove an item. Fails with [`Error::ItemNotFound`] if it is absent.
    fn remove(&mut self, item: &T) -> Result<()>;

    /// Items strictly inside the central `(100 - lower_pct - upper_pct)%`,
    /// in ascending order.
    ///
    /// The lowest `ceil(lower_pct * n / 100)` and the highest
    /// `ceil(upper_pct * n / 100)` items are excluded. An empty band is an
    /// empty vector.
    fn central_band(&self, lower_pct: f64, upper_pct: f64) -> Vec<&T>;

    fn contains(&self, item: &T) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Tree backed percentile store.
pub struct PercentileIndex<T> {
    tree: OrderStatTree<T, ()>,
}

impl<T> Default for PercentileIndex<T> {
    fn default() -> Self {
        Self {
            tree: OrderStatTree::default(),
        }
    }
}

impl<T: Ord + Debug> Debug for PercentileIndex<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set()
            .entries(self.tree.iter().map(|(item, _)| item))
            .finish()
    }
}

impl<T: Ord> PercentileIndex<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from distinct items, failing if any item repeats.
    ///
    /// The items are sorted and then inserted middle out, so the tree is
    /// balanced even when the input is already sorted.
    pub fn try_from_iter(items: impl IntoIterator<Item = T>) -> Result<Self> {
        let mut items = items.into_iter().collect::<Vec<_>>();
        items.sort_unstable();
        if items.iter().tuple_windows().any(|(a, b)| a == b) {
            return Err(Error::DuplicateItem);
        }
        let mut slots = items.into_iter().map(Some).collect::<Vec<_>>();
        let mut res = Self::new();
        let mut work = vec![0..slots.len()];
        while let Some(range) = work.pop() {
            if range.is_empty() {
                continue;
            }
            let mid = range.start + range.len() / 2;
            if let Some(item) = slots[mid].take() {
                res.add(item)?;
            }
            work.push(mid + 1..range.end);
            work.push(range.start..mid);
        }
        Ok(res)
    }

    /// The underlying order statistics tree.
    pub fn tree(&self) -> &OrderStatTree<T, ()> {
        &self.tree
    }
}

impl<T: Ord> PercentileStore<T> for PercentileIndex<T> {
    fn add(&mut self, item: T) -> Result<()> {
        self.tree.insert(item, ()).map_err(|e| match e {
            Error::DuplicateKey => Error::DuplicateItem,
            e => e,
        })
    }

    fn remove(&mut self, item: &T) -> Result<()> {
        self.tree.delete(item).map_err(|e| match e {
            Error::KeyNotFound => Error::ItemNotFound,
            e => e,
        })
    }

    fn central_band(&self, lower_pct: f64, upper_pct: f64) -> Vec<&T> {
        self.tree.percentile_range(lower_pct, upper_pct)
    }

    fn contains(&self, item: &T) -> bool {
        self.tree.contains(item)
    }

    fn len(&self) -> usize {
        self.tree.len()
    }
}

/// Sorted vector backed percentile store.
#[derive(Debug, Clone)]
pub struct SortedPercentiles<T> {
    store: Vec<T>,
}

impl<T> Default for SortedPercentiles<T> {
    fn default() -> Self {
        Self { store: Vec::new() }
    }
}

impl<T: Ord> SortedPercentiles<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_from_iter(items: impl IntoIterator<Item = T>) -> Result<Self> {
        let mut res = Self::new();
        for item in items {
            res.add(item)?;
        }
        Ok(res)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.store
    }
}

impl<T: Ord> PercentileStore<T> for SortedPercentiles<T> {
    fn add(&mut self, item: T) -> Result<()> {
        match self.store.binary_search(&item) {
            Ok(_) => Err(Error::DuplicateItem),
            Err(at) => {
                self.store.insert(at, item);
                Ok(())
            }
        }
    }

    fn remove(&mut self, item: &T) -> Result<()> {
        let at = self
            .store
            .binary_search(item)
            .map_err(|_| Error::ItemNotFound)?;
        self.store.remove(at);
        Ok(())
    }

    fn central_band(&self, lower_pct: f64, upper_pct: f64) -> Vec<&T> {
        match central_ranks(self.store.len(), lower_pct, upper_pct) {
            // ranks are 1-indexed
            Some(ranks) => self.store[*ranks.start() - 1..*ranks.end()].iter().collect(),
            None => Vec::new(),
        }
    }

    fn contains(&self, item: &T) -> bool {
        self.store.binary_search(item).is_ok()
    }

    fn len(&self) -> usize {
        self.store.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_are_item_flavoured() {
        let mut index = PercentileIndex::try_from_iter([3, 1, 2]).unwrap();
        assert_eq!(index.add(2), Err(Error::DuplicateItem));
        assert_eq!(index.remove(&9), Err(Error::ItemNotFound));
        index.remove(&1).unwrap();
        assert_eq!(index.len(), 2);

        let mut sorted = SortedPercentiles::try_from_iter([3, 1, 2]).unwrap();
        assert_eq!(sorted.add(2), Err(Error::DuplicateItem));
        assert_eq!(sorted.remove(&9), Err(Error::ItemNotFound));
        sorted.remove(&1).unwrap();
        assert_eq!(sorted.as_slice(), &[2, 3]);
    }

    #[test]
    fn sorted_input_builds_a_balanced_index() {
        let ascending = PercentileIndex::try_from_iter(0..1000).unwrap();
        let descending = PercentileIndex::try_from_iter((0..1000).rev()).unwrap();
        for index in [&ascending, &descending] {
            index.tree().assert_invariants().unwrap();
            assert_eq!(index.len(), 1000);
            assert_eq!(index.tree().height(), 10);
        }
        assert_eq!(
            PercentileIndex::try_from_iter([4, 1, 4]).err(),
            Some(Error::DuplicateItem)
        );
    }

    #[test]
    fn central_band_of_eight() {
        let items = [5, 0, 7, 3, 1, 6, 2, 4];
        let index = PercentileIndex::try_from_iter(items).unwrap();
        let sorted = SortedPercentiles::try_from_iter(items).unwrap();
        let expected = vec![&1, &2, &3, &4, &5, &6];
        assert_eq!(index.central_band(12.5, 12.5), expected);
        assert_eq!(sorted.central_band(12.5, 12.5), expected);
        assert!(index.central_band(50.0, 50.0).is_empty());
        assert!(sorted.central_band(50.0, 50.0).is_empty());
    }
}
