//! An unbalanced binary search tree augmented with subtree sizes.
//!
//! The size augmentation gives rank queries ([`OrderStatTree::kth_smallest`],
//! [`OrderStatTree::rank`]) and the extraction of a contiguous band of ranks
//! ([`OrderStatTree::percentile_range`]) in O(height).
//!
//! No rotations are ever performed. The height of the tree is a direct
//! function of the insertion order. All walks are loops or use an explicit
//! stack, so a degenerate (path shaped) tree does not exhaust the native
//! stack, not even on drop.
use std::{cmp::Ordering, fmt::Debug, ops::RangeInclusive};

use itertools::Itertools;
use smallvec::SmallVec;
use tracing::trace;

use crate::error::{Error, Result};

type Link<K, V> = Option<Box<Node<K, V>>>;

struct Node<K, V> {
    key: K,
    item: V,
    /// Number of nodes in the subtree rooted here, including this one.
    size: usize,
    left: Link<K, V>,
    right: Link<K, V>,
}

impl<K, V> Node<K, V> {
    fn leaf(key: K, item: V) -> Self {
        Node {
            key,
            item,
            size: 1,
            left: None,
            right: None,
        }
    }
}

#[inline(always)]
fn size<K, V>(link: &Link<K, V>) -> usize {
    link.as_ref().map_or(0, |node| node.size)
}

/// Unlinks the leftmost node below `link`, decrementing the sizes of the
/// nodes passed on the way down.
fn detach_min<K, V>(mut link: &mut Link<K, V>) -> Option<Box<Node<K, V>>> {
    while link.as_ref().is_some_and(|node| node.left.is_some()) {
        let Some(node) = link else { break };
        node.size -= 1;
        link = &mut node.left;
    }
    let mut min = link.take()?;
    *link = min.right.take();
    Some(min)
}

/// Rank bounds of the central band of `n` ranked elements.
///
/// Excludes the lowest `ceil(lower_pct * n / 100)` and the highest
/// `ceil(upper_pct * n / 100)` ranks. Returns the remaining 1-indexed ranks,
/// or `None` if nothing remains.
pub fn central_ranks(n: usize, lower_pct: f64, upper_pct: f64) -> Option<RangeInclusive<usize>> {
    let excluded = |pct: f64| (pct * n as f64 / 100.0).ceil().max(0.0) as usize;
    let lb = excluded(lower_pct).saturating_add(1);
    let ub = n.checked_sub(excluded(upper_pct))?;
    (lb <= ub).then_some(lb..=ub)
}

/// A binary search tree that knows the size of every subtree.
pub struct OrderStatTree<K, V> {
    root: Link<K, V>,
}

impl<K, V> Default for OrderStatTree<K, V> {
    fn default() -> Self {
        Self { root: None }
    }
}

impl<K, V> Drop for OrderStatTree<K, V> {
    fn drop(&mut self) {
        let mut stack: Vec<Box<Node<K, V>>> = self.root.take().into_iter().collect();
        while let Some(mut node) = stack.pop() {
            stack.extend(node.left.take());
            stack.extend(node.right.take());
        }
    }
}

impl<K: Ord + Debug, V: Debug> Debug for OrderStatTree<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Ord, V> OrderStatTree<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        size(&self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    fn find(&self, key: &K) -> Option<&Node<K, V>> {
        let mut current = self.root.as_deref();
        while let Some(node) = current {
            current = match key.cmp(&node.key) {
                Ordering::Less => node.left.as_deref(),
                Ordering::Greater => node.right.as_deref(),
                Ordering::Equal => return Some(node),
            };
        }
        None
    }

    /// Get the item stored under `key`.
    pub fn lookup(&self, key: &K) -> Result<&V> {
        self.find(key)
            .map(|node| &node.item)
            .ok_or(Error::KeyNotFound)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.find(key).is_some()
    }

    /// Insert a new key.
    ///
    /// Fails with [`Error::DuplicateKey`] if the key is already present, in
    /// which case the tree is not modified.
    pub fn insert(&mut self, key: K, item: V) -> Result<()> {
        if self.contains(&key) {
            return Err(Error::DuplicateKey);
        }
        let mut depth = 0usize;
        let mut link = &mut self.root;
        while let Some(node) = link {
            node.size += 1;
            depth += 1;
            link = if key < node.key {
                &mut node.left
            } else {
                &mut node.right
            };
        }
        trace!(depth, "insert leaf");
        *link = Some(Box::new(Node::leaf(key, item)));
        Ok(())
    }

    /// Delete `key` and return its item.
    ///
    /// A node with two children takes over the key and item of its in-order
    /// successor, whose original node is unlinked instead.
    pub fn delete(&mut self, key: &K) -> Result<V> {
        if !self.contains(key) {
            return Err(Error::KeyNotFound);
        }
        let mut link = &mut self.root;
        loop {
            let ord = match link.as_deref() {
                Some(node) => key.cmp(&node.key),
                None => return Err(Error::KeyNotFound),
            };
            if ord == Ordering::Equal {
                break;
            }
            let Some(node) = link else {
                return Err(Error::KeyNotFound);
            };
            node.size -= 1;
            link = if ord == Ordering::Less {
                &mut node.left
            } else {
                &mut node.right
            };
        }
        let Some(mut target) = link.take() else {
            return Err(Error::KeyNotFound);
        };
        let removed = match (target.left.take(), target.right.take()) {
            (None, None) => target.item,
            (Some(child), None) | (None, Some(child)) => {
                *link = Some(child);
                target.item
            }
            (Some(left), Some(right)) => {
                let mut right = Some(right);
                let Some(successor) = detach_min(&mut right) else {
                    unreachable!("right subtree of a full node is not empty")
                };
                trace!("replace with in-order successor");
                let Node {
                    key: successor_key,
                    item: successor_item,
                    ..
                } = *successor;
                let removed = std::mem::replace(&mut target.item, successor_item);
                target.key = successor_key;
                target.left = Some(left);
                target.right = right;
                target.size -= 1;
                *link = Some(target);
                removed
            }
        };
        Ok(removed)
    }

    /// The entry with 1-indexed rank `k`, or `None` if `k` is not in
    /// `1..=len`.
    pub fn select(&self, mut k: usize) -> Option<(&K, &V)> {
        let mut current = self.root.as_deref();
        while let Some(node) = current {
            let left_size = size(&node.left);
            current = match k.cmp(&(left_size + 1)) {
                Ordering::Equal => return Some((&node.key, &node.item)),
                Ordering::Less => node.left.as_deref(),
                Ordering::Greater => {
                    k -= left_size + 1;
                    node.right.as_deref()
                }
            };
        }
        None
    }

    /// The k-th smallest key, 1-indexed.
    pub fn kth_smallest(&self, k: usize) -> Option<&K> {
        self.select(k).map(|(key, _)| key)
    }

    /// The 1-indexed rank of `key`.
    pub fn rank(&self, key: &K) -> Result<usize> {
        let mut before = 0;
        let mut current = self.root.as_deref();
        while let Some(node) = current {
            current = match key.cmp(&node.key) {
                Ordering::Less => node.left.as_deref(),
                Ordering::Equal => return Ok(before + size(&node.left) + 1),
                Ordering::Greater => {
                    before += size(&node.left) + 1;
                    node.right.as_deref()
                }
            };
        }
        Err(Error::KeyNotFound)
    }

    /// Number of keys below `key`, or at most `key` if `inclusive`.
    fn count_below(&self, key: &K, inclusive: bool) -> usize {
        let mut count = 0;
        let mut current = self.root.as_deref();
        while let Some(node) = current {
            let below = match node.key.cmp(key) {
                Ordering::Less => true,
                Ordering::Equal => inclusive,
                Ordering::Greater => false,
            };
            current = if below {
                count += size(&node.left) + 1;
                node.right.as_deref()
            } else {
                node.left.as_deref()
            };
        }
        count
    }

    /// All keys whose rank lies in the central band.
    ///
    /// The lowest `ceil(lower_pct * n / 100)` and the highest
    /// `ceil(upper_pct * n / 100)` keys are excluded. The result is ascending
    /// and empty if the band is empty.
    pub fn percentile_range(&self, lower_pct: f64, upper_pct: f64) -> Vec<&K> {
        let Some(ranks) = central_ranks(self.len(), lower_pct, upper_pct) else {
            return Vec::new();
        };
        let (Some(lo), Some(hi)) = (
            self.kth_smallest(*ranks.start()),
            self.kth_smallest(*ranks.end()),
        ) else {
            return Vec::new();
        };
        self.range(lo, hi).map(|(key, _)| key).collect()
    }

    /// Ascending iterator over the entries with `lo <= key <= hi`.
    pub fn range(&self, lo: &K, hi: &K) -> Range<'_, K, V> {
        let remaining = self
            .count_below(hi, true)
            .saturating_sub(self.count_below(lo, false));
        Range::seek(self.root.as_deref(), Some(lo), remaining)
    }

    /// Ascending iterator over all entries.
    pub fn iter(&self) -> Range<'_, K, V> {
        Range::seek(self.root.as_deref(), None, self.len())
    }

    /// Number of nodes on the longest root to leaf path.
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut stack: SmallVec<[(&Node<K, V>, usize); 32]> =
            self.root.as_deref().map(|root| (root, 1)).into_iter().collect();
        while let Some((node, depth)) = stack.pop() {
            height = height.max(depth);
            stack.extend(node.left.as_deref().map(|c| (c, depth + 1)));
            stack.extend(node.right.as_deref().map(|c| (c, depth + 1)));
        }
        height
    }

    /// Check that keys are strictly ascending in order and that every
    /// stored subtree size is exact.
    pub fn assert_invariants(&self) -> Result<()>
    where
        K: Debug,
    {
        let mut stack: SmallVec<[&Node<K, V>; 32]> = self.root.as_deref().into_iter().collect();
        while let Some(node) = stack.pop() {
            let actual = 1 + size(&node.left) + size(&node.right);
            if node.size != actual {
                return Err(Error::Invariant(format!(
                    "node {:?} records size {} but has {}",
                    node.key, node.size, actual
                )));
            }
            stack.extend(node.left.as_deref());
            stack.extend(node.right.as_deref());
        }
        if let Some((a, b)) = self
            .iter()
            .map(|(key, _)| key)
            .tuple_windows()
            .find(|(a, b)| a >= b)
        {
            return Err(Error::Invariant(format!(
                "keys out of order: {:?} before {:?}",
                a, b
            )));
        }
        Ok(())
    }
}

/// In-order iterator over a contiguous run of entries.
pub struct Range<'a, K, V> {
    stack: SmallVec<[&'a Node<K, V>; 32]>,
    remaining: usize,
}

impl<'a, K: Ord, V> Range<'a, K, V> {
    /// Position the iterator at the first entry not below `lo`.
    fn seek(root: Option<&'a Node<K, V>>, lo: Option<&K>, remaining: usize) -> Self {
        let mut res = Range {
            stack: SmallVec::new(),
            remaining,
        };
        let mut current = root;
        while let Some(node) = current {
            if lo.is_some_and(|lo| node.key < *lo) {
                current = node.right.as_deref();
            } else {
                res.stack.push(node);
                current = node.left.as_deref();
            }
        }
        res
    }
}

impl<'a, K, V> Iterator for Range<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.stack.pop()?;
        self.remaining -= 1;
        let mut current = node.right.as_deref();
        while let Some(next) = current {
            self.stack.push(next);
            current = next.left.as_deref();
        }
        Some((&node.key, &node.item))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, V> ExactSizeIterator for Range<'a, K, V> {}

#[cfg(test)]
mod tests {
    use rand::{rngs::SmallRng, seq::SliceRandom, SeedableRng};

    use super::*;

    fn tree_of(keys: &[i64]) -> OrderStatTree<i64, String> {
        let mut tree = OrderStatTree::new();
        for key in keys {
            tree.insert(*key, key.to_string()).unwrap();
        }
        tree
    }

    #[test]
    fn central_ranks_bounds() {
        assert_eq!(central_ranks(50, 15.0, 66.0), Some(9..=17));
        assert_eq!(central_ranks(8, 12.5, 12.5), Some(2..=7));
        assert_eq!(central_ranks(10, 0.0, 0.0), Some(1..=10));
        assert_eq!(central_ranks(1, 12.5, 12.5), None);
        assert_eq!(central_ranks(0, 0.0, 0.0), None);
        assert_eq!(central_ranks(4, 60.0, 60.0), None);
    }

    #[test]
    fn percentile_range_of_shuffled_keys() {
        let mut keys = (0..50).collect::<Vec<i64>>();
        keys.shuffle(&mut SmallRng::seed_from_u64(7));
        let tree = tree_of(&keys);
        let band = tree.percentile_range(15.0, 66.0);
        assert_eq!(band.len(), 9);
        assert_eq!(
            band.into_iter().copied().collect::<Vec<_>>(),
            (8..=16).collect::<Vec<_>>()
        );
    }

    #[test]
    fn delete_all_shapes() {
        // leaves, single child splices and a two child replacement
        let mut tree = tree_of(&[50, 30, 70, 20, 40, 10, 35, 45]);
        assert_eq!(tree.delete(&10).unwrap(), "10");
        tree.assert_invariants().unwrap();
        assert_eq!(tree.delete(&20).unwrap(), "20");
        tree.assert_invariants().unwrap();
        assert_eq!(tree.delete(&30).unwrap(), "30");
        tree.assert_invariants().unwrap();
        assert_eq!(tree.delete(&50).unwrap(), "50");
        tree.assert_invariants().unwrap();
        assert_eq!(tree.delete(&70).unwrap(), "70");
        tree.assert_invariants().unwrap();
        assert_eq!(
            tree.iter().map(|(k, _)| *k).collect::<Vec<_>>(),
            vec![35, 40, 45]
        );
        assert_eq!(tree.delete(&70), Err(Error::KeyNotFound));
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn duplicate_insert_leaves_tree_unchanged() {
        let mut tree = tree_of(&[2, 1, 3]);
        assert_eq!(tree.insert(1, "x".into()), Err(Error::DuplicateKey));
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.lookup(&1).unwrap(), "1");
        tree.assert_invariants().unwrap();
    }

    #[test]
    fn degenerate_path_does_not_overflow() {
        let mut tree = OrderStatTree::new();
        for key in 0..10_000u32 {
            tree.insert(key, ()).unwrap();
        }
        assert_eq!(tree.kth_smallest(10_000), Some(&9_999));
        assert_eq!(tree.rank(&1_234), Ok(1_235));
        assert_eq!(tree.percentile_range(50.0, 49.0).len(), 100);
        assert_eq!(tree.height(), 10_000);
        tree.assert_invariants().unwrap();
    }
}
