//! A point octree.
//!
//! Every node is keyed by a [`Point`] and partitions the space around itself
//! into eight octants. A candidate point is routed into the child slot given
//! by [`Octant::of`] the node key and the candidate, with ties going to the
//! "not greater" side of each axis.
//!
//! The tree does not rebalance itself. Its height depends entirely on the
//! insertion order, which is why bulk loads go through a
//! [`BalancedOrderPlanner`] first.
use std::{collections::HashMap, fmt::Debug};

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::{
    balance::{BalanceOptions, BalancedOrderPlanner},
    error::{Error, Result},
    point::{Octant, Point},
};

type Slot<V> = Option<Box<BeeNode<V>>>;

/// A node of a [`SpatialOctree`].
pub struct BeeNode<V> {
    key: Point,
    item: V,
    size: usize,
    children: [Slot<V>; Octant::COUNT],
}

impl<V: Debug> Debug for BeeNode<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeeNode")
            .field("key", &self.key)
            .field("item", &self.item)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl<V> BeeNode<V> {
    fn leaf(key: Point, item: V) -> Self {
        BeeNode {
            key,
            item,
            size: 1,
            children: Default::default(),
        }
    }

    pub fn key(&self) -> &Point {
        &self.key
    }

    pub fn item(&self) -> &V {
        &self.item
    }

    /// Number of nodes in the subtree rooted here, including this one.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The child slot `point` would be routed into.
    pub fn compare(&self, point: &Point) -> Octant {
        Octant::of(&self.key, point)
    }

    pub fn child(&self, octant: Octant) -> Option<&BeeNode<V>> {
        self.children[octant.index()].as_deref()
    }

    /// The child whose subtree `point` would belong to.
    pub fn child_for(&self, point: &Point) -> Option<&BeeNode<V>> {
        self.child(self.compare(point))
    }

    /// Occupied child slots in slot order.
    pub fn children(&self) -> impl Iterator<Item = (Octant, &BeeNode<V>)> + '_ {
        Octant::ALL
            .into_iter()
            .filter_map(move |octant| self.child(octant).map(|child| (octant, child)))
    }

    /// True iff all eight child slots are occupied.
    ///
    /// This is a branching factor check only, it says nothing about balance.
    pub fn is_full_branch(&self) -> bool {
        self.children.iter().all(Option::is_some)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.iter().all(Option::is_none)
    }
}

/// A tree of [`BeeNode`]s keyed by 3D points.
pub struct SpatialOctree<V> {
    root: Slot<V>,
}

impl<V> Default for SpatialOctree<V> {
    fn default() -> Self {
        Self { root: None }
    }
}

impl<V> Drop for SpatialOctree<V> {
    fn drop(&mut self) {
        let mut stack: Vec<Box<BeeNode<V>>> = self.root.take().into_iter().collect();
        while let Some(mut node) = stack.pop() {
            stack.extend(node.children.iter_mut().filter_map(Option::take));
        }
    }
}

impl<V: Debug> Debug for SpatialOctree<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<V> SpatialOctree<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from distinct points so that it ends up with low height.
    ///
    /// The keys are ordered by a [`BalancedOrderPlanner`] with default
    /// options and inserted in exactly that order. A repeated key fails with
    /// [`Error::DuplicateItem`].
    pub fn bulk_load(items: impl IntoIterator<Item = (Point, V)>) -> Result<Self> {
        Self::bulk_load_with(BalanceOptions::default(), items)
    }

    /// Like [`SpatialOctree::bulk_load`], with explicit planner options.
    pub fn bulk_load_with(
        options: BalanceOptions,
        items: impl IntoIterator<Item = (Point, V)>,
    ) -> Result<Self> {
        let items = items.into_iter().collect::<Vec<_>>();
        let keys = items.iter().map(|(key, _)| *key).collect::<Vec<_>>();
        let order = BalancedOrderPlanner::with_options(options).order(&keys)?;
        let mut items = items.into_iter().collect::<HashMap<_, _>>();
        let mut res = Self::new();
        for key in order {
            let item = items.remove(&key).ok_or(Error::KeyNotFound)?;
            res.insert_or_update(key, item);
        }
        debug!(len = res.len(), height = res.height(), "bulk load");
        Ok(res)
    }

    pub fn len(&self) -> usize {
        self.root.as_ref().map_or(0, |root| root.size)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn root(&self) -> Option<&BeeNode<V>> {
        self.root.as_deref()
    }

    fn find_mut(&mut self, key: &Point) -> Option<&mut BeeNode<V>> {
        let mut current = self.root.as_deref_mut();
        while let Some(node) = current {
            if node.key == *key {
                return Some(node);
            }
            let octant = node.compare(key);
            current = node.children[octant.index()].as_deref_mut();
        }
        None
    }

    /// Insert `item` under `key`, or replace the item if `key` is present.
    ///
    /// Returns the replaced item. An overwrite leaves the structure and all
    /// subtree sizes untouched.
    pub fn insert_or_update(&mut self, key: Point, item: V) -> Option<V> {
        if let Some(node) = self.find_mut(&key) {
            trace!(%key, "overwrite");
            return Some(std::mem::replace(&mut node.item, item));
        }
        let mut depth = 0usize;
        let mut slot = &mut self.root;
        while let Some(node) = slot {
            node.size += 1;
            depth += 1;
            let octant = node.compare(&key);
            slot = &mut node.children[octant.index()];
        }
        trace!(%key, depth, "insert leaf");
        *slot = Some(Box::new(BeeNode::leaf(key, item)));
        None
    }

    pub fn lookup(&self, key: &Point) -> Result<&V> {
        let mut current = self.root.as_deref();
        while let Some(node) = current {
            if node.key == *key {
                return Ok(&node.item);
            }
            current = node.child_for(key);
        }
        Err(Error::KeyNotFound)
    }

    pub fn lookup_mut(&mut self, key: &Point) -> Result<&mut V> {
        self.find_mut(key)
            .map(|node| &mut node.item)
            .ok_or(Error::KeyNotFound)
    }

    pub fn contains(&self, key: &Point) -> bool {
        self.lookup(key).is_ok()
    }

    /// Number of nodes on the longest root to leaf path.
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut stack: SmallVec<[(&BeeNode<V>, usize); 32]> =
            self.root().map(|root| (root, 1)).into_iter().collect();
        while let Some((node, depth)) = stack.pop() {
            height = height.max(depth);
            stack.extend(node.children().map(|(_, child)| (child, depth + 1)));
        }
        height
    }

    /// Pre-order iterator, children visited in slot order.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter::new(self.root())
    }

    /// Check that every node routes its whole subtree into the right slots
    /// and that every stored subtree size is exact.
    pub fn assert_invariants(&self) -> Result<()> {
        let mut stack: SmallVec<[&BeeNode<V>; 32]> = self.root().into_iter().collect();
        while let Some(node) = stack.pop() {
            let actual = 1 + node.children().map(|(_, c)| c.size).sum::<usize>();
            if node.size != actual {
                return Err(Error::Invariant(format!(
                    "node {} records size {} but has {}",
                    node.key, node.size, actual
                )));
            }
            for (octant, child) in node.children() {
                if let Some((key, _)) =
                    Iter::new(Some(child)).find(|(key, _)| node.compare(key) != octant)
                {
                    return Err(Error::Invariant(format!(
                        "{} is in slot {:?} of {} but belongs in {:?}",
                        key,
                        octant,
                        node.key,
                        node.compare(key)
                    )));
                }
                stack.push(child);
            }
        }
        Ok(())
    }
}

/// Pre-order iterator over the entries of a [`SpatialOctree`].
pub struct Iter<'a, V> {
    stack: SmallVec<[&'a BeeNode<V>; 32]>,
}

impl<'a, V> Iter<'a, V> {
    fn new(root: Option<&'a BeeNode<V>>) -> Self {
        Iter {
            stack: root.into_iter().collect(),
        }
    }
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a Point, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // reversed so that slot 0 is popped first
        self.stack
            .extend(node.children.iter().rev().filter_map(|c| c.as_deref()));
        Some((&node.key, &node.item))
    }
}
