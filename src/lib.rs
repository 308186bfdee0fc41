//! An in-memory octree over 3D integer points, with a planner that bulk loads
//! it at low height.
//!
//! The crate has three parts.
//!
//! # Order statistics tree
//!
//! [`OrderStatTree`] is a plain binary search tree where every node also
//! records the size of its subtree. The sizes make rank queries cheap: the
//! k-th smallest key is found by comparing k with the size of the left
//! subtree at every step, and a contiguous band of ranks can be extracted by
//! seeking to the lower rank and walking in order.
//!
//! The tree never rotates. Its height is a function of the insertion order
//! alone.
//!
//! [`PercentileIndex`] wraps the tree as a set of items and answers a single
//! question: which items remain after dropping the lowest x% and the highest
//! y%? [`SortedPercentiles`] answers the same question from a sorted vector.
//!
//! # Octree
//!
//! [`SpatialOctree`] stores one point per node. Each node splits space into
//! eight [`Octant`]s around its own key, and every child slot holds the points
//! of one octant. The octant code has one bit per axis, set iff the node's
//! coordinate is strictly greater than the candidate's:
//!
//! ```text
//! bit 2: node.x > p.x
//! bit 1: node.y > p.y
//! bit 0: node.z > p.z
//! ```
//!
//! Inserting an existing key replaces its item. There is no deletion.
//!
//! # Balanced bulk loading
//!
//! Like the order statistics tree, the octree does not rebalance. Feeding it
//! points in a bad order (sorted along a line, for example) produces a tree as
//! deep as the number of points.
//!
//! [`BalancedOrderPlanner`] computes a better order. At every step it picks a
//! point that is in the central band of the batch along all three axes, emits
//! it, splits the rest of the batch into eight buckets around it and repeats
//! on each bucket. Inserting the planned order gives each subtree an
//! approximate median as its root. [`SpatialOctree::bulk_load`] plans and
//! inserts in one go.
//!
//! The median is approximate. If no point lies in all three bands at once
//! (tiny batches, points along an axis), the batch is inserted in the order
//! given.
//!
//! # Example
//!
//! ```
//! use bee_tree::{Point, SpatialOctree};
//!
//! let items = (0..100).map(|i| (Point::new(i % 7, i % 11, i), i));
//! let tree = SpatialOctree::bulk_load(items)?;
//! assert_eq!(tree.len(), 100);
//! assert_eq!(tree.lookup(&Point::new(3, 3, 3))?, &3);
//! # Ok::<(), bee_tree::Error>(())
//! ```
mod balance;
mod error;
mod octree;
mod ostree;
mod percentile;
mod point;

pub use balance::{BalanceOptions, BalancedOrderPlanner, PercentileBackend};
pub use error::{Error, Result};
pub use octree::{BeeNode, Iter, SpatialOctree};
pub use ostree::{central_ranks, OrderStatTree, Range};
pub use percentile::{PercentileIndex, PercentileStore, SortedPercentiles};
pub use point::{Octant, Point};
