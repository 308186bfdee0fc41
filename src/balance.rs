//! Insertion order planning for low height octrees.
//!
//! A [`SpatialOctree`](crate::SpatialOctree) never rebalances, so its shape
//! is fixed by the order in which points arrive. [`BalancedOrderPlanner`]
//! computes an order in which every subtree root is an approximate 3D median
//! of the points below it.
//!
//! # Algorithm
//!
//! For a batch of points:
//!
//! 1. Fill three percentile stores: one with the points themselves (in
//!    lexicographic order), one with the distinct y coordinates and one with
//!    the distinct z coordinates.
//! 2. Take the central band of each store, by default the middle 75%.
//! 3. The pivot is the first point of the point band whose y and z
//!    coordinates are both in their bands. If there is none, the batch is
//!    emitted in its current order and this branch ends.
//! 4. Emit the pivot, split the remaining points into eight buckets by their
//!    [`Octant`] relative to the pivot and continue with each bucket, in slot
//!    order `000` to `111`.
//!
//! Buckets are processed depth first from an explicit worklist, so the
//! native stack depth does not grow with the batch.
use itertools::Itertools;
use tracing::{debug, trace};

use crate::{
    error::Result,
    percentile::{PercentileIndex, PercentileStore, SortedPercentiles},
    point::{Octant, Point},
};

/// Which [`PercentileStore`] the planner fills at every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PercentileBackend {
    /// [`PercentileIndex`], backed by an order statistics tree.
    #[default]
    Tree,
    /// [`SortedPercentiles`], backed by a sorted vector.
    SortedVec,
}

/// Options for a [`BalancedOrderPlanner`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceOptions {
    /// Percentage of the lowest ranks excluded from each band.
    pub lower_pct: f64,
    /// Percentage of the highest ranks excluded from each band.
    pub upper_pct: f64,
    pub backend: PercentileBackend,
}

impl Default for BalanceOptions {
    fn default() -> Self {
        Self {
            lower_pct: 12.5,
            upper_pct: 12.5,
            backend: PercentileBackend::Tree,
        }
    }
}

impl BalanceOptions {
    pub fn band(mut self, lower_pct: f64, upper_pct: f64) -> Self {
        self.lower_pct = lower_pct;
        self.upper_pct = upper_pct;
        self
    }

    pub fn backend(mut self, backend: PercentileBackend) -> Self {
        self.backend = backend;
        self
    }
}

/// Computes insertion orders that produce low octrees.
///
/// The planner keeps no state between calls.
#[derive(Debug, Clone, Default)]
pub struct BalancedOrderPlanner {
    options: BalanceOptions,
}

impl BalancedOrderPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: BalanceOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &BalanceOptions {
        &self.options
    }

    /// Order `batch` for insertion into a fresh octree.
    ///
    /// The result is a permutation of `batch`. The points must be distinct,
    /// a repeated point fails with [`Error::DuplicateItem`].
    ///
    /// [`Error::DuplicateItem`]: crate::Error::DuplicateItem
    pub fn order(&self, batch: &[Point]) -> Result<Vec<Point>> {
        let mut res = Vec::with_capacity(batch.len());
        let mut fallbacks = 0usize;
        let mut work = vec![batch.to_vec()];
        while let Some(current) = work.pop() {
            if current.is_empty() {
                continue;
            }
            let Some(pivot) = self.pivot(&current)? else {
                trace!(n = current.len(), "no pivot, keeping batch order");
                fallbacks += 1;
                res.extend(current);
                continue;
            };
            trace!(%pivot, n = current.len(), "pivot");
            res.push(pivot);
            // reversed so that bucket 000 is popped first
            work.extend(split(&current, &pivot).into_iter().rev());
        }
        debug!(n = batch.len(), fallbacks, "planned insertion order");
        Ok(res)
    }

    /// The approximate 3D median of `batch`, if one is found.
    fn pivot(&self, batch: &[Point]) -> Result<Option<Point>> {
        let BalanceOptions {
            lower_pct,
            upper_pct,
            ..
        } = self.options;
        let points = self.fill(batch.iter().copied())?;
        // repeated coordinates are normal, only distinct values are ranked
        let ys = self.fill(batch.iter().map(|p| p.y).unique())?;
        let zs = self.fill(batch.iter().map(|p| p.z).unique())?;
        let y_band = ys.central_band(lower_pct, upper_pct);
        let z_band = zs.central_band(lower_pct, upper_pct);
        let pivot = points
            .central_band(lower_pct, upper_pct)
            .into_iter()
            .find(|p| y_band.binary_search(&&p.y).is_ok() && z_band.binary_search(&&p.z).is_ok())
            .copied();
        Ok(pivot)
    }

    fn fill<T: Ord + 'static>(
        &self,
        items: impl IntoIterator<Item = T>,
    ) -> Result<Box<dyn PercentileStore<T>>> {
        let store: Box<dyn PercentileStore<T>> = match self.options.backend {
            PercentileBackend::Tree => Box::new(PercentileIndex::try_from_iter(items)?),
            PercentileBackend::SortedVec => Box::new(SortedPercentiles::try_from_iter(items)?),
        };
        Ok(store)
    }
}

/// Bucket every point except `pivot` by its octant relative to `pivot`.
fn split(batch: &[Point], pivot: &Point) -> [Vec<Point>; Octant::COUNT] {
    let mut buckets: [Vec<Point>; Octant::COUNT] = Default::default();
    for point in batch.iter().filter(|p| *p != pivot) {
        buckets[Octant::of(pivot, point).index()].push(*point);
    }
    buckets
}
