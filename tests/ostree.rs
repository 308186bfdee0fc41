use std::collections::BTreeSet;

use bee_tree::{Error, OrderStatTree, PercentileIndex, PercentileStore, SortedPercentiles};
use prop::sample::SizeRange;
use proptest::prelude::*;
use rand::{rngs::SmallRng, seq::SliceRandom, SeedableRng};
use test_strategy::proptest;
use testresult::TestResult;

/// Distinct keys in insertion order.
fn keys_with_opts(
    k: impl Strategy<Value = i64>,
    s: impl Into<SizeRange>,
) -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(k, s).prop_map(|mut keys| {
        let mut seen = BTreeSet::new();
        keys.retain(|k| seen.insert(*k));
        keys
    })
}

fn keys() -> impl Strategy<Value = Vec<i64>> {
    keys_with_opts(-1000..1000i64, 0..200usize)
}

fn tree_of(keys: &[i64]) -> TestResult<OrderStatTree<i64, u64>> {
    let mut tree = OrderStatTree::new();
    for key in keys {
        tree.insert(*key, key.unsigned_abs())?;
    }
    Ok(tree)
}

fn sorted(keys: &[i64]) -> Vec<i64> {
    let mut res = keys.to_vec();
    res.sort();
    res
}

/// Integer version of the band length, `max(0, n - ceil(x*n/100) - ceil(y*n/100))`.
fn band_len(n: usize, x: usize, y: usize) -> usize {
    let excluded = |pct: usize| (pct * n).div_ceil(100);
    n.saturating_sub(excluded(x) + excluded(y))
}

/// Inserting distinct keys keeps the sizes exact and the in order walk
/// strictly ascending.
fn tree_creation_impl(keys: Vec<i64>) -> TestResult<()> {
    let tree = tree_of(&keys)?;
    tree.assert_invariants()?;
    assert_eq!(tree.len(), keys.len());
    assert_eq!(tree.is_empty(), keys.is_empty());
    let actual = tree.iter().map(|(k, _)| *k).collect::<Vec<_>>();
    assert_eq!(actual, sorted(&keys));
    for key in &keys {
        assert_eq!(tree.lookup(key)?, &key.unsigned_abs());
    }
    Ok(())
}

/// `kth_smallest` and `rank` agree with a sorted copy of the keys.
fn tree_select_impl(keys: Vec<i64>) -> TestResult<()> {
    let tree = tree_of(&keys)?;
    let expected = sorted(&keys);
    for (i, key) in expected.iter().enumerate() {
        assert_eq!(tree.kth_smallest(i + 1), Some(key));
        assert_eq!(tree.rank(key)?, i + 1);
    }
    assert_eq!(tree.kth_smallest(0), None);
    assert_eq!(tree.kth_smallest(keys.len() + 1), None);
    Ok(())
}

/// `percentile_range` returns exactly the central ranks, ascending.
fn tree_percentile_range_impl(keys: Vec<i64>, x: usize, y: usize) -> TestResult<()> {
    let tree = tree_of(&keys)?;
    let n = keys.len();
    let actual = tree
        .percentile_range(x as f64, y as f64)
        .into_iter()
        .copied()
        .collect::<Vec<_>>();
    assert_eq!(actual.len(), band_len(n, x, y));
    let skip = (x * n).div_ceil(100);
    let expected = sorted(&keys)
        .into_iter()
        .skip(skip)
        .take(band_len(n, x, y))
        .collect::<Vec<_>>();
    assert_eq!(actual, expected);
    Ok(())
}

/// Deleting a subset leaves exactly the other keys, with exact sizes.
fn tree_delete_impl(keys: Vec<i64>, mask: Vec<bool>) -> TestResult<()> {
    let mut tree = tree_of(&keys)?;
    let mut remaining = BTreeSet::new();
    for (key, delete) in keys.iter().zip(mask.iter().chain(std::iter::repeat(&false))) {
        if *delete {
            assert_eq!(tree.delete(key)?, key.unsigned_abs());
            assert_eq!(tree.delete(key), Err(Error::KeyNotFound));
        } else {
            remaining.insert(*key);
        }
    }
    tree.assert_invariants()?;
    assert_eq!(tree.len(), remaining.len());
    let actual = tree.iter().map(|(k, _)| *k).collect::<Vec<_>>();
    assert_eq!(actual, remaining.into_iter().collect::<Vec<_>>());
    Ok(())
}

/// `range` yields exactly the keys in the closed interval.
fn tree_range_impl(keys: Vec<i64>, lo: i64, hi: i64) -> TestResult<()> {
    let tree = tree_of(&keys)?;
    let range = tree.range(&lo, &hi);
    let len = range.len();
    let actual = range.map(|(k, _)| *k).collect::<Vec<_>>();
    let expected = sorted(&keys)
        .into_iter()
        .filter(|k| lo <= *k && *k <= hi)
        .collect::<Vec<_>>();
    assert_eq!(len, expected.len());
    assert_eq!(actual, expected);
    Ok(())
}

/// Both percentile stores report the same band.
fn percentile_backends_impl(keys: Vec<i64>, x: usize, y: usize) -> TestResult<()> {
    let index = PercentileIndex::try_from_iter(keys.iter().copied())?;
    let sorted = SortedPercentiles::try_from_iter(keys.iter().copied())?;
    assert_eq!(index.len(), sorted.len());
    assert_eq!(
        index.central_band(x as f64, y as f64),
        sorted.central_band(x as f64, y as f64)
    );
    Ok(())
}

#[proptest]
fn prop_tree_creation(#[strategy(keys())] keys: Vec<i64>) {
    tree_creation_impl(keys).unwrap();
}

#[proptest]
fn prop_tree_select(#[strategy(keys())] keys: Vec<i64>) {
    tree_select_impl(keys).unwrap();
}

#[proptest]
fn prop_tree_percentile_range(
    #[strategy(keys())] keys: Vec<i64>,
    #[strategy(0..100usize)] x: usize,
    #[strategy(0..100usize)] y: usize,
) {
    tree_percentile_range_impl(keys, x, y).unwrap();
}

#[proptest]
fn prop_tree_delete(
    #[strategy(keys())] keys: Vec<i64>,
    #[strategy(prop::collection::vec(any::<bool>(), 0..200))] mask: Vec<bool>,
) {
    tree_delete_impl(keys, mask).unwrap();
}

#[proptest]
fn prop_tree_range(
    #[strategy(keys())] keys: Vec<i64>,
    #[strategy(-1100..1100i64)] lo: i64,
    #[strategy(-1100..1100i64)] hi: i64,
) {
    tree_range_impl(keys, lo, hi).unwrap();
}

#[proptest]
fn prop_percentile_backends(
    #[strategy(keys())] keys: Vec<i64>,
    #[strategy(0..60usize)] x: usize,
    #[strategy(0..60usize)] y: usize,
) {
    percentile_backends_impl(keys, x, y).unwrap();
}

#[test]
fn test_percentile_range_15_66() -> TestResult<()> {
    let mut rng = SmallRng::seed_from_u64(0);
    for _ in 0..10 {
        let mut keys = (0..50).collect::<Vec<i64>>();
        keys.shuffle(&mut rng);
        let tree = tree_of(&keys)?;
        // ranks ceil(7.5) + 1 = 9 to 50 - ceil(33) = 17
        let band = tree.percentile_range(15.0, 66.0);
        assert_eq!(
            band.into_iter().copied().collect::<Vec<_>>(),
            (8..=16).collect::<Vec<_>>()
        );
    }
    Ok(())
}

#[test]
fn test_percentile_range_edges() -> TestResult<()> {
    let tree = tree_of(&[5, 3, 8, 1, 4])?;
    let all = tree.percentile_range(0.0, 0.0);
    assert_eq!(all, vec![&1, &3, &4, &5, &8]);
    assert!(tree.percentile_range(50.0, 50.0).is_empty());
    assert!(tree.percentile_range(100.0, 0.0).is_empty());
    let empty = OrderStatTree::<i64, ()>::new();
    assert!(empty.percentile_range(0.0, 0.0).is_empty());
    Ok(())
}

#[test]
fn test_delete_median_repeatedly() -> TestResult<()> {
    tracing_subscriber::fmt::try_init().ok();
    let mut keys = (0..100).collect::<Vec<i64>>();
    keys.shuffle(&mut SmallRng::seed_from_u64(3));
    let mut tree = tree_of(&keys)?;
    for i in 0..100 {
        let median = *tree.kth_smallest(tree.len() / 2 + 1).unwrap();
        tree.delete(&median)?;
        tree.assert_invariants()?;
        assert_eq!(tree.len(), 99 - i);
        assert!(!tree.contains(&median));
    }
    assert!(tree.is_empty());
    Ok(())
}

#[test]
fn test_duplicate_key() -> TestResult<()> {
    let mut tree = tree_of(&[1, 2, 3])?;
    assert_eq!(tree.insert(2, 0), Err(Error::DuplicateKey));
    assert_eq!(tree.lookup(&2)?, &2);
    assert_eq!(tree.lookup(&4), Err(Error::KeyNotFound));
    assert_eq!(tree.rank(&4), Err(Error::KeyNotFound));
    Ok(())
}
