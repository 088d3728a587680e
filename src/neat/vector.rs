use std::cmp::Ordering;
use std::hash::Hash;

use indexmap::IndexMap;
use itertools::Itertools;
use rustc_hash::FxBuildHasher;

pub type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// One step of walking two key-sorted maps side by side.
#[derive(Copy, Clone)]
pub enum AlignedPair<'a, K, V> {
    HasBoth((&'a K, &'a V), (&'a K, &'a V)),
    HasLeft((&'a K, &'a V)),
    HasRight((&'a K, &'a V)),
}

/// Calls `map` for every key of `m1` and `m2` in ascending key order. Both maps
/// must already be sorted by key.
pub fn align_iter<'a, K, V, M>(m1: &'a FxIndexMap<K, V>, m2: &'a FxIndexMap<K, V>, mut map: M)
where
    K: Ord + Hash + Eq,
    M: FnMut(AlignedPair<'a, K, V>),
{
    debug_assert!(m1.keys().tuple_windows().all(|(a, b)| a < b), "left map is not sorted by key");
    debug_assert!(m2.keys().tuple_windows().all(|(a, b)| a < b), "right map is not sorted by key");

    let mut left = m1.iter().peekable();
    let mut right = m2.iter().peekable();

    loop {
        let pair = match (left.peek().copied(), right.peek().copied()) {
            (Some(x1), Some(x2)) => match x1.0.cmp(x2.0) {
                Ordering::Equal => {
                    left.next();
                    right.next();
                    AlignedPair::HasBoth(x1, x2)
                }
                Ordering::Less => {
                    left.next();
                    AlignedPair::HasLeft(x1)
                }
                Ordering::Greater => {
                    right.next();
                    AlignedPair::HasRight(x2)
                }
            },
            //finished with m2 but still processing m1
            (Some(x1), None) => {
                left.next();
                AlignedPair::HasLeft(x1)
            }
            //finished with m1 but still processing m2
            (None, Some(x2)) => {
                right.next();
                AlignedPair::HasRight(x2)
            }
            (None, None) => break,
        };
        map(pair);
    }
}

/// Like [`align_iter`] but collects whatever `map` returns into a new map,
/// which is sorted by key because the walk is.
pub fn align_map<'a, K, V, M>(m1: &'a FxIndexMap<K, V>, m2: &'a FxIndexMap<K, V>, mut map: M) -> FxIndexMap<K, V>
where
    K: Ord + Hash + Eq,
    M: FnMut(AlignedPair<'a, K, V>) -> Option<(K, V)>,
{
    let n_res = std::cmp::max(m1.len(), m2.len());
    let mut res: FxIndexMap<K, V> = IndexMap::with_capacity_and_hasher(n_res, FxBuildHasher);
    align_iter(m1, m2, |pair| {
        if let Some((k, v)) = map(pair) {
            res.insert(k, v);
        }
    });
    res
}
